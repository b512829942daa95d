//! Process names as the mixer sees them: the executable's file name
//! without directory or extension, case preserved.

/// `C:\Program Files\Spotify\Spotify.exe` becomes `Spotify`.
pub fn from_image_path(path: &str) -> Option<String> {
    let file = path.rsplit(['\\', '/']).next()?.trim();
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_directory_and_extension() {
        assert_eq!(
            from_image_path(r"C:\Program Files\Spotify\Spotify.exe").as_deref(),
            Some("Spotify")
        );
        assert_eq!(from_image_path(r"C:\Tools\my.player.exe").as_deref(), Some("my.player"));
        assert_eq!(from_image_path("discord").as_deref(), Some("discord"));
    }

    #[test]
    fn empty_paths_have_no_name() {
        assert_eq!(from_image_path(""), None);
        assert_eq!(from_image_path(r"C:\Windows\"), None);
    }
}
