use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::error::MixerError;

/// Parse a settings blob handed over by the host.
///
/// A missing, blank, `null` or `{}` blob is `Ok(None)`: the key has never
/// been configured and should be given defaults. Anything else that fails
/// to parse is [`MixerError::SettingsCorruption`].
pub fn parse_settings<T: DeserializeOwned>(blob: Option<&str>) -> Result<Option<T>, MixerError> {
    let Some(blob) = blob.map(str::trim).filter(|b| !b.is_empty()) else {
        return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(blob)
        .map_err(|e| MixerError::SettingsCorruption(format!("failed to parse settings: {}", e)))?;
    let unset = match &value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if unset {
        return Ok(None);
    }
    let settings = serde_json::from_value(value)
        .map_err(|e| MixerError::SettingsCorruption(format!("unexpected settings shape: {}", e)))?;
    Ok(Some(settings))
}

/// Serialize settings for the host.
pub fn to_blob<T: Serialize>(settings: &T) -> Result<String, MixerError> {
    serde_json::to_string(settings)
        .map_err(|e| MixerError::PersistenceFailed(format!("failed to serialize settings: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{GlobalSettings, SlotSettings};

    #[test]
    fn unset_blobs_mean_defaults() {
        for blob in [None, Some(""), Some("  "), Some("null"), Some("{}")] {
            let parsed: Option<SlotSettings> = parse_settings(blob).unwrap();
            assert!(parsed.is_none(), "{:?}", blob);
        }
    }

    #[test]
    fn corrupt_blobs_are_reported() {
        let err = parse_settings::<SlotSettings>(Some("{\"volumeStep\": ")).unwrap_err();
        assert!(matches!(err, MixerError::SettingsCorruption(_)));

        let err = parse_settings::<GlobalSettings>(Some("42")).unwrap_err();
        assert!(matches!(err, MixerError::SettingsCorruption(_)));

        let err = parse_settings::<SlotSettings>(Some("{\"globalLock\": \"yes\"}")).unwrap_err();
        assert!(matches!(err, MixerError::SettingsCorruption(_)));
    }

    #[test]
    fn blob_round_trips_through_the_host_format() {
        let mut settings = GlobalSettings::default();
        settings.volume_step = "5".into();

        let blob = to_blob(&settings).unwrap();
        assert!(blob.contains("\"volumeStep\":\"5\""));
        let parsed: GlobalSettings = parse_settings(Some(&blob)).unwrap().unwrap();
        assert_eq!(parsed, settings);
    }
}
