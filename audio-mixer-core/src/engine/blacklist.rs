use crate::models::settings::{distinct_applications, ApplicationSetting};

/// Applications never eligible for dynamic assignment.
///
/// One list for the whole controller; each slot's settings only carry a
/// snapshot of it for persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    entries: Vec<ApplicationSetting>,
}

impl Blacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ApplicationSetting>) -> Self {
        Self {
            entries: distinct_applications(entries),
        }
    }

    pub fn contains(&self, process_name: &str) -> bool {
        self.entries.iter().any(|e| e.process_name == process_name)
    }

    /// Add the application, or remove it if already listed.
    /// Returns `true` when the application is blacklisted afterwards.
    pub fn toggle(&mut self, application: ApplicationSetting) -> bool {
        if let Some(index) = self
            .entries
            .iter()
            .position(|e| e.process_name == application.process_name)
        {
            self.entries.remove(index);
            false
        } else {
            self.entries.push(application);
            true
        }
    }

    pub fn entries(&self) -> &[ApplicationSetting] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_twice_restores_contents() {
        let mut blacklist =
            Blacklist::from_entries(vec![ApplicationSetting::named("a"), ApplicationSetting::named("b")]);
        let original = blacklist.clone();

        assert!(blacklist.toggle(ApplicationSetting::named("c")));
        assert!(blacklist.contains("c"));
        assert!(!blacklist.toggle(ApplicationSetting::named("c")));
        assert_eq!(blacklist, original);

        assert!(!blacklist.toggle(ApplicationSetting::named("a")));
        assert!(blacklist.toggle(ApplicationSetting::named("a")));
        assert!(blacklist.contains("a"));
        assert_eq!(blacklist.len(), 2);
    }

    #[test]
    fn duplicates_collapse_on_load() {
        let blacklist =
            Blacklist::from_entries(vec![ApplicationSetting::named("a"), ApplicationSetting::named("a")]);
        assert_eq!(blacklist.len(), 1);
    }
}
