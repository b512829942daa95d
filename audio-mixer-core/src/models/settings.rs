use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use super::audio_models::AudioSession;

pub const DEFAULT_VOLUME_STEP: &str = "10";
pub const DEFAULT_INLINE_CONTROLS_TIMEOUT: u32 = 0;

/// Treats an explicit JSON `null` like a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An application as remembered in settings: static bindings, blacklist
/// entries and inspector choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSetting {
    pub process_name: String,
    #[serde(default, deserialize_with = "nullable")]
    pub display_name: String,
    /// Base64 encoded icon, kept so the key can be drawn while the process
    /// is not running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_icon: Option<String>,
}

impl ApplicationSetting {
    pub fn named(process_name: impl Into<String>) -> Self {
        let process_name = process_name.into();
        Self {
            display_name: process_name.clone(),
            process_name,
            process_icon: None,
        }
    }

    pub fn from_session(session: &AudioSession) -> Self {
        Self {
            process_name: session.process_name.clone(),
            display_name: session.display_name.clone(),
            process_icon: session.process_icon.as_deref().map(|icon| STANDARD.encode(icon)),
        }
    }

    /// Decoded icon bytes. A malformed icon is dropped rather than failing.
    pub fn icon_bytes(&self) -> Option<Vec<u8>> {
        let encoded = self.process_icon.as_deref()?;
        match STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("Dropping undecodable icon for {}: {}", self.process_name, e);
                None
            }
        }
    }
}

/// Distinct applications by process name, first occurrence wins.
pub fn distinct_applications<I>(applications: I) -> Vec<ApplicationSetting>
where
    I: IntoIterator<Item = ApplicationSetting>,
{
    let mut distinct: Vec<ApplicationSetting> = Vec::new();
    for app in applications {
        if !distinct.iter().any(|d| d.process_name == app.process_name) {
            distinct.push(app);
        }
    }
    distinct
}

/// Per-key settings persisted by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlotSettings {
    pub device_id: Option<String>,

    /// Volume step in percent, kept as text for compatibility.
    #[serde(deserialize_with = "nullable")]
    pub volume_step: String,

    pub static_application_name: Option<String>,
    pub static_application: Option<ApplicationSetting>,

    /// Choices offered by the inspector for the static binding.
    #[serde(deserialize_with = "nullable")]
    pub static_applications: Vec<ApplicationSetting>,

    /// Choices offered by the inspector for the blacklist.
    #[serde(deserialize_with = "nullable")]
    pub blacklist_applications: Vec<ApplicationSetting>,

    /// Snapshot of the global blacklist.
    #[serde(deserialize_with = "nullable")]
    pub blacklisted_applications: Vec<ApplicationSetting>,

    /// Control keys follow the global step when set.
    pub global_lock: bool,

    #[serde(alias = "independantVolumeStep", deserialize_with = "nullable")]
    pub independent_volume_step: String,

    pub inline_controls_enabled: bool,
    pub inline_controls_timeout: u32,
}

impl SlotSettings {
    /// Fill fields that older or partial payloads leave empty.
    pub fn initialize(&mut self) {
        if self.volume_step.trim().is_empty() {
            self.volume_step = DEFAULT_VOLUME_STEP.into();
        }
        if self.independent_volume_step.trim().is_empty() {
            self.independent_volume_step = DEFAULT_VOLUME_STEP.into();
        }
    }

    pub fn static_process(&self) -> Option<&str> {
        self.static_application
            .as_ref()
            .map(|app| app.process_name.as_str())
    }

    pub fn set_static_application(&mut self, application: Option<ApplicationSetting>) {
        self.static_application_name = application.as_ref().map(|a| a.process_name.clone());
        self.static_application = application;
    }
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            device_id: None,
            volume_step: DEFAULT_VOLUME_STEP.into(),
            static_application_name: None,
            static_application: None,
            static_applications: Vec::new(),
            blacklist_applications: Vec::new(),
            blacklisted_applications: Vec::new(),
            global_lock: true,
            independent_volume_step: DEFAULT_VOLUME_STEP.into(),
            inline_controls_enabled: true,
            inline_controls_timeout: DEFAULT_INLINE_CONTROLS_TIMEOUT,
        }
    }
}

/// Settings shared by every key. Source of truth reconciled into each slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    #[serde(deserialize_with = "nullable")]
    pub volume_step: String,
    #[serde(deserialize_with = "nullable")]
    pub blacklist_applications: Vec<ApplicationSetting>,
    #[serde(deserialize_with = "nullable")]
    pub blacklisted_applications: Vec<ApplicationSetting>,
    pub inline_controls_enabled: bool,
    pub inline_controls_timeout: u32,
}

impl GlobalSettings {
    pub fn initialize(&mut self) {
        if self.volume_step.trim().is_empty() {
            self.volume_step = DEFAULT_VOLUME_STEP.into();
        }
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            volume_step: DEFAULT_VOLUME_STEP.into(),
            blacklist_applications: Vec::new(),
            blacklisted_applications: Vec::new(),
            inline_controls_enabled: true,
            inline_controls_timeout: DEFAULT_INLINE_CONTROLS_TIMEOUT,
        }
    }
}

/// Parse a percent step such as `"10"` into a fraction of full volume.
pub fn parse_volume_step(raw: &str) -> Option<f32> {
    let percent: f32 = raw.trim().parse().ok()?;
    if !percent.is_finite() || percent <= 0.0 {
        return None;
    }
    Some(percent.min(100.0) / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::SessionId;

    #[test]
    fn legacy_payload_with_nulls_parses() {
        let json = r#"{
            "deviceId": "DEVICE",
            "volumeStep": null,
            "staticApplication": null,
            "blacklistedApplications": null,
            "whitelistedApplications": [{"processName": "ignored"}],
            "independantVolumeStep": "5"
        }"#;

        let mut settings: SlotSettings = serde_json::from_str(json).unwrap();
        settings.initialize();

        assert_eq!(settings.device_id.as_deref(), Some("DEVICE"));
        assert_eq!(settings.volume_step, "10");
        assert_eq!(settings.independent_volume_step, "5");
        assert!(settings.blacklisted_applications.is_empty());
        assert!(settings.global_lock);
        assert!(settings.inline_controls_enabled);
    }

    #[test]
    fn application_setting_keeps_icon_as_base64() {
        let mut session = AudioSession::new(SessionId::new("a"), "discord", 0.5, false);
        session.process_icon = Some(vec![1, 2, 3]);

        let setting = ApplicationSetting::from_session(&session);
        let json = serde_json::to_string(&setting).unwrap();
        assert!(json.contains("\"processName\":\"discord\""));

        let back: ApplicationSetting = serde_json::from_str(&json).unwrap();
        assert_eq!(back.icon_bytes(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn malformed_icon_is_dropped() {
        let setting = ApplicationSetting {
            process_icon: Some("not base64!".into()),
            ..ApplicationSetting::named("spotify")
        };
        assert_eq!(setting.icon_bytes(), None);
    }

    #[test]
    fn distinct_keeps_first_occurrence() {
        let apps = vec![
            ApplicationSetting::named("a"),
            ApplicationSetting::named("b"),
            ApplicationSetting {
                display_name: "second a".into(),
                ..ApplicationSetting::named("a")
            },
        ];
        let distinct = distinct_applications(apps);
        assert_eq!(distinct.len(), 2);
        assert_eq!(distinct[0].display_name, "a");
    }

    #[test]
    fn volume_step_parsing() {
        assert_eq!(parse_volume_step("10"), Some(0.1));
        assert_eq!(parse_volume_step(" 250 "), Some(1.0));
        assert_eq!(parse_volume_step("0"), None);
        assert_eq!(parse_volume_step("abc"), None);
    }
}
