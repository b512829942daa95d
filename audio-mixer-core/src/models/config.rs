use std::time::Duration;

/// Runtime configuration of a mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerConfiguration {
    /// How long a key must be held to count as a long press (default: 1.5 s).
    pub long_press: Duration,

    /// Interval between session polls of the audio backend (default: 500 ms).
    pub poll_interval: Duration,

    /// Volume step in percent used when settings carry none (default: 10).
    pub default_volume_step: u8,

    /// Controller identifier stamped into persisted slot settings.
    pub device_id: Option<String>,
}

impl MixerConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.long_press.is_zero() {
            return Err("long press duration must be positive".into());
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be positive".into());
        }
        if !(1..=100).contains(&self.default_volume_step) {
            return Err(format!(
                "unsupported volume step: {}",
                self.default_volume_step
            ));
        }
        Ok(())
    }

    /// Default step as a fraction of full volume.
    pub fn default_step_fraction(&self) -> f32 {
        f32::from(self.default_volume_step) / 100.0
    }
}

impl Default for MixerConfiguration {
    fn default() -> Self {
        Self {
            long_press: Duration::from_millis(1500),
            poll_interval: Duration::from_millis(500),
            default_volume_step: 10,
            device_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(MixerConfiguration::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_durations_and_bad_steps() {
        let config = MixerConfiguration {
            long_press: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MixerConfiguration {
            default_volume_step: 0,
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err(), "unsupported volume step: 0");
    }
}
