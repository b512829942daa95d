use std::str::FromStr;

use crate::models::audio_models::Coordinates;
use crate::models::error::MixerError;
use crate::models::settings::{distinct_applications, ApplicationSetting, GlobalSettings, SlotSettings};
use crate::traits::audio_backend::AudioBackend;

use super::mixer::Mixer;

/// Commands sent by a key's settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorCommand {
    /// Pin the key to a process; an empty value unpins it.
    SetStaticApp,
    ToggleBlacklistApp,
    /// Refresh the application choices offered by the panel.
    RefreshApplications,
    ResetSettings,
}

impl FromStr for InspectorCommand {
    type Err = MixerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "setstaticapp" => Ok(Self::SetStaticApp),
            "toggleblacklistapp" => Ok(Self::ToggleBlacklistApp),
            "refreshapplications" => Ok(Self::RefreshApplications),
            "resetsettings" => Ok(Self::ResetSettings),
            _ => Err(MixerError::UnknownCommand(s.to_string())),
        }
    }
}

impl<B: AudioBackend> Mixer<B> {
    /// Dispatch a settings panel message for the key at `coordinates`.
    pub fn on_inspector_message(&mut self, coordinates: Coordinates, command: &str, value: &str) -> Result<(), MixerError> {
        let command: InspectorCommand = command.parse()?;
        log::debug!("{:?} from {} ({})", command, coordinates, value);
        match command {
            InspectorCommand::SetStaticApp => self.set_static_application(coordinates, value),
            InspectorCommand::ToggleBlacklistApp => {
                self.toggle_blacklist(value.trim());
                Ok(())
            }
            InspectorCommand::RefreshApplications => self.refresh_applications(coordinates),
            InspectorCommand::ResetSettings => self.reset_settings(coordinates),
        }
    }

    /// Pin the key to a running process, or unpin it with an empty name.
    ///
    /// Pinning takes the icon and display name from the live session so the
    /// key can still be drawn after the process exits. A process with no
    /// live session is ignored.
    pub fn set_static_application(&mut self, coordinates: Coordinates, process_name: &str) -> Result<(), MixerError> {
        let id = self.slot_id(coordinates)?;
        let process_name = process_name.trim();

        let application = if process_name.is_empty() {
            None
        } else {
            let Some(session) = self.state.registry.find(|s| s.process_name == process_name) else {
                log::warn!("Cannot pin {} to {}: not running", coordinates, process_name);
                return Ok(());
            };
            Some(ApplicationSetting::from_session(session))
        };

        if let Some(slot) = self.state.slots.get_mut(id) {
            slot.settings.set_static_application(application);
        }
        self.persist_slot(id);
        self.enqueue_app_slots();
        self.drain();
        Ok(())
    }

    /// Add `process_name` to the blacklist, or remove it. Returns whether it
    /// is blacklisted afterwards.
    ///
    /// Every dynamic key is rescanned: a removal makes the process eligible
    /// again, an addition orphans the key that held it.
    pub fn toggle_blacklist(&mut self, process_name: &str) -> bool {
        let application = self
            .state
            .registry
            .find(|s| s.process_name == process_name)
            .map(ApplicationSetting::from_session)
            .unwrap_or_else(|| ApplicationSetting::named(process_name));
        let blacklisted = self.state.blacklist.toggle(application);
        log::info!(
            "{} {} the blacklist",
            process_name,
            if blacklisted { "added to" } else { "removed from" }
        );

        self.persist_global();
        for id in self.state.slots.ids_where(|_| true) {
            self.persist_slot(id);
        }
        for id in self.state.slots.ids_where(|s| s.is_dynamic()) {
            self.state.queue.enqueue(id);
        }
        self.drain();
        blacklisted
    }

    /// Offer the running applications as choices for pinning and
    /// blacklisting, then rescan every application key.
    pub fn refresh_applications(&mut self, coordinates: Coordinates) -> Result<(), MixerError> {
        let id = self.slot_id(coordinates)?;
        let running = distinct_applications(self.state.registry.iter().map(ApplicationSetting::from_session));

        self.state.global.blacklist_applications = running.clone();
        self.persist_global();
        let choices = self.state.global.blacklist_applications.clone();
        if let Some(slot) = self.state.slots.get_mut(id) {
            slot.settings.static_applications = running;
            slot.settings.blacklist_applications = choices;
        }
        self.persist_slot(id);

        self.enqueue_app_slots();
        self.drain();
        Ok(())
    }

    /// Restore defaults for the key and for the shared settings, which
    /// includes clearing the blacklist.
    pub fn reset_settings(&mut self, coordinates: Coordinates) -> Result<(), MixerError> {
        let id = self.slot_id(coordinates)?;
        log::info!("Resetting settings of {}", coordinates);

        self.state.global = GlobalSettings::default();
        self.state.blacklist = Default::default();
        if let Some(slot) = self.state.slots.get_mut(id) {
            slot.settings = SlotSettings::default();
        }
        self.persist_global();

        for other in self.state.slots.ids_where(|_| true) {
            if let Some(slot) = self.state.slots.get_mut(other) {
                slot.settings.volume_step = self.state.global.volume_step.clone();
                slot.settings.blacklist_applications.clear();
            }
            self.persist_slot(other);
            self.state.queue.enqueue(other);
        }
        self.drain();
        Ok(())
    }
}
