use std::sync::Arc;

use crate::engine::assignment::{AssignmentEngine, Binding};
use crate::engine::blacklist::Blacklist;
use crate::engine::slot::Slot;
use crate::engine::MixerState;
use crate::models::audio_models::{ControlRole, Coordinates, SlotId};
use crate::models::config::MixerConfiguration;
use crate::models::error::MixerError;
use crate::models::settings::{distinct_applications, GlobalSettings, SlotSettings};
use crate::registry::session_registry::AudioSessionRegistry;
use crate::storage::settings_store::{parse_settings, to_blob};
use crate::traits::audio_backend::AudioBackend;
use crate::traits::host_delegate::HostDelegate;

/// One mixer: the slots of a controller bound to the sessions of one
/// audio backend.
///
/// Constructed explicitly and owned by whoever drives it; every mutation
/// goes through `&mut self`, which is what serializes assignment work.
/// [`MixerService`](super::service::MixerService) runs a mixer on its own
/// thread for hosts with concurrent event sources.
///
/// Lifecycle:
/// ```text
/// new → receive_global_settings → add_slot* → (poll_sessions → drain)* → drop
/// ```
pub struct Mixer<B: AudioBackend> {
    pub(crate) backend: Arc<B>,
    pub(crate) host: Arc<dyn HostDelegate>,
    pub(crate) config: MixerConfiguration,
    pub(crate) state: MixerState,
}

impl<B: AudioBackend> Mixer<B> {
    pub fn new(
        backend: Arc<B>,
        host: Arc<dyn HostDelegate>,
        config: MixerConfiguration,
    ) -> Result<Self, MixerError> {
        config.validate().map_err(MixerError::ConfigurationFailed)?;
        if !backend.is_available() {
            log::warn!("Audio backend not available, starting with no sessions");
        }
        Ok(Self {
            backend,
            host,
            config,
            state: MixerState::new(),
        })
    }

    pub fn config(&self) -> &MixerConfiguration {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub(crate) fn engine(&mut self) -> AssignmentEngine<'_> {
        AssignmentEngine::new(&mut self.state, self.backend.as_ref(), self.host.as_ref())
    }

    pub(crate) fn slot_id(&self, coordinates: Coordinates) -> Result<SlotId, MixerError> {
        self.state
            .slots
            .id_at(coordinates)
            .ok_or_else(|| MixerError::UnknownSlot(coordinates.to_string()))
    }

    // --- Slot lifecycle ---

    /// Register a key that appeared on the controller.
    ///
    /// Unset or corrupt settings fall back to defaults, which are persisted
    /// right away. A key already registered at `coordinates` is replaced.
    pub fn add_slot(&mut self, coordinates: Coordinates, role: ControlRole, settings: Option<&str>) -> SlotId {
        if self.state.slots.id_at(coordinates).is_some() {
            self.remove_slot(coordinates);
        }

        let (mut settings, fresh) = load_slot_settings(coordinates, settings);
        settings.initialize();
        reconcile(&self.state.global, &self.state.blacklist, &mut settings);

        let id = self.state.slots.insert(coordinates, role, settings);
        log::debug!("Added {:?} key at {}", role, coordinates);
        if fresh {
            self.persist_slot(id);
        }
        self.state.queue.enqueue(id);
        self.drain();
        id
    }

    /// Forget a key. Returns whether one was registered.
    pub fn remove_slot(&mut self, coordinates: Coordinates) -> bool {
        let Some(id) = self.state.slots.id_at(coordinates) else {
            return false;
        };
        self.engine().release(id, false);
        self.state.queue.remove(id);
        if self.state.selected == Some(id) {
            self.state.selected = None;
        }
        self.state.slots.remove(id);
        // Whatever the key held is free again.
        self.enqueue_idle_dynamic();
        self.drain();
        true
    }

    /// Turn a key into a different kind of control.
    pub fn set_control_role(&mut self, coordinates: Coordinates, role: ControlRole) -> Result<(), MixerError> {
        let id = self.slot_id(coordinates)?;
        self.engine().release(id, false);
        if let Some(slot) = self.state.slots.get_mut(id) {
            slot.role = role;
        }
        if !role.is_application() && self.state.selected == Some(id) {
            self.state.selected = None;
        }
        self.state.queue.enqueue(id);
        self.enqueue_idle_dynamic();
        self.drain();
        Ok(())
    }

    // --- Settings ---

    /// Apply the shared settings and reconcile them into every key.
    pub fn receive_global_settings(&mut self, settings: Option<&str>) {
        let (mut global, fresh) = match parse_settings::<GlobalSettings>(settings) {
            Ok(Some(global)) => (global, false),
            Ok(None) => (GlobalSettings::default(), true),
            Err(e) => {
                log::warn!("Falling back to default global settings: {}", e);
                (GlobalSettings::default(), true)
            }
        };
        global.initialize();

        self.state.blacklist = Blacklist::from_entries(global.blacklisted_applications.clone());
        self.state.global = global;
        if fresh {
            self.persist_global();
        }

        let ids = self.state.slots.ids_where(|_| true);
        for id in ids {
            if let Some(slot) = self.state.slots.get_mut(id) {
                reconcile(&self.state.global, &self.state.blacklist, &mut slot.settings);
            }
            self.persist_slot(id);
            self.state.queue.enqueue(id);
        }
        self.drain();
    }

    /// Replace one key's settings, e.g. after the host edited them.
    ///
    /// The shared fields of stored settings (volume step, inline controls)
    /// become the new global values and are reconciled into every key.
    /// Unset or corrupt settings only reset the key itself.
    pub fn receive_slot_settings(&mut self, coordinates: Coordinates, settings: Option<&str>) -> Result<(), MixerError> {
        let id = self.slot_id(coordinates)?;
        let (mut parsed, fresh) = load_slot_settings(coordinates, settings);
        parsed.initialize();

        if !fresh {
            self.state.global.volume_step = parsed.volume_step.clone();
            self.state.global.inline_controls_enabled = parsed.inline_controls_enabled;
            self.state.global.inline_controls_timeout = parsed.inline_controls_timeout;
            self.persist_global();
        }
        if let Some(slot) = self.state.slots.get_mut(id) {
            slot.settings = parsed;
        }

        for other in self.state.slots.ids_where(|_| true) {
            if let Some(slot) = self.state.slots.get_mut(other) {
                reconcile(&self.state.global, &self.state.blacklist, &mut slot.settings);
            }
            if fresh && other != id {
                continue;
            }
            self.persist_slot(other);
            self.state.queue.enqueue(other);
        }
        self.state.queue.enqueue(id);
        self.enqueue_idle_dynamic();
        self.drain();
        Ok(())
    }

    // --- Engine entry points ---

    /// Poll the backend and dispatch what changed.
    ///
    /// Slots needing a new binding are only queued; call [`Mixer::drain`]
    /// afterwards.
    pub fn poll_sessions(&mut self) -> usize {
        let events = self.state.registry.refresh(self.backend.as_ref());
        let mut engine = self.engine();
        for event in &events {
            engine.handle_event(event);
        }
        events.len()
    }

    /// Reassign the key at `coordinates` now.
    pub fn assign(&mut self, coordinates: Coordinates) -> Result<Binding, MixerError> {
        let id = self.slot_id(coordinates)?;
        self.engine().assign(id)
    }

    /// Process the reassignment queue.
    pub fn drain(&mut self) -> usize {
        self.engine().drain()
    }

    // --- Persistence ---

    /// Push one key's settings to the host. Failures are logged only.
    pub(crate) fn persist_slot(&mut self, id: SlotId) {
        let Some(slot) = self.state.slots.get_mut(id) else {
            return;
        };
        if let Some(device_id) = &self.config.device_id {
            slot.settings.device_id = Some(device_id.clone());
        }
        slot.settings.blacklisted_applications = self.state.blacklist.entries().to_vec();

        let coordinates = slot.coordinates;
        let result = to_blob(&slot.settings).and_then(|blob| self.host.persist_slot_settings(coordinates, &blob));
        if let Err(e) = result {
            log::warn!("Failed to persist settings of {}: {}", coordinates, e);
        }
    }

    pub(crate) fn persist_global(&mut self) {
        let blacklisted = self.state.blacklist.entries().to_vec();
        let mut choices = std::mem::take(&mut self.state.global.blacklist_applications);
        choices.extend(blacklisted.iter().cloned());
        self.state.global.blacklist_applications = distinct_applications(choices);
        self.state.global.blacklisted_applications = blacklisted;

        let result = to_blob(&self.state.global).and_then(|blob| self.host.persist_global_settings(&blob));
        if let Err(e) = result {
            log::warn!("Failed to persist global settings: {}", e);
        }
    }

    pub(crate) fn enqueue_app_slots(&mut self) {
        for id in self.state.slots.ids_where(|s| s.role.is_application()) {
            self.state.queue.enqueue(id);
        }
    }

    pub(crate) fn enqueue_idle_dynamic(&mut self) {
        for id in self
            .state
            .slots
            .ids_where(|s| s.is_dynamic() && s.bound_process.is_none())
        {
            self.state.queue.enqueue(id);
        }
    }

    // --- Queries ---

    pub fn slot(&self, coordinates: Coordinates) -> Option<&Slot> {
        let id = self.state.slots.id_at(coordinates)?;
        self.state.slots.get(id)
    }

    /// Coordinates of the key the control keys act on.
    pub fn selected(&self) -> Option<Coordinates> {
        let id = self.state.selected?;
        self.state.slots.get(id).map(Slot::coordinates)
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.state.blacklist
    }

    pub fn global_settings(&self) -> &GlobalSettings {
        &self.state.global
    }

    pub fn registry(&self) -> &AudioSessionRegistry {
        &self.state.registry
    }

    pub fn queue_len(&self) -> usize {
        self.state.queue.len()
    }

    pub fn slot_count(&self) -> usize {
        self.state.slots.len()
    }
}

/// Parse a key's settings; `true` when defaults were substituted.
fn load_slot_settings(coordinates: Coordinates, blob: Option<&str>) -> (SlotSettings, bool) {
    match parse_settings::<SlotSettings>(blob) {
        Ok(Some(settings)) => (settings, false),
        Ok(None) => (SlotSettings::default(), true),
        Err(e) => {
            log::warn!("Falling back to default settings for {}: {}", coordinates, e);
            (SlotSettings::default(), true)
        }
    }
}

/// Copy the shared settings into one key's settings.
fn reconcile(global: &GlobalSettings, blacklist: &Blacklist, settings: &mut SlotSettings) {
    settings.volume_step = global.volume_step.clone();
    settings.blacklist_applications = global.blacklist_applications.clone();
    settings.blacklisted_applications = blacklist.entries().to_vec();
    settings.inline_controls_enabled = global.inline_controls_enabled;
    settings.inline_controls_timeout = global.inline_controls_timeout;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mock::{MockBackend, RecordingHost};
    use crate::models::render::KeyRender;

    pub(crate) fn mixer() -> (Mixer<MockBackend>, Arc<MockBackend>, Arc<RecordingHost>) {
        let backend = Arc::new(MockBackend::new());
        let host = Arc::new(RecordingHost::new());
        let config = MixerConfiguration {
            device_id: Some("DECK-1".into()),
            ..Default::default()
        };
        let mixer = Mixer::new(backend.clone(), host.clone(), config).unwrap();
        (mixer, backend, host)
    }

    pub(crate) fn settle(mixer: &mut Mixer<MockBackend>) {
        mixer.poll_sessions();
        mixer.drain();
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = MixerConfiguration {
            default_volume_step: 0,
            ..Default::default()
        };
        let result = Mixer::new(Arc::new(MockBackend::new()), Arc::new(RecordingHost::new()), config);
        assert!(matches!(result, Err(MixerError::ConfigurationFailed(_))));
    }

    #[test]
    fn new_key_gets_persisted_defaults() {
        let (mut mixer, _backend, host) = mixer();
        let key = Coordinates::new(0, 0);
        mixer.add_slot(key, ControlRole::Application, None);

        let blob = host.last_slot_settings(key).unwrap();
        let saved: SlotSettings = serde_json::from_str(&blob).unwrap();
        assert_eq!(saved.device_id.as_deref(), Some("DECK-1"));
        assert_eq!(saved.volume_step, "10");
        assert_eq!(host.last_render(key), Some(KeyRender::Cleared));
    }

    #[test]
    fn corrupt_key_settings_fall_back_to_defaults() {
        let (mut mixer, backend, host) = mixer();
        backend.open_session("spotify", 0.5, false);
        mixer.poll_sessions();

        let key = Coordinates::new(2, 1);
        mixer.add_slot(key, ControlRole::Application, Some("{not json"));

        assert!(host.last_slot_settings(key).is_some());
        assert_eq!(mixer.slot(key).unwrap().bound_process(), Some("spotify"));
    }

    #[test]
    fn stored_static_binding_is_restored() {
        let (mut mixer, backend, host) = mixer();
        backend.open_session("chrome", 0.5, false);
        mixer.poll_sessions();

        let key = Coordinates::new(0, 0);
        let settings = r#"{"staticApplication": {"processName": "discord", "displayName": "Discord"}}"#;
        mixer.add_slot(key, ControlRole::Application, Some(settings));

        let slot = mixer.slot(key).unwrap();
        assert!(slot.is_static());
        assert_eq!(slot.bound_process(), Some("discord"));
        assert_eq!(host.last_render(key), Some(KeyRender::Unavailable { icon: None }));
        // Stored settings were usable, nothing to write back.
        assert_eq!(host.last_slot_settings(key), None);
    }

    #[test]
    fn global_settings_reconcile_into_every_key() {
        let (mut mixer, backend, host) = mixer();
        backend.open_session("spotify", 0.5, false);
        backend.open_session("chrome", 0.5, false);
        mixer.poll_sessions();
        let key = Coordinates::new(0, 0);
        mixer.add_slot(key, ControlRole::Application, None);
        assert_eq!(mixer.slot(key).unwrap().bound_process(), Some("spotify"));

        let global = r#"{"volumeStep": "5", "blacklistedApplications": [{"processName": "spotify"}]}"#;
        mixer.receive_global_settings(Some(global));

        let slot = mixer.slot(key).unwrap();
        assert_eq!(slot.settings().volume_step, "5");
        assert_eq!(slot.settings().blacklisted_applications.len(), 1);
        assert_eq!(slot.bound_process(), Some("chrome"));
        assert!(mixer.blacklist().contains("spotify"));
        assert_eq!(host.global_settings_count(), 0);
    }

    #[test]
    fn key_settings_edit_becomes_the_global_value() {
        let (mut mixer, backend, host) = mixer();
        backend.open_session("spotify", 0.5, false);
        mixer.receive_global_settings(Some(r#"{"volumeStep": "10"}"#));
        let a = Coordinates::new(0, 0);
        let b = Coordinates::new(1, 0);
        mixer.add_slot(a, ControlRole::Application, None);
        mixer.add_slot(b, ControlRole::VolumeUp, None);

        let edited = r#"{"volumeStep": "25", "inlineControlsEnabled": false}"#;
        mixer.receive_slot_settings(a, Some(edited)).unwrap();

        assert_eq!(mixer.global_settings().volume_step, "25");
        assert!(!mixer.global_settings().inline_controls_enabled);
        assert_eq!(mixer.slot(a).unwrap().settings().volume_step, "25");
        assert_eq!(mixer.slot(b).unwrap().settings().volume_step, "25");
        let saved: GlobalSettings = serde_json::from_str(&host.last_global_settings().unwrap()).unwrap();
        assert_eq!(saved.volume_step, "25");
        let saved: SlotSettings = serde_json::from_str(&host.last_slot_settings(b).unwrap()).unwrap();
        assert_eq!(saved.volume_step, "25");
        assert_eq!(
            host.last_render(b),
            Some(KeyRender::Control {
                role: ControlRole::VolumeUp,
                label: Some("+25".into())
            })
        );
    }

    #[test]
    fn unset_key_settings_leave_the_global_value() {
        let (mut mixer, _backend, host) = mixer();
        mixer.receive_global_settings(Some(r#"{"volumeStep": "5"}"#));
        let a = Coordinates::new(0, 0);
        mixer.add_slot(a, ControlRole::Application, None);

        mixer.receive_slot_settings(a, None).unwrap();

        assert_eq!(mixer.global_settings().volume_step, "5");
        assert_eq!(mixer.slot(a).unwrap().settings().volume_step, "5");
        assert_eq!(host.global_settings_count(), 0);
    }

    #[test]
    fn missing_global_settings_are_created() {
        let (mut mixer, _backend, host) = mixer();
        mixer.receive_global_settings(None);

        let blob = host.last_global_settings().unwrap();
        let saved: GlobalSettings = serde_json::from_str(&blob).unwrap();
        assert_eq!(saved, GlobalSettings::default());
    }

    #[test]
    fn removing_a_key_frees_its_process() {
        let (mut mixer, backend, _host) = mixer();
        backend.open_session("spotify", 0.5, false);
        mixer.poll_sessions();
        let a = Coordinates::new(0, 0);
        let b = Coordinates::new(1, 0);
        mixer.add_slot(a, ControlRole::Application, None);
        mixer.add_slot(b, ControlRole::Application, None);
        assert_eq!(mixer.slot(b).unwrap().bound_process(), None);

        assert!(mixer.remove_slot(a));
        assert!(!mixer.remove_slot(a));
        assert_eq!(mixer.slot(b).unwrap().bound_process(), Some("spotify"));
        assert_eq!(mixer.registry().subscriptions().subscribers("spotify").len(), 1);
    }

    #[test]
    fn role_change_releases_the_process() {
        let (mut mixer, backend, host) = mixer();
        backend.open_session("spotify", 0.5, false);
        mixer.poll_sessions();
        let a = Coordinates::new(0, 0);
        mixer.add_slot(a, ControlRole::Application, None);

        mixer.set_control_role(a, ControlRole::Mute).unwrap();
        assert_eq!(mixer.slot(a).unwrap().bound_process(), None);
        assert_eq!(
            host.last_render(a),
            Some(KeyRender::Control {
                role: ControlRole::Mute,
                label: None
            })
        );
        assert!(mixer.registry().subscriptions().is_empty());

        let err = mixer.set_control_role(Coordinates::new(9, 9), ControlRole::Mute).unwrap_err();
        assert!(matches!(err, MixerError::UnknownSlot(_)));
    }

    #[test]
    fn unavailable_subsystem_leaves_keys_unbound() {
        let (mut mixer, backend, host) = mixer();
        backend.open_session("spotify", 0.5, false);
        backend.set_available(false);
        let key = Coordinates::new(0, 0);
        mixer.add_slot(key, ControlRole::Application, None);
        settle(&mut mixer);

        assert!(mixer.registry().is_unavailable());
        assert_eq!(host.last_render(key), Some(KeyRender::Cleared));

        backend.set_available(true);
        settle(&mut mixer);
        assert_eq!(mixer.slot(key).unwrap().bound_process(), Some("spotify"));
    }
}
