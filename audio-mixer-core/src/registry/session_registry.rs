use crate::models::audio_models::{AudioSession, SessionId, VolumeState};
use crate::traits::audio_backend::AudioBackend;

use super::subscriptions::Subscriptions;

/// Change detected between two snapshots of the audio subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Appeared(AudioSession),
    Disconnected(AudioSession),
    /// Volume or mute of a session present in both snapshots changed.
    VolumeChanged(AudioSession),
}

impl RegistryEvent {
    pub fn session(&self) -> &AudioSession {
        match self {
            Self::Appeared(s) | Self::Disconnected(s) | Self::VolumeChanged(s) => s,
        }
    }

    pub fn process_name(&self) -> &str {
        &self.session().process_name
    }
}

/// Live set of OS audio sessions plus the listeners attached to them.
///
/// The registry is the only owner of session data. It is refreshed by
/// polling the backend; the diff against the previous snapshot yields the
/// appear/disconnect/volume events the engine reacts to.
#[derive(Debug, Default)]
pub struct AudioSessionRegistry {
    sessions: Vec<AudioSession>,
    subscriptions: Subscriptions,
    unavailable: bool,
}

impl AudioSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll the backend and apply the result.
    ///
    /// An unreachable backend counts as an empty snapshot; the failure is
    /// logged once until the backend answers again.
    pub fn refresh<B: AudioBackend + ?Sized>(&mut self, backend: &B) -> Vec<RegistryEvent> {
        let snapshot = match backend.sessions() {
            Ok(sessions) => {
                if self.unavailable {
                    log::info!("Audio subsystem available again");
                    self.unavailable = false;
                }
                sessions
            }
            Err(e) => {
                if !self.unavailable {
                    log::warn!("Audio subsystem unavailable, showing no sessions: {}", e);
                    self.unavailable = true;
                }
                Vec::new()
            }
        };
        self.apply_snapshot(snapshot)
    }

    /// Replace the live set and report what changed.
    pub fn apply_snapshot(&mut self, snapshot: Vec<AudioSession>) -> Vec<RegistryEvent> {
        let mut events = Vec::new();

        for old in &self.sessions {
            if !snapshot.iter().any(|s| s.id == old.id) {
                events.push(RegistryEvent::Disconnected(old.clone()));
            }
        }

        let mut changed = Vec::new();
        for new in &snapshot {
            match self.sessions.iter().find(|s| s.id == new.id) {
                None => events.push(RegistryEvent::Appeared(new.clone())),
                Some(old) if old.volume_state().differs_from(&new.volume_state()) => {
                    changed.push(RegistryEvent::VolumeChanged(new.clone()));
                }
                Some(_) => {}
            }
        }
        events.extend(changed);

        self.sessions = snapshot;
        events
    }

    /// Snapshot of every live session, in backend order.
    pub fn list(&self) -> Vec<AudioSession> {
        self.sessions.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioSession> {
        self.sessions.iter()
    }

    pub fn find<P>(&self, predicate: P) -> Option<&AudioSession>
    where
        P: Fn(&AudioSession) -> bool,
    {
        self.sessions.iter().find(|s| predicate(s))
    }

    pub fn get(&self, id: &SessionId) -> Option<&AudioSession> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    /// Every session of one process: the process's sync group.
    pub fn sessions_for(&self, process_name: &str) -> Vec<AudioSession> {
        self.sessions
            .iter()
            .filter(|s| s.process_name == process_name)
            .cloned()
            .collect()
    }

    pub fn has_process(&self, process_name: &str) -> bool {
        self.sessions.iter().any(|s| s.process_name == process_name)
    }

    /// Record a state the engine wrote, so the next poll does not report it
    /// as an external change.
    pub fn record_volume(&mut self, id: &SessionId, state: VolumeState) {
        if let Some(session) = self.sessions.iter_mut().find(|s| &s.id == id) {
            session.volume = state.volume;
            session.muted = state.muted;
        }
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut Subscriptions {
        &mut self.subscriptions
    }

    pub fn is_unavailable(&self) -> bool {
        self.unavailable
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[test]
    fn refresh_reports_appear_change_and_disconnect() {
        let backend = MockBackend::new();
        let mut registry = AudioSessionRegistry::new();

        let spotify = backend.open_session("spotify", 0.5, false);
        let chrome = backend.open_session("chrome", 1.0, false);
        let events = registry.refresh(&backend);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RegistryEvent::Appeared(s) if s.process_name == "spotify"));
        assert!(matches!(&events[1], RegistryEvent::Appeared(s) if s.process_name == "chrome"));

        backend.set_external(&spotify, VolumeState::new(0.2, false));
        backend.close_session(&chrome);
        let events = registry.refresh(&backend);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], RegistryEvent::Disconnected(s) if s.id == chrome));
        assert!(matches!(&events[1], RegistryEvent::VolumeChanged(s) if s.id == spotify));

        assert!(registry.refresh(&backend).is_empty());
    }

    #[test]
    fn unavailable_backend_reads_as_empty() {
        let backend = MockBackend::new();
        let mut registry = AudioSessionRegistry::new();
        backend.open_session("spotify", 0.5, false);
        registry.refresh(&backend);

        backend.set_available(false);
        let events = registry.refresh(&backend);
        assert!(registry.is_empty());
        assert!(registry.is_unavailable());
        assert!(matches!(&events[0], RegistryEvent::Disconnected(_)));

        backend.set_available(true);
        registry.refresh(&backend);
        assert!(!registry.is_unavailable());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sessions_for_groups_by_process() {
        let backend = MockBackend::new();
        let mut registry = AudioSessionRegistry::new();
        backend.open_session("discord", 0.5, false);
        backend.open_session("spotify", 0.5, false);
        backend.open_session("discord", 0.8, true);
        registry.refresh(&backend);

        let group = registry.sessions_for("discord");
        assert_eq!(group.len(), 2);
        assert!(registry.has_process("spotify"));
        assert!(registry.find(|s| s.muted).is_some());
    }

    #[test]
    fn recorded_writes_are_not_reported_again() {
        let backend = MockBackend::new();
        let mut registry = AudioSessionRegistry::new();
        let id = backend.open_session("spotify", 0.5, false);
        registry.refresh(&backend);

        let state = VolumeState::new(0.7, true);
        backend.set_external(&id, state);
        registry.record_volume(&id, state);
        assert!(registry.refresh(&backend).is_empty());
    }
}
