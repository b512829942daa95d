use crate::models::audio_models::{AudioSession, SessionId, VolumeState, VOLUME_EPSILON};
use crate::models::error::MixerError;
use crate::models::render::KeyRender;
use crate::registry::session_registry::AudioSessionRegistry;
use crate::traits::audio_backend::AudioBackend;

use super::assignment::AssignmentEngine;

/// Outcome of writing one state to a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Volume and mute writes actually issued.
    pub writes: usize,
    /// Sessions now at the target state.
    pub synced: Vec<SessionId>,
    /// Sessions that vanished during the fan-out.
    pub lost: Vec<SessionId>,
}

/// All sessions of one process, presented as a single volume control.
#[derive(Debug, Clone)]
pub struct SyncGroup {
    process_name: String,
    sessions: Vec<AudioSession>,
}

impl SyncGroup {
    pub fn new(process_name: impl Into<String>, sessions: Vec<AudioSession>) -> Self {
        Self {
            process_name: process_name.into(),
            sessions,
        }
    }

    pub fn from_registry(registry: &AudioSessionRegistry, process_name: &str) -> Self {
        Self::new(process_name, registry.sessions_for(process_name))
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    pub fn sessions(&self) -> &[AudioSession] {
        &self.sessions
    }

    pub fn first(&self) -> Option<&AudioSession> {
        self.sessions.first()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// What the group's key shows: the first session's volume, muted if any
    /// session is muted. Every session is re-read from the backend.
    pub fn combined_state<B: AudioBackend + ?Sized>(&self, backend: &B) -> Result<VolumeState, MixerError> {
        let Some(first) = self.first() else {
            return Err(MixerError::MissingVolumeHandle(format!(
                "{} has no live session",
                self.process_name
            )));
        };
        let lead = backend.volume(&first.id)?;
        let mut muted = lead.muted;
        for session in &self.sessions[1..] {
            muted |= backend.volume(&session.id)?.muted;
        }
        Ok(VolumeState::new(lead.volume, muted))
    }

    /// Bring every session to `target`.
    pub fn apply<B: AudioBackend + ?Sized>(&self, backend: &B, target: VolumeState) -> SyncReport {
        self.write_all(backend, target, None)
    }

    /// Bring every session except `origin` to `target`.
    pub fn propagate<B: AudioBackend + ?Sized>(
        &self,
        backend: &B,
        origin: &SessionId,
        target: VolumeState,
    ) -> SyncReport {
        self.write_all(backend, target, Some(origin))
    }

    fn write_all<B: AudioBackend + ?Sized>(
        &self,
        backend: &B,
        target: VolumeState,
        skip: Option<&SessionId>,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for session in &self.sessions {
            if Some(&session.id) == skip {
                continue;
            }
            match sync_session(backend, &session.id, target) {
                Ok(writes) => {
                    report.writes += writes;
                    report.synced.push(session.id.clone());
                }
                Err(e) => {
                    log::debug!("Skipping {} of {}: {}", session.id, self.process_name, e);
                    report.lost.push(session.id.clone());
                }
            }
        }
        report
    }
}

/// Write only the fields that differ, so re-applying a state costs nothing.
fn sync_session<B: AudioBackend + ?Sized>(
    backend: &B,
    id: &SessionId,
    target: VolumeState,
) -> Result<usize, MixerError> {
    let current = backend.volume(id)?;
    let mut writes = 0;
    if (current.volume - target.volume).abs() > VOLUME_EPSILON {
        backend.set_volume(id, target.volume)?;
        writes += 1;
    }
    if current.muted != target.muted {
        backend.set_mute(id, target.muted)?;
        writes += 1;
    }
    Ok(writes)
}

impl AssignmentEngine<'_> {
    /// React to a volume or mute change on `origin`.
    ///
    /// The event payload is ignored: volume and mute change independently and
    /// the notification can arrive between the two, so the session is read
    /// again. A state the slot already shows is an echo of our own writes.
    pub fn synchronize(&mut self, origin: &AudioSession) {
        let subscribers = self
            .state
            .registry
            .subscriptions()
            .subscribers(&origin.process_name);

        for slot_id in subscribers {
            let current = match self.backend.volume(&origin.id) {
                Ok(state) => state,
                Err(e) => {
                    // The disconnect shows up on the next poll.
                    log::debug!("Ignoring change of vanished session {}: {}", origin.id, e);
                    return;
                }
            };

            let Some(slot) = self.state.slots.get_mut(slot_id) else {
                continue;
            };
            if slot.last_state.is_some_and(|last| !last.differs_from(&current)) {
                continue;
            }
            slot.last_state = Some(current);
            let coordinates = slot.coordinates;
            let icon = slot.icon.clone();

            let group = SyncGroup::from_registry(&self.state.registry, &origin.process_name);
            let report = group.propagate(self.backend, &origin.id, current);
            self.state.registry.record_volume(&origin.id, current);
            self.record(&report, current);
            if !report.lost.is_empty() {
                self.state.queue.enqueue(slot_id);
            }

            log::debug!(
                "{} synced to {:.2} (muted: {}) with {} writes",
                origin.process_name,
                current.volume,
                current.muted,
                report.writes
            );
            let selected = self.state.selected == Some(slot_id);
            self.host.render_key(
                coordinates,
                &KeyRender::Application {
                    icon,
                    volume: current.volume,
                    selected,
                    muted: current.muted,
                },
            );
        }
    }

    pub(crate) fn record(&mut self, report: &SyncReport, state: VolumeState) {
        for id in &report.synced {
            self.state.registry.record_volume(id, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::mock::MockBackend;

    fn group_of(backend: &MockBackend, process: &str) -> SyncGroup {
        let mut registry = AudioSessionRegistry::new();
        registry.refresh(backend);
        SyncGroup::from_registry(&registry, process)
    }

    #[test]
    fn combined_mute_is_logical_or() {
        let backend = MockBackend::new();
        backend.open_session("discord", 0.6, false);
        backend.open_session("discord", 0.3, true);

        let state = group_of(&backend, "discord").combined_state(&backend).unwrap();
        assert!(state.muted);
        assert_relative_eq!(state.volume, 0.6);
    }

    #[test]
    fn applying_twice_writes_once() {
        let backend = MockBackend::new();
        let a = backend.open_session("spotify", 0.5, false);
        let b = backend.open_session("spotify", 0.8, false);
        let group = group_of(&backend, "spotify");
        let target = VolumeState::new(0.4, true);

        let first = group.apply(&backend, target);
        assert_eq!(first.writes, 4);
        let after_once = (backend.state(&a), backend.state(&b));

        let second = group.apply(&backend, target);
        assert_eq!(second.writes, 0);
        assert_eq!((backend.state(&a), backend.state(&b)), after_once);
        assert_eq!(backend.write_count(), 4);
    }

    #[test]
    fn propagate_skips_origin_and_reports_lost_sessions() {
        let backend = MockBackend::new();
        let origin = backend.open_session("chrome", 0.2, false);
        let sibling = backend.open_session("chrome", 0.9, false);
        let gone = backend.open_session("chrome", 0.9, false);
        let group = group_of(&backend, "chrome");
        backend.close_session(&gone);

        let report = group.propagate(&backend, &origin, VolumeState::new(0.2, false));
        assert_eq!(report.synced, vec![sibling.clone()]);
        assert_eq!(report.lost, vec![gone]);
        assert_eq!(backend.state(&origin), Some(VolumeState::new(0.2, false)));
        assert_relative_eq!(backend.state(&sibling).unwrap().volume, 0.2);
    }

    #[test]
    fn empty_group_has_no_volume_handle() {
        let backend = MockBackend::new();
        let err = group_of(&backend, "ghost").combined_state(&backend).unwrap_err();
        assert!(matches!(err, MixerError::MissingVolumeHandle(_)));
    }
}
