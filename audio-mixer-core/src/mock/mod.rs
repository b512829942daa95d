//! In-memory backend and host doubles.
//!
//! Lets the whole engine run without an audio subsystem or a controller,
//! which keeps the tests hardware-free and gives hosts a demo mode.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::models::audio_models::{AudioSession, Coordinates, SessionId, VolumeState};
use crate::models::error::MixerError;
use crate::models::render::KeyRender;
use crate::traits::audio_backend::AudioBackend;
use crate::traits::host_delegate::HostDelegate;

/// A scripted audio subsystem.
///
/// Sessions keep their insertion order, which is the iteration order the
/// engine sees.
pub struct MockBackend {
    sessions: Mutex<Vec<AudioSession>>,
    available: AtomicBool,
    writes: AtomicUsize,
    vanishing: Mutex<HashSet<SessionId>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
            vanishing: Mutex::new(HashSet::new()),
        }
    }

    /// Start a new session for `process_name`.
    pub fn open_session(&self, process_name: &str, volume: f32, muted: bool) -> SessionId {
        self.open_session_with_icon(process_name, volume, muted, None)
    }

    pub fn open_session_with_icon(
        &self,
        process_name: &str,
        volume: f32,
        muted: bool,
        icon: Option<Vec<u8>>,
    ) -> SessionId {
        let id = SessionId::generate();
        let mut session = AudioSession::new(id.clone(), process_name, volume, muted);
        session.process_icon = icon;
        self.sessions.lock().push(session);
        id
    }

    pub fn close_session(&self, id: &SessionId) {
        self.sessions.lock().retain(|s| &s.id != id);
    }

    /// Close every session of a process, as when the process exits.
    pub fn close_process(&self, process_name: &str) {
        self.sessions.lock().retain(|s| s.process_name != process_name);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Change a session the way the OS mixer would, without counting a write.
    pub fn set_external(&self, id: &SessionId, state: VolumeState) {
        if let Some(session) = self.sessions.lock().iter_mut().find(|s| &s.id == id) {
            session.volume = state.volume;
            session.muted = state.muted;
        }
    }

    /// Keep listing the session but fail every read and write on it, like a
    /// session torn down between enumeration and use.
    pub fn vanish_on_access(&self, id: &SessionId) {
        self.vanishing.lock().insert(id.clone());
    }

    pub fn state(&self, id: &SessionId) -> Option<VolumeState> {
        self.sessions
            .lock()
            .iter()
            .find(|s| &s.id == id)
            .map(AudioSession::volume_state)
    }

    /// Number of volume and mute writes issued through the backend.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn with_session<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut AudioSession) -> T,
    ) -> Result<T, MixerError> {
        if self.vanishing.lock().contains(id) {
            return Err(MixerError::SessionLost(id.clone()));
        }
        let mut sessions = self.sessions.lock();
        let session = sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| MixerError::SessionLost(id.clone()))?;
        Ok(f(session))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MockBackend {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn sessions(&self) -> Result<Vec<AudioSession>, MixerError> {
        if !self.is_available() {
            return Err(MixerError::SubsystemUnavailable("mock backend offline".into()));
        }
        Ok(self.sessions.lock().clone())
    }

    fn volume(&self, id: &SessionId) -> Result<VolumeState, MixerError> {
        self.with_session(id, |s| s.volume_state())
    }

    fn set_volume(&self, id: &SessionId, volume: f32) -> Result<(), MixerError> {
        self.with_session(id, |s| s.volume = volume.clamp(0.0, 1.0))?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_mute(&self, id: &SessionId, muted: bool) -> Result<(), MixerError> {
        self.with_session(id, |s| s.muted = muted)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Host delegate that records everything the engine pushes.
#[derive(Default)]
pub struct RecordingHost {
    renders: Mutex<Vec<(Coordinates, KeyRender)>>,
    slot_settings: Mutex<Vec<(Coordinates, String)>>,
    global_settings: Mutex<Vec<String>>,
    fail_persistence: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every persistence call fail from now on.
    pub fn fail_persistence(&self, fail: bool) {
        self.fail_persistence.store(fail, Ordering::SeqCst);
    }

    pub fn last_render(&self, coordinates: Coordinates) -> Option<KeyRender> {
        self.renders
            .lock()
            .iter()
            .rev()
            .find(|(c, _)| *c == coordinates)
            .map(|(_, r)| r.clone())
    }

    pub fn render_count(&self, coordinates: Coordinates) -> usize {
        self.renders
            .lock()
            .iter()
            .filter(|(c, _)| *c == coordinates)
            .count()
    }

    pub fn last_slot_settings(&self, coordinates: Coordinates) -> Option<String> {
        self.slot_settings
            .lock()
            .iter()
            .rev()
            .find(|(c, _)| *c == coordinates)
            .map(|(_, s)| s.clone())
    }

    pub fn last_global_settings(&self) -> Option<String> {
        self.global_settings.lock().last().cloned()
    }

    pub fn global_settings_count(&self) -> usize {
        self.global_settings.lock().len()
    }
}

impl HostDelegate for RecordingHost {
    fn render_key(&self, coordinates: Coordinates, render: &KeyRender) {
        self.renders.lock().push((coordinates, render.clone()));
    }

    fn persist_slot_settings(&self, coordinates: Coordinates, settings: &str) -> Result<(), MixerError> {
        if self.fail_persistence.load(Ordering::SeqCst) {
            return Err(MixerError::PersistenceFailed("host rejected slot settings".into()));
        }
        self.slot_settings.lock().push((coordinates, settings.to_string()));
        Ok(())
    }

    fn persist_global_settings(&self, settings: &str) -> Result<(), MixerError> {
        if self.fail_persistence.load(Ordering::SeqCst) {
            return Err(MixerError::PersistenceFailed("host rejected global settings".into()));
        }
        self.global_settings.lock().push(settings.to_string());
        Ok(())
    }
}
