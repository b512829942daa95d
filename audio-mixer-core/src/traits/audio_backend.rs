use crate::models::audio_models::{AudioSession, SessionId, VolumeState};
use crate::models::error::MixerError;

/// Interface for platform-specific audio session access.
///
/// Implemented by:
/// - `WasapiSessionBackend` (Windows)
/// - `MockBackend` (tests, demos)
///
/// Sessions can disappear at any moment. Every per-session call re-validates
/// the session and returns [`MixerError::SessionLost`] if it is gone.
pub trait AudioBackend: Send + Sync {
    /// Whether the audio subsystem can be queried at all.
    fn is_available(&self) -> bool;

    /// Snapshot of the live sessions, in the subsystem's iteration order.
    fn sessions(&self) -> Result<Vec<AudioSession>, MixerError>;

    /// Fresh volume and mute of one session.
    fn volume(&self, id: &SessionId) -> Result<VolumeState, MixerError>;

    fn set_volume(&self, id: &SessionId, volume: f32) -> Result<(), MixerError>;

    fn set_mute(&self, id: &SessionId, muted: bool) -> Result<(), MixerError>;
}
