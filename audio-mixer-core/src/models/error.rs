use thiserror::Error;

use super::audio_models::SessionId;

/// Errors raised by the mixer engine and its backends.
///
/// None of these terminate the engine: callers at the operation boundary
/// turn them into log entries and, for session loss, a queued retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MixerError {
    /// The session vanished between listing and use.
    #[error("audio session lost: {0}")]
    SessionLost(SessionId),

    /// A control key fired but the selected application has no live session.
    #[error("missing volume handle: {0}")]
    MissingVolumeHandle(String),

    #[error("settings corrupted: {0}")]
    SettingsCorruption(String),

    #[error("audio subsystem unavailable: {0}")]
    SubsystemUnavailable(String),

    #[error("no slot at {0}")]
    UnknownSlot(String),

    #[error("unknown inspector command: {0}")]
    UnknownCommand(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    /// The mixer service or settings writer has shut down.
    #[error("mixer stopped")]
    Stopped,
}

impl MixerError {
    /// Whether the failure is the transient kind that a reassignment fixes.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Self::SessionLost(_))
    }
}
