use crate::models::audio_models::Coordinates;
use crate::models::error::MixerError;
use crate::models::render::KeyRender;

/// The host application driving the controller.
///
/// All methods are called from the mixer's owner thread. Implementations
/// must not block: renders are frequent, and persistence is best-effort
/// (a returned error is logged and otherwise ignored).
pub trait HostDelegate: Send + Sync {
    /// Push a complete new visual state for one key.
    fn render_key(&self, coordinates: Coordinates, render: &KeyRender);

    /// Store the JSON settings of one key.
    fn persist_slot_settings(&self, coordinates: Coordinates, settings: &str) -> Result<(), MixerError>;

    /// Store the JSON settings shared by every key.
    fn persist_global_settings(&self, settings: &str) -> Result<(), MixerError>;
}
