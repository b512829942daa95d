//! # audio-mixer-core
//!
//! Platform-agnostic per-application volume mixer for multi-key controllers.
//!
//! Each key of the controller is a slot. Application slots are bound to one
//! process's audio sessions, either pinned by the user or picked
//! automatically; control slots (mute, volume up, volume down) act on the
//! selected application. All sessions of a process move in lockstep.
//!
//! Platform backends (Windows WASAPI) implement [`AudioBackend`]; the host
//! application implements [`HostDelegate`] to draw keys and store settings.
//!
//! ## Architecture
//!
//! ```text
//! audio-mixer-core (this crate)
//! ├── traits/     ← AudioBackend, HostDelegate
//! ├── models/     ← MixerError, MixerConfiguration, settings, KeyRender, press state
//! ├── registry/   ← AudioSessionRegistry, per-process subscriptions
//! ├── engine/     ← AssignmentEngine, SyncGroup, ReassignmentQueue, Blacklist, slots
//! ├── session/    ← Mixer (context object), MixerService (worker thread)
//! ├── storage/    ← settings (de)serialization, background persistence
//! └── mock/       ← MockBackend, RecordingHost
//! ```

pub mod engine;
pub mod mock;
pub mod models;
pub mod registry;
pub mod session;
pub mod storage;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use engine::{AssignmentEngine, Binding, Blacklist, MixerState, ReassignmentQueue, Slot, SyncGroup, SyncReport};
pub use models::audio_models::{AudioSession, ControlRole, Coordinates, SessionId, SlotId, VolumeState};
pub use models::config::MixerConfiguration;
pub use models::error::MixerError;
pub use models::render::KeyRender;
pub use models::settings::{ApplicationSetting, GlobalSettings, SlotSettings};
pub use models::state::{PressGesture, PressState, PressTicket};
pub use registry::session_registry::{AudioSessionRegistry, RegistryEvent};
pub use session::inspector::InspectorCommand;
pub use session::mixer::Mixer;
pub use session::service::{MixerCommand, MixerService};
pub use storage::settings_writer::BackgroundPersistence;
pub use traits::audio_backend::AudioBackend;
pub use traits::host_delegate::HostDelegate;
