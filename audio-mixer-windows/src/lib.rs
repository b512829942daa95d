//! # audio-mixer-windows
//!
//! Windows WASAPI backend for audio-mixer.
//!
//! Provides:
//! - `WasapiSessionBackend`: per-application sessions of a render endpoint
//!   via `IAudioSessionManager2`, with volume and mute through
//!   `ISimpleAudioVolume`
//! - `DeviceEnumerator`: render endpoint lookup via the MMDevice API
//!
//! ## Limitations
//! - Sessions are reported without icons (`process_icon` is `None`). A
//!   static key whose process is not running shows the icon stored in its
//!   settings, if another source captured one, or no icon at all.
//!
//! ## Platform Requirements
//! - Windows 7+ for `IAudioSessionManager2`
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_mixer_core::{Mixer, MixerConfiguration, MixerService};
//! use audio_mixer_windows::WasapiSessionBackend;
//!
//! let backend = Arc::new(WasapiSessionBackend::default_device());
//! let mixer = Mixer::new(backend, host, MixerConfiguration::default())?;
//! let service = MixerService::start(mixer)?;
//! ```

pub mod process_name;

#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod session_backend;

#[cfg(target_os = "windows")]
pub use device_enumerator::{DeviceEnumerator, RenderEndpoint};
#[cfg(target_os = "windows")]
pub use session_backend::WasapiSessionBackend;
