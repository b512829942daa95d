//! Render endpoint lookup via the MMDevice API.
//!
//! Application sessions live on a render endpoint. The mixer follows the
//! default multimedia endpoint unless a device id is pinned.

use windows::core::HSTRING;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::StructuredStorage::PropVariantClear;
use windows::Win32::System::Com::*;
use windows::Win32::System::Variant::*;

use audio_mixer_core::models::error::MixerError;

/// An active output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderEndpoint {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

/// Audio device enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new device enumerator.
    ///
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, MixerError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| MixerError::SubsystemUnavailable(format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator })
        }
    }

    /// The endpoint with `device_id`, or the default multimedia render
    /// endpoint when no id is given.
    pub fn render_endpoint(&self, device_id: Option<&str>) -> Result<IMMDevice, MixerError> {
        unsafe {
            match device_id {
                Some(id) => self
                    .enumerator
                    .GetDevice(&HSTRING::from(id))
                    .map_err(|e| MixerError::SubsystemUnavailable(format!("device {} not found: {}", id, e))),
                None => self
                    .enumerator
                    .GetDefaultAudioEndpoint(eRender, eMultimedia)
                    .map_err(|e| MixerError::SubsystemUnavailable(format!("no default render device: {}", e))),
            }
        }
    }

    /// List active render (output) devices.
    pub fn list_render_devices(&self) -> Result<Vec<RenderEndpoint>, MixerError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .map_err(|e| MixerError::SubsystemUnavailable(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| MixerError::SubsystemUnavailable(format!("GetCount failed: {}", e)))?;

            let default_id = self
                .enumerator
                .GetDefaultAudioEndpoint(eRender, eMultimedia)
                .ok()
                .and_then(|d| device_id(&d));

            let mut devices = Vec::new();
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device_id(&device) else {
                    continue;
                };
                let name = friendly_name(&device).unwrap_or_else(|| format!("Device {}", i));
                let is_default = default_id.as_deref() == Some(id.as_str());
                devices.push(RenderEndpoint { id, name, is_default });
            }
            Ok(devices)
        }
    }
}

/// Endpoint id string, freeing the COM allocation.
fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let raw = device.GetId().ok()?;
        let id = raw.to_string().ok();
        CoTaskMemFree(Some(raw.0 as *const _));
        id
    }
}

/// Read the PKEY_Device_FriendlyName property from a device.
fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;

        let mut prop_variant = std::mem::zeroed::<PROPVARIANT>();
        store.GetValue(&PKEY_Device_FriendlyName, &mut prop_variant).ok()?;

        let name = if prop_variant.Anonymous.Anonymous.vt == VT_LPWSTR {
            let pwsz = prop_variant.Anonymous.Anonymous.Anonymous.pwszVal;
            if pwsz.is_null() {
                None
            } else {
                pwsz.to_string().ok()
            }
        } else {
            None
        };

        PropVariantClear(&mut prop_variant).ok();
        name
    }
}
