//! Per-application audio sessions via `IAudioSessionManager2`.
//!
//! COM objects are apartment-bound, so the session manager and the session
//! controls are cached per thread. A session enumeration (`sessions()`,
//! the poll path) reopens the endpoint and rebuilds the cache, which also
//! follows a change of the default device. Per-session reads and writes
//! look the control up in the cache and re-enumerate only on a miss. A
//! session that expired since it was listed is reported as
//! [`MixerError::SessionLost`] instead of being written to.
//!
//! Sessions carry no icon: `AudioSession::process_icon` is always `None`.

use std::cell::RefCell;
use std::collections::HashMap;

use parking_lot::Mutex;
use windows::core::{Interface, PWSTR};
use windows::Win32::Foundation::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audio_mixer_core::models::audio_models::{AudioSession, SessionId, VolumeState};
use audio_mixer_core::models::error::MixerError;
use audio_mixer_core::traits::audio_backend::AudioBackend;

use crate::device_enumerator::DeviceEnumerator;
use crate::process_name;

thread_local! {
    static COM_SCOPE: RefCell<Option<ComScope>> = const { RefCell::new(None) };
}

/// WASAPI application sessions of one render endpoint.
pub struct WasapiSessionBackend {
    device_id: Option<String>,
    /// Executable names by process id, pruned on every enumeration.
    process_names: Mutex<HashMap<u32, String>>,
}

impl WasapiSessionBackend {
    /// Follow the default multimedia render endpoint.
    pub fn default_device() -> Self {
        Self {
            device_id: None,
            process_names: Mutex::new(HashMap::new()),
        }
    }

    /// Use a specific render endpoint, as listed by
    /// [`DeviceEnumerator::list_render_devices`].
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self {
            device_id: Some(device_id.into()),
            process_names: Mutex::new(HashMap::new()),
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Run `f` against this thread's cache for the endpoint. COM is
    /// initialized on first use and stays initialized until the thread
    /// exits. `reopen` discards the cached manager first.
    fn with_endpoint<T>(
        &self,
        reopen: bool,
        f: impl FnOnce(&mut EndpointCache) -> Result<T, MixerError>,
    ) -> Result<T, MixerError> {
        COM_SCOPE.with(|cell| {
            let mut scope = cell.borrow_mut();
            if scope.is_none() {
                *scope = Some(ComScope::enter()?);
            }
            let Some(scope) = scope.as_mut() else {
                return Err(MixerError::SubsystemUnavailable("COM scope missing".into()));
            };

            if reopen {
                scope.endpoints.remove(&self.device_id);
            }
            if !scope.endpoints.contains_key(&self.device_id) {
                let cache = EndpointCache::open(self.device_id.as_deref())?;
                scope.endpoints.insert(self.device_id.clone(), cache);
            }
            let Some(cache) = scope.endpoints.get_mut(&self.device_id) else {
                return Err(MixerError::SubsystemUnavailable("endpoint cache missing".into()));
            };

            let result = f(cache);
            if matches!(result, Err(MixerError::SubsystemUnavailable(_))) {
                scope.endpoints.remove(&self.device_id);
            }
            result
        })
    }

    fn simple_volume(&self, id: &SessionId) -> Result<ISimpleAudioVolume, MixerError> {
        self.with_endpoint(false, |cache| cache.simple_volume(id))
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        let mut names = self.process_names.lock();
        if let Some(name) = names.get(&pid) {
            return Some(name.clone());
        }
        let name = image_path(pid).and_then(|path| process_name::from_image_path(&path))?;
        names.insert(pid, name.clone());
        Some(name)
    }
}

impl AudioBackend for WasapiSessionBackend {
    fn is_available(&self) -> bool {
        self.with_endpoint(false, |_| Ok(())).is_ok()
    }

    fn sessions(&self) -> Result<Vec<AudioSession>, MixerError> {
        self.with_endpoint(true, |cache| {
            let live = cache.enumerate()?;
            self.process_names
                .lock()
                .retain(|pid, _| live.iter().any(|s| s.pid == *pid));

            let mut sessions = Vec::with_capacity(live.len());
            for session in live {
                let Some(process_name) = self.process_name(session.pid) else {
                    log::debug!("Skipping session of pid {}: no image name", session.pid);
                    continue;
                };
                let Ok(volume) = session.control.cast::<ISimpleAudioVolume>() else {
                    continue;
                };
                let state = unsafe {
                    match (volume.GetMasterVolume(), volume.GetMute()) {
                        (Ok(level), Ok(muted)) => VolumeState::new(level, muted.as_bool()),
                        _ => continue,
                    }
                };
                let display_name = session.display_name();
                let mut entry = AudioSession::new(session.id, process_name, state.volume, state.muted);
                if let Some(display) = display_name {
                    entry.display_name = display;
                }
                sessions.push(entry);
            }
            Ok(sessions)
        })
    }

    fn volume(&self, id: &SessionId) -> Result<VolumeState, MixerError> {
        let volume = self.simple_volume(id)?;
        unsafe {
            let level = volume
                .GetMasterVolume()
                .map_err(|_| MixerError::SessionLost(id.clone()))?;
            let muted = volume.GetMute().map_err(|_| MixerError::SessionLost(id.clone()))?;
            Ok(VolumeState::new(level, muted.as_bool()))
        }
    }

    fn set_volume(&self, id: &SessionId, volume: f32) -> Result<(), MixerError> {
        let simple = self.simple_volume(id)?;
        unsafe {
            simple
                .SetMasterVolume(volume.clamp(0.0, 1.0), std::ptr::null())
                .map_err(|_| MixerError::SessionLost(id.clone()))
        }
    }

    fn set_mute(&self, id: &SessionId, muted: bool) -> Result<(), MixerError> {
        let simple = self.simple_volume(id)?;
        unsafe {
            simple
                .SetMute(muted, std::ptr::null())
                .map_err(|_| MixerError::SessionLost(id.clone()))
        }
    }
}

/// COM initialization of one thread plus its endpoint caches. Fields drop
/// in order, so the caches are released before `CoUninitialize`.
struct ComScope {
    endpoints: HashMap<Option<String>, EndpointCache>,
    _guard: Option<CoUninitializeGuard>,
}

impl ComScope {
    fn enter() -> Result<Self, MixerError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        // Already initialized in another mode is usable, but that
        // initialization is not ours to undo.
        let guard = if hr.is_ok() {
            Some(CoUninitializeGuard)
        } else if hr == RPC_E_CHANGED_MODE {
            None
        } else {
            return Err(MixerError::SubsystemUnavailable(format!("CoInitializeEx failed: {:?}", hr)));
        };
        Ok(Self {
            endpoints: HashMap::new(),
            _guard: guard,
        })
    }
}

/// Session manager of one endpoint and the controls it last listed.
struct EndpointCache {
    manager: IAudioSessionManager2,
    controls: HashMap<SessionId, IAudioSessionControl2>,
}

impl EndpointCache {
    fn open(device_id: Option<&str>) -> Result<Self, MixerError> {
        let device = DeviceEnumerator::new()?.render_endpoint(device_id)?;
        let manager: IAudioSessionManager2 = unsafe {
            device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| MixerError::SubsystemUnavailable(format!("Activate session manager failed: {}", e)))?
        };
        Ok(Self {
            manager,
            controls: HashMap::new(),
        })
    }

    /// Live application sessions: system sounds and expired sessions are
    /// skipped. Replaces the cached controls.
    fn enumerate(&mut self) -> Result<Vec<LiveSession>, MixerError> {
        let mut live = Vec::new();
        unsafe {
            let sessions = self
                .manager
                .GetSessionEnumerator()
                .map_err(|e| MixerError::SubsystemUnavailable(format!("GetSessionEnumerator failed: {}", e)))?;
            let count = sessions
                .GetCount()
                .map_err(|e| MixerError::SubsystemUnavailable(format!("GetCount failed: {}", e)))?;

            for i in 0..count {
                let Ok(control) = sessions.GetSession(i) else {
                    continue;
                };
                let Ok(control) = control.cast::<IAudioSessionControl2>() else {
                    continue;
                };
                if control.IsSystemSoundsSession() == S_OK || is_expired(&control) {
                    continue;
                }
                let Some(id) = take_string(control.GetSessionInstanceIdentifier()) else {
                    continue;
                };
                let Ok(pid) = control.GetProcessId() else {
                    continue;
                };
                live.push(LiveSession {
                    id: SessionId::new(id),
                    pid,
                    control,
                });
            }
        }
        self.controls = live.iter().map(|s| (s.id.clone(), s.control.clone())).collect();
        Ok(live)
    }

    fn simple_volume(&mut self, id: &SessionId) -> Result<ISimpleAudioVolume, MixerError> {
        if !self.controls.contains_key(id) {
            self.enumerate()?;
        }
        let Some(control) = self.controls.get(id) else {
            return Err(MixerError::SessionLost(id.clone()));
        };
        if is_expired(control) {
            self.controls.remove(id);
            return Err(MixerError::SessionLost(id.clone()));
        }
        control
            .cast::<ISimpleAudioVolume>()
            .map_err(|_| MixerError::SessionLost(id.clone()))
    }
}

struct LiveSession {
    id: SessionId,
    pid: u32,
    control: IAudioSessionControl2,
}

impl LiveSession {
    /// The name an application gave its session. Resource references
    /// (`@%SystemRoot%...`) are not resolved.
    fn display_name(&self) -> Option<String> {
        let name = unsafe { take_string(self.control.GetDisplayName()) }?;
        let name = name.trim();
        if name.is_empty() || name.starts_with('@') {
            None
        } else {
            Some(name.to_string())
        }
    }
}

fn is_expired(control: &IAudioSessionControl2) -> bool {
    unsafe { control.GetState() }.is_ok_and(|state| state == AudioSessionStateExpired)
}

/// Convert a COM-allocated string and free it.
unsafe fn take_string(raw: windows::core::Result<PWSTR>) -> Option<String> {
    let raw = raw.ok()?;
    if raw.is_null() {
        return None;
    }
    let value = raw.to_string().ok();
    CoTaskMemFree(Some(raw.0 as *const _));
    value
}

/// Full path of the executable behind `pid`.
fn image_path(pid: u32) -> Option<String> {
    if pid == 0 {
        return None;
    }
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut buffer = [0u16; 1024];
        let mut len = buffer.len() as u32;
        let queried = QueryFullProcessImageNameW(handle, PROCESS_NAME_WIN32, PWSTR(buffer.as_mut_ptr()), &mut len);
        let _ = CloseHandle(handle);
        queried.ok()?;
        Some(String::from_utf16_lossy(&buffer[..len as usize]))
    }
}

struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listed_sessions_can_be_read_back() {
        let backend = WasapiSessionBackend::default_device();
        // Build agents without an audio endpoint have nothing to list.
        let Ok(sessions) = backend.sessions() else {
            return;
        };
        for session in &sessions {
            assert!(session.process_icon.is_none());
            match backend.volume(&session.id) {
                Ok(state) => assert!((0.0..=1.0).contains(&state.volume)),
                Err(e) => assert!(e.is_session_loss(), "{}", e),
            }
        }
        assert!(matches!(
            backend.volume(&SessionId::new("no-such-session")),
            Err(MixerError::SessionLost(_))
        ));
    }
}
