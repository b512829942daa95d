use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::models::audio_models::{ControlRole, Coordinates};
use crate::models::error::MixerError;
use crate::models::state::PressTicket;
use crate::traits::audio_backend::AudioBackend;

use super::mixer::Mixer;

/// Work for the mixer thread. Every host callback becomes one command.
#[derive(Debug, Clone, PartialEq)]
pub enum MixerCommand {
    AddSlot {
        coordinates: Coordinates,
        role: ControlRole,
        settings: Option<String>,
    },
    RemoveSlot(Coordinates),
    SetControlRole(Coordinates, ControlRole),
    KeyPressed(Coordinates),
    KeyReleased(Coordinates),
    InspectorMessage {
        coordinates: Coordinates,
        command: String,
        value: String,
    },
    GlobalSettings(Option<String>),
    SlotSettings {
        coordinates: Coordinates,
        settings: Option<String>,
    },
    PollSessions,
    Shutdown,
}

/// Runs a [`Mixer`] on a dedicated thread.
///
/// Host callbacks, the session poller and long-press deadlines may fire on
/// any thread; they are all funnelled through one channel so that the mixer
/// sees a single ordered stream of work. After each command the
/// reassignment queue is drained.
///
/// ```text
/// [host callbacks] ─┐
///                   ├→ [channel] → [mixer-worker] → Mixer → HostDelegate
/// [session-poller] ─┘
/// ```
pub struct MixerService {
    commands: Sender<MixerCommand>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    poller: Option<thread::JoinHandle<()>>,
}

impl MixerService {
    pub fn start<B: AudioBackend + 'static>(mixer: Mixer<B>) -> Result<Self, MixerError> {
        let (commands, inbox) = unbounded();
        let running = Arc::new(AtomicBool::new(true));
        let long_press = mixer.config().long_press;
        let poll_interval = mixer.config().poll_interval;

        let poll_gate = Arc::new(PollGate::default());

        let worker_gate = Arc::clone(&poll_gate);
        let worker = thread::Builder::new()
            .name("mixer-worker".into())
            .spawn(move || run_worker(mixer, inbox, long_press, &worker_gate))
            .map_err(|e| MixerError::ConfigurationFailed(format!("failed to spawn mixer worker: {}", e)))?;

        let poll_commands = commands.clone();
        let poll_running = Arc::clone(&running);
        let poller = thread::Builder::new()
            .name("session-poller".into())
            .spawn(move || {
                while poll_running.load(Ordering::SeqCst) {
                    // A slow backend gets one pending poll, not a backlog.
                    if poll_gate.arm() && poll_commands.send(MixerCommand::PollSessions).is_err() {
                        break;
                    }
                    thread::sleep(poll_interval);
                }
            })
            .map_err(|e| MixerError::ConfigurationFailed(format!("failed to spawn session poller: {}", e)))?;

        log::info!("Mixer service started (poll every {:?})", poll_interval);
        Ok(Self {
            commands,
            running,
            worker: Some(worker),
            poller: Some(poller),
        })
    }

    pub fn send(&self, command: MixerCommand) -> Result<(), MixerError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(MixerError::Stopped);
        }
        self.commands.send(command).map_err(|_| MixerError::Stopped)
    }

    pub fn add_slot(&self, coordinates: Coordinates, role: ControlRole, settings: Option<String>) -> Result<(), MixerError> {
        self.send(MixerCommand::AddSlot {
            coordinates,
            role,
            settings,
        })
    }

    pub fn remove_slot(&self, coordinates: Coordinates) -> Result<(), MixerError> {
        self.send(MixerCommand::RemoveSlot(coordinates))
    }

    pub fn key_pressed(&self, coordinates: Coordinates) -> Result<(), MixerError> {
        self.send(MixerCommand::KeyPressed(coordinates))
    }

    pub fn key_released(&self, coordinates: Coordinates) -> Result<(), MixerError> {
        self.send(MixerCommand::KeyReleased(coordinates))
    }

    pub fn inspector_message(&self, coordinates: Coordinates, command: &str, value: &str) -> Result<(), MixerError> {
        self.send(MixerCommand::InspectorMessage {
            coordinates,
            command: command.to_string(),
            value: value.to_string(),
        })
    }

    pub fn global_settings(&self, settings: Option<String>) -> Result<(), MixerError> {
        self.send(MixerCommand::GlobalSettings(settings))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop both threads and wait for them. Commands already queued are
    /// processed first.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.commands.send(MixerCommand::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.poller.take() {
            let _ = handle.join();
        }
        log::info!("Mixer service stopped");
    }
}

impl Drop for MixerService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// At most one poll tick in flight between the poller and the worker.
#[derive(Debug, Default)]
struct PollGate {
    pending: AtomicBool,
}

impl PollGate {
    /// Whether a new tick should be sent.
    fn arm(&self) -> bool {
        !self.pending.swap(true, Ordering::SeqCst)
    }

    /// The worker picked the tick up.
    fn disarm(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }
}

fn run_worker<B: AudioBackend>(
    mut mixer: Mixer<B>,
    inbox: Receiver<MixerCommand>,
    long_press: Duration,
    poll_gate: &PollGate,
) {
    // Pending long-press deadlines, at most a handful at a time.
    let mut deadlines: Vec<(Instant, PressTicket)> = Vec::new();

    loop {
        let next_due = deadlines.iter().map(|(due, _)| *due).min();
        let received = match next_due {
            Some(due) => match inbox.recv_deadline(due) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match inbox.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        let now = Instant::now();
        deadlines.retain(|(due, ticket)| {
            if *due > now {
                return true;
            }
            if mixer.long_press_elapsed(*ticket) {
                log::debug!("Long press on {}", ticket.coordinates);
            }
            false
        });

        let Some(command) = received else {
            continue;
        };
        match command {
            MixerCommand::Shutdown => break,
            MixerCommand::AddSlot {
                coordinates,
                role,
                settings,
            } => {
                mixer.add_slot(coordinates, role, settings.as_deref());
            }
            MixerCommand::RemoveSlot(coordinates) => {
                mixer.remove_slot(coordinates);
            }
            MixerCommand::SetControlRole(coordinates, role) => {
                if let Err(e) = mixer.set_control_role(coordinates, role) {
                    log::warn!("Role change failed: {}", e);
                }
            }
            MixerCommand::KeyPressed(coordinates) => {
                if let Some(ticket) = mixer.key_pressed(coordinates) {
                    deadlines.push((Instant::now() + long_press, ticket));
                }
            }
            MixerCommand::KeyReleased(coordinates) => {
                deadlines.retain(|(_, ticket)| ticket.coordinates != coordinates);
                mixer.key_released(coordinates);
            }
            MixerCommand::InspectorMessage {
                coordinates,
                command,
                value,
            } => {
                if let Err(e) = mixer.on_inspector_message(coordinates, &command, &value) {
                    log::warn!("Inspector message {} for {} failed: {}", command, coordinates, e);
                }
            }
            MixerCommand::GlobalSettings(settings) => mixer.receive_global_settings(settings.as_deref()),
            MixerCommand::SlotSettings {
                coordinates,
                settings,
            } => {
                if let Err(e) = mixer.receive_slot_settings(coordinates, settings.as_deref()) {
                    log::warn!("Settings update failed: {}", e);
                }
            }
            MixerCommand::PollSessions => {
                poll_gate.disarm();
                mixer.poll_sessions();
            }
        }
        mixer.drain();
    }
    log::debug!("Mixer worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBackend, RecordingHost};
    use crate::models::config::MixerConfiguration;
    use crate::models::render::KeyRender;

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn service() -> (MixerService, Arc<MockBackend>, Arc<RecordingHost>) {
        let backend = Arc::new(MockBackend::new());
        let host = Arc::new(RecordingHost::new());
        let config = MixerConfiguration {
            long_press: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let mixer = Mixer::new(backend.clone(), host.clone(), config).unwrap();
        (MixerService::start(mixer).unwrap(), backend, host)
    }

    #[test]
    fn polling_binds_sessions_that_start_later() {
        let (service, backend, host) = service();
        let key = Coordinates::new(0, 0);
        service.add_slot(key, ControlRole::Application, None).unwrap();
        assert!(wait_until(|| host.last_render(key) == Some(KeyRender::Cleared)));

        backend.open_session("spotify", 0.3, false);
        assert!(wait_until(|| host.last_render(key).and_then(|r| r.volume()) == Some(0.3)));
    }

    #[test]
    fn held_key_blacklists_its_process() {
        let (service, backend, host) = service();
        backend.open_session("spotify", 0.3, false);
        let key = Coordinates::new(0, 0);
        service.add_slot(key, ControlRole::Application, None).unwrap();
        assert!(wait_until(|| host.last_render(key).is_some_and(|r| r.volume().is_some())));

        service.key_pressed(key).unwrap();
        thread::sleep(Duration::from_millis(150));
        service.key_released(key).unwrap();

        assert!(wait_until(|| host
            .last_global_settings()
            .is_some_and(|blob| blob.contains("spotify"))));
        assert!(wait_until(|| host.last_render(key) == Some(KeyRender::Cleared)));
    }

    #[test]
    fn quick_release_selects_instead() {
        let (service, backend, host) = service();
        backend.open_session("spotify", 0.3, false);
        let key = Coordinates::new(0, 0);
        service.add_slot(key, ControlRole::Application, None).unwrap();
        assert!(wait_until(|| host.last_render(key).is_some_and(|r| r.volume().is_some())));

        service.key_pressed(key).unwrap();
        service.key_released(key).unwrap();
        assert!(wait_until(|| host.last_render(key).is_some_and(|r| r.is_selected())));
        assert_eq!(host.global_settings_count(), 0);
    }

    #[test]
    fn poll_ticks_do_not_pile_up() {
        let gate = PollGate::default();
        assert!(gate.arm());
        assert!(!gate.arm());
        assert!(!gate.arm());

        gate.disarm();
        assert!(gate.arm());
    }

    #[test]
    fn stopped_service_rejects_commands() {
        let (mut service, _backend, _host) = service();
        assert!(service.is_running());
        service.stop();
        service.stop();
        assert!(!service.is_running());
        assert_eq!(service.remove_slot(Coordinates::new(0, 0)), Err(MixerError::Stopped));
    }
}
