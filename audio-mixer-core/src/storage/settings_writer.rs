use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Sender, bounded, unbounded};

use crate::models::audio_models::Coordinates;
use crate::models::error::MixerError;
use crate::models::render::KeyRender;
use crate::traits::host_delegate::HostDelegate;

enum PersistJob {
    Slot(Coordinates, String),
    Global(String),
    Flush(Sender<()>),
}

/// Host delegate wrapper that moves settings writes off the caller's thread.
///
/// Renders go straight through. Persistence calls are queued and return
/// immediately; the "settings-writer" thread performs them in order and logs
/// failures instead of reporting them.
pub struct BackgroundPersistence {
    inner: Arc<dyn HostDelegate>,
    jobs: Option<Sender<PersistJob>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl BackgroundPersistence {
    pub fn start(inner: Arc<dyn HostDelegate>) -> Result<Self, MixerError> {
        let (jobs, queue) = unbounded::<PersistJob>();
        let writer = Arc::clone(&inner);

        let handle = thread::Builder::new()
            .name("settings-writer".into())
            .spawn(move || {
                for job in queue {
                    let result = match job {
                        PersistJob::Slot(coordinates, blob) => writer.persist_slot_settings(coordinates, &blob),
                        PersistJob::Global(blob) => writer.persist_global_settings(&blob),
                        PersistJob::Flush(done) => {
                            let _ = done.send(());
                            Ok(())
                        }
                    };
                    if let Err(e) = result {
                        log::warn!("Settings write failed: {}", e);
                    }
                }
                log::debug!("Settings writer stopped");
            })
            .map_err(|e| MixerError::ConfigurationFailed(format!("failed to spawn settings writer: {}", e)))?;

        Ok(Self {
            inner,
            jobs: Some(jobs),
            handle: Some(handle),
        })
    }

    /// Block until every write queued so far has been attempted.
    pub fn flush(&self) {
        let (done, wait) = bounded(1);
        if self.send(PersistJob::Flush(done)).is_ok() {
            let _ = wait.recv();
        }
    }

    fn send(&self, job: PersistJob) -> Result<(), MixerError> {
        self.jobs
            .as_ref()
            .ok_or(MixerError::Stopped)?
            .send(job)
            .map_err(|_| MixerError::Stopped)
    }
}

impl HostDelegate for BackgroundPersistence {
    fn render_key(&self, coordinates: Coordinates, render: &KeyRender) {
        self.inner.render_key(coordinates, render);
    }

    fn persist_slot_settings(&self, coordinates: Coordinates, settings: &str) -> Result<(), MixerError> {
        self.send(PersistJob::Slot(coordinates, settings.to_string()))
    }

    fn persist_global_settings(&self, settings: &str) -> Result<(), MixerError> {
        self.send(PersistJob::Global(settings.to_string()))
    }
}

impl Drop for BackgroundPersistence {
    fn drop(&mut self) {
        // Closing the channel lets the writer finish the backlog and exit.
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingHost;

    #[test]
    fn writes_arrive_in_order_after_flush() {
        let host = Arc::new(RecordingHost::new());
        let writer = BackgroundPersistence::start(host.clone()).unwrap();
        let key = Coordinates::new(1, 2);

        writer.persist_slot_settings(key, "{\"a\":1}").unwrap();
        writer.persist_slot_settings(key, "{\"a\":2}").unwrap();
        writer.persist_global_settings("{\"volumeStep\":\"5\"}").unwrap();
        writer.flush();

        assert_eq!(host.last_slot_settings(key).as_deref(), Some("{\"a\":2}"));
        assert_eq!(host.global_settings_count(), 1);
    }

    #[test]
    fn host_failures_are_not_surfaced() {
        let host = Arc::new(RecordingHost::new());
        host.fail_persistence(true);
        let writer = BackgroundPersistence::start(host.clone()).unwrap();

        assert!(writer.persist_global_settings("{}").is_ok());
        writer.flush();
        assert_eq!(host.global_settings_count(), 0);
    }

    #[test]
    fn renders_bypass_the_queue() {
        let host = Arc::new(RecordingHost::new());
        let writer = BackgroundPersistence::start(host.clone()).unwrap();
        let key = Coordinates::new(0, 0);

        writer.render_key(key, &KeyRender::Cleared);
        assert_eq!(host.last_render(key), Some(KeyRender::Cleared));
    }

    #[test]
    fn drop_finishes_the_backlog() {
        let host = Arc::new(RecordingHost::new());
        let writer = BackgroundPersistence::start(host.clone()).unwrap();
        for i in 0..20 {
            writer.persist_global_settings(&format!("{{\"n\":{}}}", i)).unwrap();
        }
        drop(writer);
        assert_eq!(host.global_settings_count(), 20);
    }
}
