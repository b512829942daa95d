use crate::models::audio_models::Coordinates;
use crate::models::state::{PressGesture, PressTicket};
use crate::traits::audio_backend::AudioBackend;

use super::mixer::Mixer;

impl<B: AudioBackend> Mixer<B> {
    /// A key went down. The returned ticket must be handed to
    /// [`Mixer::long_press_elapsed`] once the long-press duration has passed.
    pub fn key_pressed(&mut self, coordinates: Coordinates) -> Option<PressTicket> {
        let id = self.state.slots.id_at(coordinates)?;
        let slot = self.state.slots.get_mut(id)?;
        let generation = slot.press.press();
        Some(PressTicket {
            coordinates,
            generation,
        })
    }

    /// The long-press deadline of a press passed. Returns whether the press
    /// now counts as long; stale tickets are ignored.
    pub fn long_press_elapsed(&mut self, ticket: PressTicket) -> bool {
        let Some(id) = self.state.slots.id_at(ticket.coordinates) else {
            return false;
        };
        self.state
            .slots
            .get_mut(id)
            .is_some_and(|slot| slot.press.elapse(ticket.generation))
    }

    /// A key came up. Runs the action for the completed gesture:
    ///
    /// - application key, short: select it as the control target
    /// - application key, long: toggle its process on the blacklist
    /// - control key, short: apply the role to the selected application
    pub fn key_released(&mut self, coordinates: Coordinates) -> Option<PressGesture> {
        let id = self.state.slots.id_at(coordinates)?;
        let slot = self.state.slots.get_mut(id)?;
        let gesture = slot.press.release()?;
        let role = slot.role;
        let bound = slot.bound_process.clone();

        match (role.is_application(), gesture) {
            (true, PressGesture::Long) => {
                if let Some(process) = bound {
                    self.engine().release(id, true);
                    self.state.queue.enqueue(id);
                    self.toggle_blacklist(&process);
                }
            }
            (true, PressGesture::Short) => match bound {
                Some(process) if self.state.registry.has_process(&process) => self.engine().select(id),
                _ => log::debug!("Ignoring press on {}: nothing running", coordinates),
            },
            (false, PressGesture::Short) => {
                let fallback = self.config.default_step_fraction();
                let mut engine = self.engine();
                let step = engine.step_fraction(id, fallback);
                if let Err(e) = engine.adjust_selected(role, step) {
                    if e.is_session_loss() {
                        log::debug!("{:?} key at {}: {}", role, coordinates, e);
                    } else {
                        log::info!("{:?} key at {} ignored: {}", role, coordinates, e);
                    }
                }
                engine.drain();
            }
            (false, PressGesture::Long) => {}
        }
        Some(gesture)
    }
}
