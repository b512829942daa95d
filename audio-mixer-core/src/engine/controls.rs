use crate::models::audio_models::{ControlRole, SlotId, VolumeState};
use crate::models::error::MixerError;
use crate::models::render::KeyRender;
use crate::models::settings::parse_volume_step;

use super::assignment::AssignmentEngine;
use super::sync_group::SyncGroup;

/// State a control key moves the selected application to.
///
/// Volume keys on a muted application only unmute it.
pub fn next_volume_state(role: ControlRole, current: VolumeState, step: f32) -> VolumeState {
    match role {
        ControlRole::Mute => VolumeState::new(current.volume, !current.muted),
        ControlRole::VolumeUp | ControlRole::VolumeDown if current.muted => {
            VolumeState::new(current.volume, false)
        }
        ControlRole::VolumeUp => VolumeState::new(current.volume + step, false),
        ControlRole::VolumeDown => VolumeState::new(current.volume - step, false),
        ControlRole::Application => current,
    }
}

impl AssignmentEngine<'_> {
    /// Step of a control slot as a fraction, following the global step while
    /// the slot is locked to it.
    pub fn step_fraction(&self, slot_id: SlotId, fallback: f32) -> f32 {
        let Some(slot) = self.state.slots.get(slot_id) else {
            return fallback;
        };
        let raw = if slot.settings.global_lock {
            &self.state.global.volume_step
        } else {
            &slot.settings.independent_volume_step
        };
        parse_volume_step(raw).unwrap_or(fallback)
    }

    /// Apply a control role to the selected application's whole group.
    ///
    /// Without a selected, live application this fails with
    /// [`MixerError::MissingVolumeHandle`] and drops the selection.
    pub fn adjust_selected(&mut self, role: ControlRole, step: f32) -> Result<VolumeState, MixerError> {
        let Some(selected) = self.state.selected else {
            return Err(MixerError::MissingVolumeHandle("no application selected".into()));
        };
        let Some(process) = self
            .state
            .slots
            .get(selected)
            .and_then(|s| s.bound_process.clone())
        else {
            self.clear_selection();
            return Err(MixerError::MissingVolumeHandle(format!("{} is not bound", selected)));
        };

        let group = SyncGroup::from_registry(&self.state.registry, &process);
        if group.is_empty() {
            self.clear_selection();
            return Err(MixerError::MissingVolumeHandle(format!("{} is not running", process)));
        }

        let current = match group.combined_state(self.backend) {
            Ok(state) => state,
            Err(e) => {
                self.state.queue.enqueue(selected);
                return Err(e);
            }
        };
        let target = next_volume_state(role, current, step);
        let report = group.apply(self.backend, target);
        self.record(&report, target);
        if !report.lost.is_empty() {
            self.state.queue.enqueue(selected);
        }

        let Some(slot) = self.state.slots.get_mut(selected) else {
            return Ok(target);
        };
        slot.last_state = Some(target);
        self.host.render_key(
            slot.coordinates,
            &KeyRender::Application {
                icon: slot.icon.clone(),
                volume: target.volume,
                selected: true,
                muted: target.muted,
            },
        );
        log::debug!(
            "{:?} on {}: volume {:.2}, muted {}",
            role,
            process,
            target.volume,
            target.muted
        );
        Ok(target)
    }
}
