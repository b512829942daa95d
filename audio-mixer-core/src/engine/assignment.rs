use crate::models::audio_models::{AudioSession, ControlRole, SlotId};
use crate::models::error::MixerError;
use crate::models::render::KeyRender;
use crate::registry::session_registry::RegistryEvent;
use crate::traits::audio_backend::AudioBackend;
use crate::traits::host_delegate::HostDelegate;

use super::sync_group::SyncGroup;
use super::MixerState;

/// Upper bound on queue passes per drain. Slots that keep failing stay
/// queued for the next drain instead of spinning here.
pub const MAX_DRAIN_PASSES: usize = 4;

/// Outcome of assigning one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Control key; never bound to a process.
    Control,
    /// No eligible process.
    Unbound,
    /// Bound with at least one live session.
    Live(String),
    /// Statically bound to a process that is not running.
    Unavailable(String),
    /// A session vanished while attaching; the slot is queued again.
    Retrying(String),
}

impl Binding {
    pub fn process_name(&self) -> Option<&str> {
        match self {
            Self::Live(p) | Self::Unavailable(p) | Self::Retrying(p) => Some(p),
            Self::Control | Self::Unbound => None,
        }
    }
}

/// Decides which slot owns which process and keeps the keys rendered.
///
/// Borrowed per operation; all mutation goes through the [`MixerState`] it
/// holds, so callers serialize engine work by serializing access to that
/// state.
pub struct AssignmentEngine<'a> {
    pub(crate) state: &'a mut MixerState,
    pub(crate) backend: &'a dyn AudioBackend,
    pub(crate) host: &'a dyn HostDelegate,
}

impl<'a> AssignmentEngine<'a> {
    pub fn new(state: &'a mut MixerState, backend: &'a dyn AudioBackend, host: &'a dyn HostDelegate) -> Self {
        Self { state, backend, host }
    }

    /// (Re)bind one slot and render it.
    ///
    /// Session loss while attaching is not an error: the slot is queued
    /// again and [`Binding::Retrying`] is returned.
    pub fn assign(&mut self, slot_id: SlotId) -> Result<Binding, MixerError> {
        let snapshot = self.state.registry.list();
        let slot = self
            .state
            .slots
            .get(slot_id)
            .ok_or_else(|| MixerError::UnknownSlot(slot_id.to_string()))?;
        let role = slot.role;
        let coordinates = slot.coordinates;
        let static_app = slot.static_binding().cloned();

        self.release(slot_id, false);

        if !role.is_application() {
            let label = self.control_label(slot_id);
            self.host.render_key(coordinates, &KeyRender::Control { role, label });
            return Ok(Binding::Control);
        }

        let process = match &static_app {
            Some(app) => {
                self.displace(&app.process_name, slot_id);
                Some(app.process_name.clone())
            }
            None => self.pick_dynamic(&snapshot, slot_id),
        };

        let Some(process) = process else {
            if let Some(slot) = self.state.slots.get_mut(slot_id) {
                slot.icon = None;
            }
            self.host.render_key(coordinates, &KeyRender::Cleared);
            return Ok(Binding::Unbound);
        };

        if let Some(slot) = self.state.slots.get_mut(slot_id) {
            slot.bound_process = Some(process.clone());
        }

        let sessions: Vec<AudioSession> = snapshot
            .into_iter()
            .filter(|s| s.process_name == process)
            .collect();

        if sessions.is_empty() {
            let icon = static_app.as_ref().and_then(|app| app.icon_bytes());
            if let Some(slot) = self.state.slots.get_mut(slot_id) {
                slot.icon = icon.clone();
            }
            log::debug!("{} statically bound to {}, not running", coordinates, process);
            self.host.render_key(coordinates, &KeyRender::Unavailable { icon });
            return Ok(Binding::Unavailable(process));
        }

        match self.attach(slot_id, SyncGroup::new(process.clone(), sessions)) {
            Ok(()) => {
                log::debug!("{} bound to {}", coordinates, process);
                Ok(Binding::Live(process))
            }
            Err(e) => {
                self.state.registry.subscriptions_mut().revoke(slot_id);
                self.state.queue.enqueue(slot_id);
                log::warn!("Binding {} to {} failed, retrying: {}", coordinates, process, e);
                Ok(Binding::Retrying(process))
            }
        }
    }

    /// Drop the slot's binding and its subscription.
    ///
    /// With `reset_icon` a dynamic slot is also drawn blank; a static slot
    /// keeps its cached icon either way.
    pub fn release(&mut self, slot_id: SlotId, reset_icon: bool) {
        self.state.registry.subscriptions_mut().revoke(slot_id);
        let Some(slot) = self.state.slots.get_mut(slot_id) else {
            return;
        };
        slot.bound_process = None;
        slot.last_state = None;
        if reset_icon && !slot.is_static() && slot.role.is_application() {
            slot.icon = None;
            self.host.render_key(slot.coordinates, &KeyRender::Cleared);
        }
    }

    /// Assign every queued slot, oldest first. Returns how many were assigned.
    pub fn drain(&mut self) -> usize {
        let mut assigned = 0;
        for _ in 0..MAX_DRAIN_PASSES {
            let batch = self.state.queue.take_all();
            if batch.is_empty() {
                break;
            }
            for slot_id in batch {
                if self.state.slots.get(slot_id).is_none() {
                    continue;
                }
                match self.assign(slot_id) {
                    Ok(_) => assigned += 1,
                    Err(e) => log::warn!("Reassignment of {} failed: {}", slot_id, e),
                }
            }
        }
        if !self.state.queue.is_empty() {
            log::debug!("{} slots still pending reassignment", self.state.queue.len());
        }
        assigned
    }

    /// React to one registry change. Never assigns directly; slots that need
    /// a new binding go through the queue.
    pub fn handle_event(&mut self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Appeared(session) => self.on_appeared(session),
            RegistryEvent::Disconnected(session) => self.on_disconnected(session),
            RegistryEvent::VolumeChanged(session) => self.synchronize(session),
        }
    }

    /// Draw the slot from what it already holds, without reassigning.
    pub fn render_slot(&mut self, slot_id: SlotId) {
        let Some(slot) = self.state.slots.get(slot_id) else {
            return;
        };
        let coordinates = slot.coordinates;
        let render = if !slot.role.is_application() {
            KeyRender::Control {
                role: slot.role,
                label: self.control_label(slot_id),
            }
        } else {
            let subscribed = self.state.registry.subscriptions().is_subscribed(slot_id);
            match (&slot.bound_process, slot.last_state) {
                (None, _) => KeyRender::Cleared,
                (Some(_), Some(state)) if subscribed => KeyRender::Application {
                    icon: slot.icon.clone(),
                    volume: state.volume,
                    selected: self.state.selected == Some(slot_id),
                    muted: state.muted,
                },
                (Some(_), _) => KeyRender::Unavailable {
                    icon: slot.icon.clone(),
                },
            }
        };
        self.host.render_key(coordinates, &render);
    }

    /// Make `slot_id` the target of the control keys.
    pub fn select(&mut self, slot_id: SlotId) {
        let previous = self.state.selected.replace(slot_id);
        if let Some(previous) = previous.filter(|p| *p != slot_id) {
            self.render_slot(previous);
        }
        self.render_slot(slot_id);
    }

    pub fn clear_selection(&mut self) {
        if let Some(previous) = self.state.selected.take() {
            self.render_slot(previous);
        }
    }

    /// Step label shown on volume keys, e.g. `+10`.
    pub(crate) fn control_label(&self, slot_id: SlotId) -> Option<String> {
        let slot = self.state.slots.get(slot_id)?;
        let step = if slot.settings.global_lock {
            &self.state.global.volume_step
        } else {
            &slot.settings.independent_volume_step
        };
        match slot.role {
            ControlRole::VolumeUp => Some(format!("+{}", step.trim())),
            ControlRole::VolumeDown => Some(format!("-{}", step.trim())),
            ControlRole::Mute | ControlRole::Application => None,
        }
    }

    /// Release another dynamic holder of `process_name` so `claimant` can
    /// take it. The holder is fully released before the caller binds.
    fn displace(&mut self, process_name: &str, claimant: SlotId) {
        let Some(holder) = self.state.slots.displaceable_holder(process_name, claimant) else {
            return;
        };
        self.release(holder, true);
        self.state.queue.enqueue(holder);
        log::info!("{} displaced from {} by a static binding", holder, process_name);
    }

    /// First session in snapshot order that is neither blacklisted nor
    /// claimed by another slot.
    fn pick_dynamic(&self, snapshot: &[AudioSession], slot_id: SlotId) -> Option<String> {
        snapshot
            .iter()
            .find(|s| {
                !self.state.blacklist.contains(&s.process_name)
                    && !self.state.slots.claimed_elsewhere(&s.process_name, slot_id)
            })
            .map(|s| s.process_name.clone())
    }

    /// Subscribe the slot to its group and draw the combined state.
    fn attach(&mut self, slot_id: SlotId, group: SyncGroup) -> Result<(), MixerError> {
        let state = group.combined_state(self.backend)?;
        let session_icon = group.first().and_then(|s| s.process_icon.clone());

        self.state
            .registry
            .subscriptions_mut()
            .subscribe(slot_id, group.process_name());
        let selected = self.state.selected == Some(slot_id);
        let Some(slot) = self.state.slots.get_mut(slot_id) else {
            return Ok(());
        };
        let icon = session_icon.or_else(|| slot.static_binding().and_then(|app| app.icon_bytes()));
        slot.last_state = Some(state);
        slot.icon = icon.clone();
        self.host.render_key(
            slot.coordinates,
            &KeyRender::Application {
                icon,
                volume: state.volume,
                selected,
                muted: state.muted,
            },
        );
        Ok(())
    }

    /// Re-attach a subscribed slot after its group changed shape.
    fn refresh_group(&mut self, slot_id: SlotId, process_name: &str) {
        let group = SyncGroup::from_registry(&self.state.registry, process_name);
        if let Err(e) = self.attach(slot_id, group) {
            log::debug!("Refreshing {} failed, queueing: {}", slot_id, e);
            self.state.queue.enqueue(slot_id);
        }
    }

    fn on_appeared(&mut self, session: &AudioSession) {
        let process = session.process_name.as_str();

        let subscribers = self.state.registry.subscriptions().subscribers(process);
        if !subscribers.is_empty() {
            for slot_id in subscribers {
                self.refresh_group(slot_id, process);
            }
            return;
        }

        let waiting = self
            .state
            .slots
            .ids_where(|s| s.bound_process.as_deref() == Some(process));
        if !waiting.is_empty() {
            for slot_id in waiting {
                self.state.queue.enqueue(slot_id);
            }
            return;
        }

        let unclaimed = !self.state.slots.iter().any(|s| s.claims(process));
        if unclaimed && !self.state.blacklist.contains(process) {
            for slot_id in self
                .state
                .slots
                .ids_where(|s| s.is_dynamic() && s.bound_process.is_none())
            {
                self.state.queue.enqueue(slot_id);
            }
        }
    }

    fn on_disconnected(&mut self, session: &AudioSession) {
        let process = session.process_name.as_str();
        let group_empty = !self.state.registry.has_process(process);
        for slot_id in self.state.registry.subscriptions().subscribers(process) {
            if group_empty {
                log::debug!("Last session of {} gone, queueing {}", process, slot_id);
                self.state.queue.enqueue(slot_id);
            } else {
                self.refresh_group(slot_id, process);
            }
        }
    }
}
