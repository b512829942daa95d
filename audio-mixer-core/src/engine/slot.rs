use crate::models::audio_models::{ControlRole, Coordinates, SlotId, VolumeState};
use crate::models::settings::{ApplicationSetting, SlotSettings};
use crate::models::state::PressTracker;

/// One physical key and its binding state.
#[derive(Debug, Clone)]
pub struct Slot {
    pub(crate) id: SlotId,
    pub(crate) coordinates: Coordinates,
    pub(crate) role: ControlRole,
    pub(crate) settings: SlotSettings,
    /// Current claim. Never a session handle: sessions are looked up by
    /// process name each time.
    pub(crate) bound_process: Option<String>,
    /// Last `(volume, muted)` shown, used to swallow echoes of our own writes.
    pub(crate) last_state: Option<VolumeState>,
    pub(crate) icon: Option<Vec<u8>>,
    pub(crate) press: PressTracker,
}

impl Slot {
    pub(crate) fn new(id: SlotId, coordinates: Coordinates, role: ControlRole, settings: SlotSettings) -> Self {
        Self {
            id,
            coordinates,
            role,
            settings,
            bound_process: None,
            last_state: None,
            icon: None,
            press: PressTracker::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn role(&self) -> ControlRole {
        self.role
    }

    pub fn settings(&self) -> &SlotSettings {
        &self.settings
    }

    pub fn bound_process(&self) -> Option<&str> {
        self.bound_process.as_deref()
    }

    pub fn static_binding(&self) -> Option<&ApplicationSetting> {
        self.settings.static_application.as_ref()
    }

    pub fn is_static(&self) -> bool {
        self.settings.static_application.is_some()
    }

    /// Application key without a static binding.
    pub fn is_dynamic(&self) -> bool {
        self.role.is_application() && !self.is_static()
    }

    /// Whether this slot holds `process_name`, statically or dynamically.
    pub fn claims(&self, process_name: &str) -> bool {
        self.bound_process.as_deref() == Some(process_name)
            || self.settings.static_process() == Some(process_name)
    }

    pub fn last_state(&self) -> Option<VolumeState> {
        self.last_state
    }
}

/// All slots, in the order the host added them.
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: Vec<Slot>,
    next_id: u32,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coordinates: Coordinates, role: ControlRole, settings: SlotSettings) -> SlotId {
        let id = SlotId(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot::new(id, coordinates, role, settings));
        id
    }

    pub fn remove(&mut self, id: SlotId) -> Option<Slot> {
        let index = self.slots.iter().position(|s| s.id == id)?;
        Some(self.slots.remove(index))
    }

    pub fn get(&self, id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.id == id)
    }

    pub fn id_at(&self, coordinates: Coordinates) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|s| s.coordinates == coordinates)
            .map(|s| s.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Slot> {
        self.slots.iter_mut()
    }

    /// Ids of the slots matching `predicate`, in table order.
    pub fn ids_where<P>(&self, predicate: P) -> Vec<SlotId>
    where
        P: Fn(&Slot) -> bool,
    {
        self.slots.iter().filter(|s| predicate(s)).map(|s| s.id).collect()
    }

    /// Whether a slot other than `except` claims `process_name`.
    pub fn claimed_elsewhere(&self, process_name: &str, except: SlotId) -> bool {
        self.slots
            .iter()
            .any(|s| s.id != except && s.claims(process_name))
    }

    /// Another slot currently bound to `process_name` without a static
    /// binding to it, i.e. one a static binding may displace.
    pub fn displaceable_holder(&self, process_name: &str, except: SlotId) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|s| {
                s.id != except
                    && s.bound_process.as_deref() == Some(process_name)
                    && s.settings.static_process() != Some(process_name)
            })
            .map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_settings(process: &str) -> SlotSettings {
        let mut settings = SlotSettings::default();
        settings.set_static_application(Some(ApplicationSetting::named(process)));
        settings
    }

    #[test]
    fn claims_cover_static_and_dynamic() {
        let mut table = SlotTable::new();
        let a = table.insert(Coordinates::new(0, 0), ControlRole::Application, static_settings("discord"));
        let b = table.insert(Coordinates::new(1, 0), ControlRole::Application, SlotSettings::default());
        table.get_mut(b).unwrap().bound_process = Some("chrome".into());

        assert!(table.claimed_elsewhere("discord", b));
        assert!(!table.claimed_elsewhere("discord", a));
        assert!(table.claimed_elsewhere("chrome", a));
        assert_eq!(table.id_at(Coordinates::new(1, 0)), Some(b));
    }

    #[test]
    fn static_holders_are_not_displaceable() {
        let mut table = SlotTable::new();
        let a = table.insert(Coordinates::new(0, 0), ControlRole::Application, static_settings("chrome"));
        let b = table.insert(Coordinates::new(1, 0), ControlRole::Application, static_settings("chrome"));
        table.get_mut(a).unwrap().bound_process = Some("chrome".into());

        assert_eq!(table.displaceable_holder("chrome", b), None);

        let c = table.insert(Coordinates::new(2, 0), ControlRole::Application, SlotSettings::default());
        table.get_mut(c).unwrap().bound_process = Some("chrome".into());
        assert_eq!(table.displaceable_holder("chrome", b), Some(c));
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut table = SlotTable::new();
        let a = table.insert(Coordinates::new(0, 0), ControlRole::Mute, SlotSettings::default());
        table.remove(a);
        let b = table.insert(Coordinates::new(0, 0), ControlRole::Mute, SlotSettings::default());
        assert_ne!(a, b);
        assert_eq!(table.len(), 1);
    }
}
