use std::collections::HashMap;

use crate::models::audio_models::SlotId;

/// Which slot listens to which process.
///
/// A slot listens to at most one process at a time. Subscribing again moves
/// the subscription, revoking drops it, so no listener outlives its binding.
#[derive(Debug, Default)]
pub struct Subscriptions {
    by_slot: HashMap<SlotId, String>,
    by_process: HashMap<String, Vec<SlotId>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, slot: SlotId, process_name: &str) {
        self.revoke(slot);
        self.by_slot.insert(slot, process_name.to_string());
        self.by_process
            .entry(process_name.to_string())
            .or_default()
            .push(slot);
    }

    /// Drop the slot's subscription, returning the process it listened to.
    pub fn revoke(&mut self, slot: SlotId) -> Option<String> {
        let process_name = self.by_slot.remove(&slot)?;
        if let Some(slots) = self.by_process.get_mut(&process_name) {
            slots.retain(|s| *s != slot);
            if slots.is_empty() {
                self.by_process.remove(&process_name);
            }
        }
        Some(process_name)
    }

    pub fn process_for(&self, slot: SlotId) -> Option<&str> {
        self.by_slot.get(&slot).map(String::as_str)
    }

    /// Slots listening to `process_name`, in subscription order.
    pub fn subscribers(&self, process_name: &str) -> Vec<SlotId> {
        self.by_process.get(process_name).cloned().unwrap_or_default()
    }

    pub fn is_subscribed(&self, slot: SlotId) -> bool {
        self.by_slot.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.by_slot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_slot.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resubscribe_moves_the_listener() {
        let mut subs = Subscriptions::new();
        subs.subscribe(SlotId(1), "spotify");
        subs.subscribe(SlotId(1), "discord");

        assert!(subs.subscribers("spotify").is_empty());
        assert_eq!(subs.subscribers("discord"), vec![SlotId(1)]);
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn revoke_leaves_no_dangling_entries() {
        let mut subs = Subscriptions::new();
        subs.subscribe(SlotId(1), "chrome");
        subs.subscribe(SlotId(2), "chrome");

        assert_eq!(subs.revoke(SlotId(1)).as_deref(), Some("chrome"));
        assert_eq!(subs.subscribers("chrome"), vec![SlotId(2)]);

        subs.revoke(SlotId(2));
        assert!(subs.is_empty());
        assert!(subs.subscribers("chrome").is_empty());
        assert_eq!(subs.revoke(SlotId(2)), None);
    }
}
