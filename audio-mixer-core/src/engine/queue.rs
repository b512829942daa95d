use std::collections::VecDeque;

use crate::models::audio_models::SlotId;

/// Slots waiting to be reassigned, oldest first, each at most once.
#[derive(Debug, Default)]
pub struct ReassignmentQueue {
    pending: VecDeque<SlotId>,
}

impl ReassignmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `slot` unless it is already pending. Returns whether it was added.
    pub fn enqueue(&mut self, slot: SlotId) -> bool {
        if self.pending.contains(&slot) {
            return false;
        }
        self.pending.push_back(slot);
        true
    }

    pub fn pop(&mut self) -> Option<SlotId> {
        self.pending.pop_front()
    }

    /// Take everything pending, leaving the queue empty.
    pub fn take_all(&mut self) -> Vec<SlotId> {
        self.pending.drain(..).collect()
    }

    pub fn remove(&mut self, slot: SlotId) {
        self.pending.retain(|s| *s != slot);
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.pending.contains(&slot)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_is_idempotent_and_fifo() {
        let mut queue = ReassignmentQueue::new();
        assert!(queue.enqueue(SlotId(2)));
        assert!(queue.enqueue(SlotId(1)));
        assert!(!queue.enqueue(SlotId(2)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(SlotId(2)));
        assert_eq!(queue.pop(), Some(SlotId(1)));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn slot_can_requeue_after_being_taken() {
        let mut queue = ReassignmentQueue::new();
        queue.enqueue(SlotId(1));
        let batch = queue.take_all();
        assert_eq!(batch, vec![SlotId(1)]);
        assert!(queue.is_empty());

        assert!(queue.enqueue(SlotId(1)));
        queue.remove(SlotId(1));
        assert!(!queue.contains(SlotId(1)));
    }
}
