//! Slot assignment and volume synchronization.
//!
//! [`MixerState`] holds everything the engine mutates. An
//! [`AssignmentEngine`] borrows it together with the backend and host for
//! the duration of one operation.

pub mod assignment;
pub mod blacklist;
pub mod controls;
pub mod queue;
pub mod slot;
pub mod sync_group;

use crate::models::audio_models::SlotId;
use crate::models::settings::GlobalSettings;
use crate::registry::session_registry::AudioSessionRegistry;

pub use assignment::{AssignmentEngine, Binding};
pub use blacklist::Blacklist;
pub use queue::ReassignmentQueue;
pub use slot::{Slot, SlotTable};
pub use sync_group::{SyncGroup, SyncReport};

/// Mutable state of one mixer.
#[derive(Debug, Default)]
pub struct MixerState {
    pub(crate) registry: AudioSessionRegistry,
    pub(crate) slots: SlotTable,
    pub(crate) queue: ReassignmentQueue,
    pub(crate) blacklist: Blacklist,
    /// Application slot targeted by Mute / VolumeUp / VolumeDown keys.
    pub(crate) selected: Option<SlotId>,
    pub(crate) global: GlobalSettings,
}

impl MixerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &AudioSessionRegistry {
        &self.registry
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn queue(&self) -> &ReassignmentQueue {
        &self.queue
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn selected(&self) -> Option<SlotId> {
        self.selected
    }

    pub fn global(&self) -> &GlobalSettings {
        &self.global
    }
}
