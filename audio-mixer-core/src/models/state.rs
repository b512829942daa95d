use super::audio_models::Coordinates;

/// Per-key press state machine.
///
/// State transitions:
/// ```text
/// idle → pressed ──(deadline)──→ long_press_fired
///          ↓                            ↓
///        release → Short          release → Long
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressState {
    Idle,
    Pressed { generation: u64 },
    LongPressFired,
}

impl PressState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_pressed(&self) -> bool {
        matches!(self, Self::Pressed { .. })
    }
}

/// How a completed press/release pair is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressGesture {
    Short,
    Long,
}

/// Handle for the long-press deadline of one press.
///
/// Delivered back to the mixer when the deadline passes. Tickets from an
/// earlier press carry an older generation and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PressTicket {
    pub coordinates: Coordinates,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct PressTracker {
    state: PressState,
    generation: u64,
}

impl PressTracker {
    pub fn new() -> Self {
        Self {
            state: PressState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> PressState {
        self.state
    }

    /// Start a press, returning the generation its deadline must match.
    pub fn press(&mut self) -> u64 {
        self.generation += 1;
        self.state = PressState::Pressed {
            generation: self.generation,
        };
        self.generation
    }

    /// Deadline of a press elapsed. Returns whether the long press fired.
    pub fn elapse(&mut self, generation: u64) -> bool {
        match self.state {
            PressState::Pressed { generation: current } if current == generation => {
                self.state = PressState::LongPressFired;
                true
            }
            _ => false,
        }
    }

    /// Finish the press. `None` if no press was in flight.
    pub fn release(&mut self) -> Option<PressGesture> {
        let gesture = match self.state {
            PressState::Idle => None,
            PressState::Pressed { .. } => Some(PressGesture::Short),
            PressState::LongPressFired => Some(PressGesture::Long),
        };
        self.state = PressState::Idle;
        gesture
    }
}

impl Default for PressTracker {
    fn default() -> Self {
        Self::new()
    }
}
