use std::fmt;

/// Volume differences below this are treated as equal.
pub const VOLUME_EPSILON: f32 = 1e-4;

/// Opaque identifier of one OS audio session (session instance id on Windows).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random identifier for backends that have no native one.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a key on the controller. Stable identity of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinates {
    pub column: u8,
    pub row: u8,
}

impl Coordinates {
    pub const fn new(column: u8, row: u8) -> Self {
        Self { column, row }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.row)
    }
}

/// Internal handle of a slot, allocated by the slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// What pressing a slot's key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlRole {
    /// Bound to one application's sessions.
    Application,
    /// Toggles mute of the selected application.
    Mute,
    VolumeUp,
    VolumeDown,
}

impl ControlRole {
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application)
    }
}

/// Volume and mute of a session, read together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    pub volume: f32,
    pub muted: bool,
}

impl VolumeState {
    /// Volume is clamped to 0.0–1.0.
    pub fn new(volume: f32, muted: bool) -> Self {
        Self {
            volume: volume.clamp(0.0, 1.0),
            muted,
        }
    }

    pub fn differs_from(&self, other: &VolumeState) -> bool {
        self.muted != other.muted || (self.volume - other.volume).abs() > VOLUME_EPSILON
    }
}

/// One OS-level audio stream as last seen by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSession {
    pub id: SessionId,
    pub process_name: String,
    pub display_name: String,
    /// Encoded icon image, if the backend could extract one.
    pub process_icon: Option<Vec<u8>>,
    pub volume: f32,
    pub muted: bool,
}

impl AudioSession {
    pub fn new(id: SessionId, process_name: impl Into<String>, volume: f32, muted: bool) -> Self {
        let process_name = process_name.into();
        Self {
            id,
            display_name: process_name.clone(),
            process_name,
            process_icon: None,
            volume,
            muted,
        }
    }

    pub fn volume_state(&self) -> VolumeState {
        VolumeState::new(self.volume, self.muted)
    }
}
