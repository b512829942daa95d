use super::audio_models::ControlRole;

/// Visual state pushed to the host for one key. Each render is complete.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyRender {
    /// Blank key.
    Cleared,

    /// Bound application with at least one live session.
    Application {
        icon: Option<Vec<u8>>,
        volume: f32,
        selected: bool,
        muted: bool,
    },

    /// Static binding whose process is not running; drawn greyed, never
    /// selected or muted.
    Unavailable { icon: Option<Vec<u8>> },

    /// Fixed glyph of a control key, with an optional step label (`+10`).
    Control {
        role: ControlRole,
        label: Option<String>,
    },
}

impl KeyRender {
    pub fn is_selected(&self) -> bool {
        matches!(self, Self::Application { selected: true, .. })
    }

    pub fn is_muted(&self) -> bool {
        matches!(self, Self::Application { muted: true, .. })
    }

    pub fn volume(&self) -> Option<f32> {
        match self {
            Self::Application { volume, .. } => Some(*volume),
            _ => None,
        }
    }
}
