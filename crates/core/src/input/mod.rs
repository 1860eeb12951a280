use crate::{FieldConfig, LaneConfig};

/// Maps keyboard keys to lanes, case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    keys: Vec<char>,
}

impl KeyMap {
    /// Uses the first `count` configured keys.
    pub fn from_config(lanes: &LaneConfig) -> Self {
        Self {
            keys: lanes
                .keys
                .iter()
                .take(lanes.count)
                .map(|key| key.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn lane_for(&self, key: char) -> Option<usize> {
        let key = key.to_ascii_lowercase();
        self.keys.iter().position(|bound| *bound == key)
    }

    pub fn key_for(&self, lane: usize) -> Option<char> {
        self.keys.get(lane).copied()
    }
}

/// On-screen rectangle the field is displayed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Converts client (screen) coordinates into field coordinates, undoing the
/// offset and scaling of the displayed field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerMapper {
    field_width: f32,
    field_height: f32,
}

impl PointerMapper {
    pub fn new(field: &FieldConfig) -> Self {
        Self {
            field_width: field.width,
            field_height: field.height,
        }
    }

    /// Returns `None` for a degenerate (zero sized) display rectangle.
    pub fn to_field(&self, client_x: f32, client_y: f32, rect: &DisplayRect) -> Option<(f32, f32)> {
        if rect.width <= 0.0 || rect.height <= 0.0 {
            return None;
        }
        let x = (client_x - rect.left) * self.field_width / rect.width;
        let y = (client_y - rect.top) * self.field_height / rect.height;
        Some((x, y))
    }
}
