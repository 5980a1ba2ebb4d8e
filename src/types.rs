use serde::{Deserialize, Serialize};

/// X11 window identifier. Ephemeral; never persisted.
pub type WindowHandle = u32;

/// Screen rectangle in absolute coordinates, persisted as `[left, top, right, bottom]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

impl From<[i32; 4]> for Rect {
    fn from(v: [i32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Rect> for [i32; 4] {
    fn from(r: Rect) -> Self {
        [r.left, r.top, r.right, r.bottom]
    }
}

/// The two tracked window roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Ide,
    Browser,
}

impl SlotKind {
    pub const ALL: [SlotKind; 2] = [SlotKind::Ide, SlotKind::Browser];

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Ide => "ide",
            SlotKind::Browser => "browser",
        }
    }

    pub fn other(&self) -> SlotKind {
        match self {
            SlotKind::Ide => SlotKind::Browser,
            SlotKind::Browser => SlotKind::Ide,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_serializes_as_array() {
        let r = Rect::new(0, 0, 960, 1080);
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "[0,0,960,1080]");

        let back: Rect = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_rect_dimensions() {
        let r = Rect::new(10, 20, 110, 220);
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 200);
    }
}
