//! The two tracked window slots and their active/background assignment.
//!
//! Owned exclusively by the coordinator loop; other components read and
//! mutate it only through the operations in `discovery` and `engine`.

use tracing::info;

use crate::types::{Rect, SlotKind, WindowHandle};

/// One tracked window role ("ide" or "browser").
#[derive(Debug, Clone, Default)]
pub struct WindowSlot {
    pub handle: Option<WindowHandle>,
    /// Last-observed identification, informational only
    pub process_name: String,
    pub title: String,
    /// Exactly one slot is active whenever both handles are valid
    pub is_active: bool,
    /// Last known screen rectangle, restored after re-discovery
    pub last_rect: Option<Rect>,
}

impl WindowSlot {
    pub fn is_valid(&self) -> bool {
        self.handle.is_some()
    }

    pub fn invalidate(&mut self) {
        self.handle = None;
    }
}

#[derive(Debug, Default)]
pub struct WindowRegistry {
    ide: WindowSlot,
    browser: WindowSlot,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, kind: SlotKind) -> &WindowSlot {
        match kind {
            SlotKind::Ide => &self.ide,
            SlotKind::Browser => &self.browser,
        }
    }

    pub fn slot_mut(&mut self, kind: SlotKind) -> &mut WindowSlot {
        match kind {
            SlotKind::Ide => &mut self.ide,
            SlotKind::Browser => &mut self.browser,
        }
    }

    pub fn both_valid(&self) -> bool {
        self.ide.is_valid() && self.browser.is_valid()
    }

    /// The currently active slot. Defaults to the IDE when no flag is set,
    /// which is also the assignment discovery falls back to.
    pub fn active_kind(&self) -> SlotKind {
        if self.browser.is_active && !self.ide.is_active {
            SlotKind::Browser
        } else {
            SlotKind::Ide
        }
    }

    /// Mark `kind` active and the other slot background.
    pub fn set_active(&mut self, kind: SlotKind) {
        self.slot_mut(kind).is_active = true;
        self.slot_mut(kind.other()).is_active = false;
    }

    /// Invert the active/background assignment.
    pub fn swap_active(&mut self) {
        let next = self.active_kind().other();
        self.set_active(next);
        info!(active = next.as_str(), "active window swapped");
    }

    /// Drop handles whose window the OS no longer knows. Returns true if
    /// any slot was invalidated.
    pub fn invalidate_stale(&mut self, is_window: impl Fn(WindowHandle) -> bool) -> bool {
        let mut changed = false;
        for kind in SlotKind::ALL {
            let slot = self.slot_mut(kind);
            if let Some(handle) = slot.handle
                && !is_window(handle)
            {
                info!(slot = kind.as_str(), handle = handle, "window handle went stale");
                slot.invalidate();
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_registry() -> WindowRegistry {
        let mut registry = WindowRegistry::new();
        registry.slot_mut(SlotKind::Ide).handle = Some(11);
        registry.slot_mut(SlotKind::Browser).handle = Some(22);
        registry.set_active(SlotKind::Ide);
        registry
    }

    #[test]
    fn test_exactly_one_active_after_set() {
        let mut registry = filled_registry();
        registry.set_active(SlotKind::Browser);
        assert!(registry.slot(SlotKind::Browser).is_active);
        assert!(!registry.slot(SlotKind::Ide).is_active);
    }

    #[test]
    fn test_swap_active_is_involution() {
        let mut registry = filled_registry();
        assert_eq!(registry.active_kind(), SlotKind::Ide);
        registry.swap_active();
        assert_eq!(registry.active_kind(), SlotKind::Browser);
        registry.swap_active();
        assert_eq!(registry.active_kind(), SlotKind::Ide);
    }

    #[test]
    fn test_active_kind_defaults_to_ide() {
        let registry = WindowRegistry::new();
        assert_eq!(registry.active_kind(), SlotKind::Ide);
    }

    #[test]
    fn test_invalidate_stale_drops_dead_handles() {
        let mut registry = filled_registry();
        let changed = registry.invalidate_stale(|h| h == 11);
        assert!(changed);
        assert!(registry.slot(SlotKind::Ide).is_valid());
        assert!(!registry.slot(SlotKind::Browser).is_valid());
        assert!(!registry.both_valid());
    }

    #[test]
    fn test_invalidate_stale_noop_when_all_live() {
        let mut registry = filled_registry();
        let changed = registry.invalidate_stale(|_| true);
        assert!(!changed);
        assert!(registry.both_valid());
    }
}
