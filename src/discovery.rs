//! Locates the IDE and browser windows among all top-level OS windows.

use tracing::{debug, error, info};

use crate::config::Settings;
use crate::registry::WindowRegistry;
use crate::types::SlotKind;
use crate::winsys::{ProcessInspector, WindowSystem};

/// Case-insensitive substring match against a configured name list.
fn matches_any(process: &str, names: &[String]) -> bool {
    let process = process.to_lowercase();
    names.iter().any(|n| process.contains(&n.to_lowercase()))
}

/// Re-populate the registry from a fresh window enumeration.
///
/// Returns true iff both slots end with a valid handle. The previous
/// active/background assignment is preserved when at least one handle
/// survived unchanged; otherwise the IDE becomes active.
pub fn discover<W>(win: &W, settings: &Settings, registry: &mut WindowRegistry) -> bool
where
    W: WindowSystem + ProcessInspector,
{
    let prev_ide = registry.slot(SlotKind::Ide).handle;
    let prev_browser = registry.slot(SlotKind::Browser).handle;
    let prev_active = registry.active_kind();

    for kind in SlotKind::ALL {
        registry.slot_mut(kind).invalidate();
    }

    let windows = match win.enumerate_top_level() {
        Ok(windows) => windows,
        Err(e) => {
            error!(error = ?e, "window enumeration failed");
            return false;
        }
    };

    // Enumeration order is whatever the OS yields; the first match fills
    // each slot. The walk always runs to completion.
    for handle in windows {
        if registry.both_valid() {
            continue;
        }

        let eligible = win.is_visible(handle).unwrap_or(false)
            && win.title(handle).map(|t| !t.is_empty()).unwrap_or(false)
            && win.is_normal_window(handle).unwrap_or(false);
        if !eligible {
            continue;
        }

        let Ok(Some(process)) = win.process_name_for(handle) else {
            debug!(handle = handle, "no process name for window, skipping");
            continue;
        };

        let kind = if !registry.slot(SlotKind::Ide).is_valid()
            && matches_any(&process, &settings.ide_process_names)
        {
            SlotKind::Ide
        } else if !registry.slot(SlotKind::Browser).is_valid()
            && matches_any(&process, &settings.browser_process_names)
        {
            SlotKind::Browser
        } else {
            continue;
        };

        let title = win.title(handle).unwrap_or_default();
        info!(slot = kind.as_str(), process = %process, handle = handle, title = %title, "window detected");
        let slot = registry.slot_mut(kind);
        slot.handle = Some(handle);
        slot.process_name = process;
        slot.title = title;
    }

    // Restore remembered positions for newly filled slots
    for kind in SlotKind::ALL {
        let saved = settings.window_positions.get(kind.as_str()).copied();
        let slot = registry.slot_mut(kind);
        let Some(handle) = slot.handle else { continue };
        if let Some(rect) = saved {
            if let Err(e) = win.move_resize(handle, rect) {
                error!(slot = kind.as_str(), error = ?e, "failed to restore window position");
            } else {
                slot.last_rect = Some(rect);
            }
        }
    }

    // Keep the previous assignment only when at least one handle survived
    // the rediscovery unchanged; with both windows replaced the heuristic
    // has nothing to anchor on and the IDE becomes active.
    let ide_kept = prev_ide.is_some() && registry.slot(SlotKind::Ide).handle == prev_ide;
    let browser_kept =
        prev_browser.is_some() && registry.slot(SlotKind::Browser).handle == prev_browser;
    if ide_kept || browser_kept {
        registry.set_active(prev_active);
    } else {
        registry.set_active(SlotKind::Ide);
    }

    let found = registry.both_valid();
    if !found {
        info!(
            ide = registry.slot(SlotKind::Ide).is_valid(),
            browser = registry.slot(SlotKind::Browser).is_valid(),
            "discovery incomplete"
        );
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Rect;
    use crate::winsys::testing::{Applied, FakeWindow, FakeWindowSystem};

    fn fake_with_pair() -> FakeWindowSystem {
        let fake = FakeWindowSystem::new();
        fake.add_window(FakeWindow::new(11, "code", "main.rs - Code"));
        fake.add_window(FakeWindow::new(22, "firefox", "Docs - Mozilla Firefox"));
        fake
    }

    #[test]
    fn test_discovers_both_slots_ide_active() {
        let fake = fake_with_pair();
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();

        assert!(discover(&fake, &settings, &mut registry));
        assert_eq!(registry.slot(SlotKind::Ide).handle, Some(11));
        assert_eq!(registry.slot(SlotKind::Browser).handle, Some(22));
        assert_eq!(registry.active_kind(), SlotKind::Ide);
        assert_eq!(registry.slot(SlotKind::Ide).process_name, "code");
    }

    #[test]
    fn test_classification_is_case_insensitive_substring() {
        let fake = FakeWindowSystem::new();
        fake.add_window(FakeWindow::new(5, "PyCharm64", "project"));
        fake.add_window(FakeWindow::new(6, "Google-Chrome-Stable", "tab"));
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();

        assert!(discover(&fake, &settings, &mut registry));
        assert_eq!(registry.slot(SlotKind::Ide).handle, Some(5));
        assert_eq!(registry.slot(SlotKind::Browser).handle, Some(6));
    }

    #[test]
    fn test_first_match_wins_per_slot() {
        let fake = FakeWindowSystem::new();
        fake.add_window(FakeWindow::new(1, "firefox", "first browser"));
        fake.add_window(FakeWindow::new(2, "firefox", "second browser"));
        fake.add_window(FakeWindow::new(3, "code", "editor"));
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();

        assert!(discover(&fake, &settings, &mut registry));
        assert_eq!(registry.slot(SlotKind::Browser).handle, Some(1));
    }

    #[test]
    fn test_skips_invisible_untitled_and_tool_windows() {
        let fake = FakeWindowSystem::new();
        let mut hidden = FakeWindow::new(1, "code", "hidden editor");
        hidden.visible = false;
        fake.add_window(hidden);
        fake.add_window(FakeWindow::new(2, "firefox", ""));
        let mut tool = FakeWindow::new(3, "firefox", "picture in picture");
        tool.normal = false;
        fake.add_window(tool);

        let settings = Settings::default();
        let mut registry = WindowRegistry::new();
        assert!(!discover(&fake, &settings, &mut registry));
        assert!(!registry.slot(SlotKind::Ide).is_valid());
        assert!(!registry.slot(SlotKind::Browser).is_valid());
    }

    #[test]
    fn test_single_window_leaves_other_slot_invalid() {
        let fake = FakeWindowSystem::new();
        fake.add_window(FakeWindow::new(11, "code", "editor"));
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();

        assert!(!discover(&fake, &settings, &mut registry));
        assert!(registry.slot(SlotKind::Ide).is_valid());
        assert!(!registry.slot(SlotKind::Browser).is_valid());
    }

    #[test]
    fn test_rediscovery_with_unchanged_handles_preserves_active() {
        let fake = fake_with_pair();
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();
        discover(&fake, &settings, &mut registry);
        registry.set_active(SlotKind::Browser);

        assert!(discover(&fake, &settings, &mut registry));
        assert_eq!(registry.active_kind(), SlotKind::Browser);
    }

    #[test]
    fn test_one_surviving_handle_preserves_active() {
        let fake = fake_with_pair();
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();
        discover(&fake, &settings, &mut registry);
        registry.set_active(SlotKind::Browser);

        // IDE window is replaced by a new handle; browser survives
        fake.remove_window(11);
        fake.add_window(FakeWindow::new(99, "code", "restarted editor"));

        assert!(discover(&fake, &settings, &mut registry));
        assert_eq!(registry.slot(SlotKind::Ide).handle, Some(99));
        assert_eq!(registry.active_kind(), SlotKind::Browser);
    }

    #[test]
    fn test_both_handles_replaced_defaults_to_ide_active() {
        let fake = fake_with_pair();
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();
        discover(&fake, &settings, &mut registry);
        registry.set_active(SlotKind::Browser);

        fake.remove_window(11);
        fake.remove_window(22);
        fake.add_window(FakeWindow::new(33, "code", "new editor"));
        fake.add_window(FakeWindow::new(44, "firefox", "new browser"));

        assert!(discover(&fake, &settings, &mut registry));
        assert_eq!(registry.active_kind(), SlotKind::Ide);
    }

    #[test]
    fn test_saved_positions_restored() {
        let fake = fake_with_pair();
        let mut settings = Settings::default();
        let rect = Rect::new(0, 0, 960, 1080);
        settings.window_positions.insert("ide".to_string(), rect);
        let mut registry = WindowRegistry::new();

        assert!(discover(&fake, &settings, &mut registry));
        assert!(fake.applied().contains(&Applied::MoveResize(11, rect)));
        assert_eq!(registry.slot(SlotKind::Ide).last_rect, Some(rect));
    }
}
