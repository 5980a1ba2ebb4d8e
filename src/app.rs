//! The coordinator: single owner of all mutable state.
//!
//! Hotkey threads and timers only produce events; every state-mutating
//! operation runs here, one at a time, on the loop that drives `dispatch`
//! and the periodic ticks.

use tracing::{info, warn};

use crate::config::Settings;
use crate::discovery::discover;
use crate::engine::Engine;
use crate::guard::PerformanceGuard;
use crate::hotkeys::Action;
use crate::registry::WindowRegistry;
use crate::types::SlotKind;
use crate::winsys::{ProcessInspector, WindowSystem};

/// Whether the coordinator loop should keep running after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct App<W: WindowSystem + ProcessInspector> {
    pub win: W,
    pub settings: Settings,
    pub registry: WindowRegistry,
    engine: Engine,
    guard: PerformanceGuard,
}

impl<W: WindowSystem + ProcessInspector> App<W> {
    pub fn new(win: W, settings: Settings) -> Self {
        Self {
            win,
            settings,
            registry: WindowRegistry::new(),
            engine: Engine::new(),
            guard: PerformanceGuard::new(),
        }
    }

    /// Initial discovery and attribute application at startup. Not finding
    /// both windows is not an error; the validity tick keeps retrying.
    pub fn startup(&mut self) {
        if discover(&self.win, &self.settings, &mut self.registry) {
            self.engine.apply_all(&self.win, &self.settings, &self.registry);
        } else {
            info!("target windows not yet present, waiting for discovery");
        }
    }

    /// Execute one hotkey action. All operations log their own outcome and
    /// report failure through their return value only.
    pub fn dispatch(&mut self, action: Action) -> Flow {
        info!(action = action.as_str(), "dispatching action");
        match action {
            Action::ToggleTransparency => {
                self.engine
                    .toggle_transparency(&self.win, &mut self.settings, &mut self.registry);
            }
            Action::SwapActive => {
                self.engine
                    .swap_active(&self.win, &mut self.settings, &mut self.registry);
            }
            Action::ResetLayout => {
                self.engine
                    .reset_layout(&self.win, &mut self.settings, &mut self.registry);
            }
            Action::NextPreset => {
                self.engine
                    .cycle_preset(&self.win, &mut self.settings, &self.registry);
            }
            Action::Exit => return Flow::Exit,
        }
        Flow::Continue
    }

    /// Periodic validity probe: drop stale handles and try to re-discover
    /// missing windows, re-applying attributes on recovery.
    pub fn validity_tick(&mut self) {
        self.registry.invalidate_stale(|handle| self.win.is_window(handle));
        if self.registry.both_valid() {
            return;
        }
        if discover(&self.win, &self.settings, &mut self.registry) {
            info!("windows recovered, re-applying attributes");
            self.engine.apply_all(&self.win, &self.settings, &self.registry);
        }
    }

    /// Periodic fullscreen-application probe.
    pub fn guard_tick(&mut self) {
        self.guard
            .tick(&self.win, &self.engine, &mut self.settings, &self.registry);
    }

    /// Orderly shutdown: windows back to opaque and interactive, current
    /// rectangles captured, settings persisted.
    pub fn shutdown(&mut self) {
        self.engine.restore_all(&self.win, &self.registry);

        // A suppressed opacity (0) must never be persisted; put the cached
        // values back first. The toggle cache is newer than the guard's, so
        // it unwinds first.
        self.engine.unsuppress(&mut self.settings);
        self.guard.unsuppress(&mut self.settings);

        for kind in SlotKind::ALL {
            let Some(handle) = self.registry.slot(kind).handle else { continue };
            if let Ok(rect) = self.win.window_rect(handle) {
                self.settings
                    .window_positions
                    .insert(kind.as_str().to_string(), rect);
            }
        }
        if let Err(e) = self.settings.save() {
            warn!(error = ?e, "failed to persist settings on shutdown");
        } else {
            info!("settings saved");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::winsys::testing::{Applied, FakeWindow, FakeWindowSystem};

    const IDE: u32 = 11;
    const BROWSER: u32 = 22;

    fn app_with_pair() -> App<FakeWindowSystem> {
        let fake = FakeWindowSystem::new();
        fake.add_window(FakeWindow::new(IDE, "code", "editor"));
        fake.add_window(FakeWindow::new(BROWSER, "firefox", "docs"));
        let mut app = App::new(fake, Settings::default());
        app.startup();
        app.win.clear_applied();
        app
    }

    #[test]
    fn test_startup_discovers_and_applies() {
        let fake = FakeWindowSystem::new();
        fake.add_window(FakeWindow::new(IDE, "code", "editor"));
        fake.add_window(FakeWindow::new(BROWSER, "firefox", "docs"));
        let mut app = App::new(fake, Settings::default());
        app.startup();

        assert!(app.registry.both_valid());
        assert!(app.win.applied().contains(&Applied::Opacity(IDE, 255)));
        assert!(app.win.applied().contains(&Applied::Opacity(BROWSER, 160)));
    }

    #[test]
    fn test_dispatch_exit_stops_loop() {
        let mut app = app_with_pair();
        assert_eq!(app.dispatch(Action::Exit), Flow::Exit);
        assert_eq!(app.dispatch(Action::SwapActive), Flow::Continue);
    }

    #[test]
    fn test_dispatch_swap_flips_active() {
        let mut app = app_with_pair();
        assert_eq!(app.dispatch(Action::SwapActive), Flow::Continue);
        assert_eq!(app.registry.active_kind(), SlotKind::Browser);
    }

    #[test]
    fn test_validity_tick_recovers_closed_window() {
        let mut app = app_with_pair();

        // IDE closes, then reopens under a new handle
        app.win.remove_window(IDE);
        app.validity_tick();
        assert!(!app.registry.both_valid());

        app.win.add_window(FakeWindow::new(99, "code", "restarted editor"));
        app.win.clear_applied();
        app.validity_tick();
        assert!(app.registry.both_valid());
        assert_eq!(app.registry.slot(SlotKind::Ide).handle, Some(99));
        assert!(app.win.applied().contains(&Applied::Opacity(99, 255)));
    }

    #[test]
    fn test_validity_tick_noop_when_both_live() {
        let mut app = app_with_pair();
        app.validity_tick();
        assert!(app.win.applied().is_empty());
    }

    #[test]
    fn test_shutdown_restores_and_captures_positions() {
        let mut app = app_with_pair();
        app.dispatch(Action::ToggleTransparency);
        app.win.clear_applied();

        app.shutdown();
        assert!(app.win.applied().contains(&Applied::Opacity(IDE, 255)));
        assert!(app.win.applied().contains(&Applied::Opacity(BROWSER, 255)));
        assert!(app.win.applied().contains(&Applied::ClickThrough(BROWSER, false)));
        assert!(app.settings.window_positions.contains_key("ide"));
        assert!(app.settings.window_positions.contains_key("browser"));
    }

    #[test]
    fn test_shutdown_does_not_persist_toggled_background() {
        let mut app = app_with_pair();
        app.dispatch(Action::ToggleTransparency);
        assert_eq!(app.settings.background_opacity, 0);

        // Exiting mid-toggle must put the cached value back before save
        app.shutdown();
        assert_eq!(app.settings.background_opacity, 160);
    }

    #[test]
    fn test_shutdown_does_not_persist_guard_suppression() {
        let mut app = app_with_pair();
        let mut game = FakeWindow::new(77, "somegame", "Some Game");
        game.rect = crate::types::Rect::new(0, 0, 1920, 1080);
        game.fullscreen_style = true;
        app.win.add_window(game);
        *app.win.foreground.borrow_mut() = Some(77);

        app.guard_tick();
        assert_eq!(app.settings.background_opacity, 0);

        app.shutdown();
        assert_eq!(app.settings.background_opacity, 160);
    }
}
