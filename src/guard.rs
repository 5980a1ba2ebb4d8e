//! Fullscreen-application detection.
//!
//! While a foreign fullscreen application (game, video player) holds the
//! foreground, a translucent background window would bleed through it, so
//! the guard temporarily drops the background to opacity 0 and restores it
//! once the fullscreen app goes away.

use tracing::info;

use crate::config::Settings;
use crate::engine::Engine;
use crate::registry::WindowRegistry;
use crate::types::SlotKind;
use crate::winsys::WindowSystem;

#[derive(Debug, Default)]
pub struct PerformanceGuard {
    fullscreen_active: bool,
    saved_background: Option<u8>,
}

impl PerformanceGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff a window other than the tracked pair holds the foreground,
    /// covers the whole primary screen and carries fullscreen styling.
    pub fn check_fullscreen<W: WindowSystem>(
        &self,
        win: &W,
        registry: &WindowRegistry,
    ) -> bool {
        let Ok(Some(foreground)) = win.foreground_window() else {
            return false;
        };
        // Our own windows never count, even when maximized borderless
        if SlotKind::ALL
            .iter()
            .any(|&kind| registry.slot(kind).handle == Some(foreground))
        {
            return false;
        }

        let Ok(rect) = win.window_rect(foreground) else {
            return false;
        };
        let (width, height) = win.primary_screen_size();
        let covers_screen =
            rect.left <= 0 && rect.top <= 0 && rect.right >= width && rect.bottom >= height;

        covers_screen && win.is_fullscreen_style(foreground).unwrap_or(false)
    }

    /// Periodic probe. Acts only on transitions: entering fullscreen caches
    /// the background opacity and forces it to 0, leaving restores it.
    pub fn tick<W: WindowSystem>(
        &mut self,
        win: &W,
        engine: &Engine,
        settings: &mut Settings,
        registry: &WindowRegistry,
    ) {
        if !settings.performance_mode {
            return;
        }

        let fullscreen = self.check_fullscreen(win, registry);
        if fullscreen == self.fullscreen_active {
            return;
        }
        self.fullscreen_active = fullscreen;

        if fullscreen {
            info!("fullscreen application detected, suppressing background");
            self.saved_background = Some(settings.background_opacity);
            settings.background_opacity = 0;
        } else {
            match self.saved_background.take() {
                Some(saved) => {
                    settings.background_opacity = saved;
                    info!(background = saved, "fullscreen application gone, background restored");
                }
                None => {
                    info!("fullscreen application gone, no cached background to restore");
                }
            }
        }
        engine.apply_all(win, settings, registry);
    }

    /// Put a guard-cached background opacity back into the settings without
    /// touching any window. Called before the settings are persisted so the
    /// suppressed value never reaches disk.
    pub fn unsuppress(&mut self, settings: &mut Settings) {
        if let Some(saved) = self.saved_background.take() {
            settings.background_opacity = saved;
            info!(background = saved, "guard suppression cleared");
        }
        self.fullscreen_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;
    use crate::types::Rect;
    use crate::winsys::testing::{Applied, FakeWindow, FakeWindowSystem};

    const IDE: u32 = 11;
    const BROWSER: u32 = 22;
    const GAME: u32 = 77;

    fn setup() -> (FakeWindowSystem, Settings, WindowRegistry) {
        let fake = FakeWindowSystem::new();
        fake.add_window(FakeWindow::new(IDE, "code", "editor"));
        fake.add_window(FakeWindow::new(BROWSER, "firefox", "docs"));
        let settings = Settings::default();
        let mut registry = WindowRegistry::new();
        assert!(discover(&fake, &settings, &mut registry));
        fake.clear_applied();
        (fake, settings, registry)
    }

    fn add_fullscreen_game(fake: &FakeWindowSystem) {
        let mut game = FakeWindow::new(GAME, "somegame", "Some Game");
        game.rect = Rect::new(0, 0, 1920, 1080);
        game.fullscreen_style = true;
        fake.add_window(game);
        *fake.foreground.borrow_mut() = Some(GAME);
    }

    #[test]
    fn test_check_fullscreen_detects_foreign_fullscreen_window() {
        let (fake, _, registry) = setup();
        add_fullscreen_game(&fake);

        let guard = PerformanceGuard::new();
        assert!(guard.check_fullscreen(&fake, &registry));
    }

    #[test]
    fn test_own_windows_never_trigger() {
        let (fake, _, registry) = setup();
        {
            let mut windows = fake.windows.borrow_mut();
            let ide = windows.iter_mut().find(|w| w.handle == IDE).unwrap();
            ide.rect = Rect::new(0, 0, 1920, 1080);
            ide.fullscreen_style = true;
        }
        *fake.foreground.borrow_mut() = Some(IDE);

        let guard = PerformanceGuard::new();
        assert!(!guard.check_fullscreen(&fake, &registry));
    }

    #[test]
    fn test_partial_coverage_does_not_trigger() {
        let (fake, _, registry) = setup();
        let mut game = FakeWindow::new(GAME, "somegame", "Some Game");
        game.rect = Rect::new(0, 0, 1280, 720);
        game.fullscreen_style = true;
        fake.add_window(game);
        *fake.foreground.borrow_mut() = Some(GAME);

        let guard = PerformanceGuard::new();
        assert!(!guard.check_fullscreen(&fake, &registry));
    }

    #[test]
    fn test_titled_fullscreen_rect_does_not_trigger() {
        let (fake, _, registry) = setup();
        // Covers the screen but keeps normal window styling (maximized app)
        let mut app = FakeWindow::new(GAME, "someapp", "Maximized App");
        app.rect = Rect::new(0, 0, 1920, 1080);
        fake.add_window(app);
        *fake.foreground.borrow_mut() = Some(GAME);

        let guard = PerformanceGuard::new();
        assert!(!guard.check_fullscreen(&fake, &registry));
    }

    #[test]
    fn test_tick_suppresses_and_restores_on_transitions() {
        let (fake, mut settings, registry) = setup();
        let engine = Engine::new();
        let mut guard = PerformanceGuard::new();

        add_fullscreen_game(&fake);
        guard.tick(&fake, &engine, &mut settings, &registry);
        assert_eq!(settings.background_opacity, 0);
        assert!(fake.applied().contains(&Applied::Opacity(BROWSER, 0)));

        // Steady state: no further applications while fullscreen persists
        fake.clear_applied();
        guard.tick(&fake, &engine, &mut settings, &registry);
        assert!(fake.applied().is_empty());

        // Game exits: cached opacity comes back
        fake.remove_window(GAME);
        *fake.foreground.borrow_mut() = Some(IDE);
        guard.tick(&fake, &engine, &mut settings, &registry);
        assert_eq!(settings.background_opacity, 160);
        assert!(fake.applied().contains(&Applied::Opacity(BROWSER, 160)));
    }

    #[test]
    fn test_tick_leaves_opacity_alone_without_cached_value() {
        let (fake, mut settings, registry) = setup();
        let engine = Engine::new();
        let mut guard = PerformanceGuard { fullscreen_active: true, saved_background: None };
        settings.background_opacity = 120;

        guard.tick(&fake, &engine, &mut settings, &registry);
        assert!(!guard.fullscreen_active);
        assert_eq!(settings.background_opacity, 120);
    }

    #[test]
    fn test_unsuppress_restores_cached_background() {
        let (fake, mut settings, registry) = setup();
        let engine = Engine::new();
        let mut guard = PerformanceGuard::new();
        add_fullscreen_game(&fake);
        guard.tick(&fake, &engine, &mut settings, &registry);
        assert_eq!(settings.background_opacity, 0);

        guard.unsuppress(&mut settings);
        assert_eq!(settings.background_opacity, 160);
        assert!(!guard.fullscreen_active);
    }

    #[test]
    fn test_tick_noop_when_performance_mode_disabled() {
        let (fake, mut settings, registry) = setup();
        settings.performance_mode = false;
        let engine = Engine::new();
        let mut guard = PerformanceGuard::new();

        add_fullscreen_game(&fake);
        guard.tick(&fake, &engine, &mut settings, &registry);
        assert_eq!(settings.background_opacity, 160);
        assert!(fake.applied().is_empty());
    }
}
