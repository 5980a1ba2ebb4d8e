//! Transparency engine: derives per-window opacity, click-through and
//! stacking from the registry and the current preset, and applies it.
//!
//! Applied attributes are a pure function of (settings, active flag); the
//! engine itself only remembers the toggle cache, so re-applying is always
//! safe and idempotent.

use tracing::{error, info, warn};

use crate::config::Settings;
use crate::constants::opacity;
use crate::discovery::discover;
use crate::registry::WindowRegistry;
use crate::types::{Rect, SlotKind};
use crate::winsys::{ProcessInspector, WindowSystem, ZOrder};

#[derive(Debug, Default)]
pub struct Engine {
    /// True while the background window is forced to opacity 0
    suppressed: bool,
    /// Background opacity to restore when suppression ends
    cached_background: Option<u8>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply opacity and click-through to every valid slot.
    ///
    /// Returns true only if both slots were valid and every application
    /// succeeded; an invalid slot or a refused OS call degrades the result
    /// to partial failure without stopping the other slot.
    pub fn apply_all<W: WindowSystem>(
        &self,
        win: &W,
        settings: &Settings,
        registry: &WindowRegistry,
    ) -> bool {
        let mut ok = true;
        for kind in SlotKind::ALL {
            let slot = registry.slot(kind);
            let Some(handle) = slot.handle else {
                ok = false;
                continue;
            };
            if !win.is_window(handle) {
                warn!(slot = kind.as_str(), handle = handle, "skipping stale handle");
                ok = false;
                continue;
            }

            let (alpha, clickthrough) = if slot.is_active {
                (settings.active_opacity, false)
            } else {
                (settings.background_opacity, settings.clickthrough_enabled)
            };

            if let Err(e) = win.set_opacity(handle, alpha) {
                error!(slot = kind.as_str(), error = ?e, "failed to set opacity");
                ok = false;
            }
            if let Err(e) = win.set_click_through(handle, clickthrough) {
                error!(slot = kind.as_str(), error = ?e, "failed to set click-through");
                ok = false;
            }
        }
        ok
    }

    /// Flip between "background suppressed" (opacity 0, prior value cached)
    /// and "background restored".
    pub fn toggle_transparency<W>(
        &mut self,
        win: &W,
        settings: &mut Settings,
        registry: &mut WindowRegistry,
    ) -> bool
    where
        W: WindowSystem + ProcessInspector,
    {
        if !registry.both_valid() && !discover(win, settings, registry) {
            warn!("windows not found, toggle aborted");
            return false;
        }

        if !self.suppressed {
            self.cached_background = Some(settings.background_opacity);
            settings.background_opacity = 0;
            self.suppressed = true;
            info!("background suppressed");
        } else {
            settings.background_opacity =
                self.cached_background.take().unwrap_or(opacity::TOGGLE_FALLBACK);
            self.suppressed = false;
            info!(restored = settings.background_opacity, "background restored");
        }

        self.apply_all(win, settings, registry)
    }

    /// Invert the active/background assignment and bring the new active
    /// window to the foreground. Raising is best-effort; its failure never
    /// rolls back the flip.
    pub fn swap_active<W>(
        &self,
        win: &W,
        settings: &mut Settings,
        registry: &mut WindowRegistry,
    ) -> bool
    where
        W: WindowSystem + ProcessInspector,
    {
        if !registry.both_valid() && !discover(win, settings, registry) {
            warn!("windows not found, swap aborted");
            return false;
        }

        registry.swap_active();
        let ok = self.apply_all(win, settings, registry);

        let active = registry.active_kind();
        if let Some(background) = registry.slot(active.other()).handle
            && let Err(e) = win.set_z_order(background, ZOrder::Bottom)
        {
            error!(error = ?e, "failed to lower background window");
        }
        if let Some(handle) = registry.slot(active).handle {
            if let Err(e) = win.set_z_order(handle, ZOrder::Top) {
                error!(error = ?e, "failed to raise active window");
            }
            if let Err(e) = win.set_foreground(handle) {
                error!(error = ?e, "failed to focus active window");
            }
        }
        ok
    }

    /// Re-discover, then tile the IDE onto the left half of the primary
    /// screen and the browser onto the right half, edge to edge. An odd
    /// pixel column goes to the right half.
    pub fn reset_layout<W>(
        &self,
        win: &W,
        settings: &mut Settings,
        registry: &mut WindowRegistry,
    ) -> bool
    where
        W: WindowSystem + ProcessInspector,
    {
        if !discover(win, settings, registry) {
            warn!("windows not found, layout reset aborted");
            return false;
        }

        let (width, height) = win.primary_screen_size();
        let mid = width / 2;
        let halves = [
            (SlotKind::Ide, Rect::new(0, 0, mid, height)),
            (SlotKind::Browser, Rect::new(mid, 0, width, height)),
        ];

        let mut ok = true;
        for (kind, rect) in halves {
            let slot = registry.slot_mut(kind);
            let Some(handle) = slot.handle else {
                ok = false;
                continue;
            };
            if let Err(e) = win.move_resize(handle, rect) {
                error!(slot = kind.as_str(), error = ?e, "failed to position window");
                ok = false;
            } else {
                slot.last_rect = Some(rect);
            }
        }
        if ok {
            info!("window layout reset to side-by-side");
        }
        ok
    }

    /// Advance to the next preset in stable key order, wrapping after the
    /// last. The preset's `ide` value goes to whichever slot is currently
    /// active. Returns the new preset name.
    pub fn cycle_preset<W: WindowSystem>(
        &mut self,
        win: &W,
        settings: &mut Settings,
        registry: &WindowRegistry,
    ) -> String {
        let keys: Vec<String> = settings.presets.keys().cloned().collect();
        if keys.is_empty() {
            warn!("no presets configured, keeping current opacities");
            return settings.current_preset.clone();
        }
        let current = keys
            .iter()
            .position(|k| *k == settings.current_preset)
            .unwrap_or(0);
        let next = keys[(current + 1) % keys.len()].clone();

        settings.current_preset = next.clone();
        let preset = settings.current_preset_opacity();
        settings.active_opacity = preset.ide;
        settings.background_opacity = preset.browser;

        // The preset defines both opacities; any pending toggle cache would
        // restore a value from a different preset, so drop it.
        self.suppressed = false;
        self.cached_background = None;

        info!(preset = %next, active = preset.ide, background = preset.browser, "preset changed");
        self.apply_all(win, settings, registry);
        next
    }

    /// Put a cached background opacity back into the settings without
    /// touching any window. Called before the settings are persisted so a
    /// suppressed value (0) never reaches disk.
    pub fn unsuppress(&mut self, settings: &mut Settings) {
        if self.suppressed {
            settings.background_opacity =
                self.cached_background.take().unwrap_or(opacity::TOGGLE_FALLBACK);
            self.suppressed = false;
            info!(background = settings.background_opacity, "pending toggle cleared");
        }
    }

    /// Make both windows fully opaque and interactive again (exit path).
    pub fn restore_all<W: WindowSystem>(&self, win: &W, registry: &WindowRegistry) -> bool {
        let mut ok = true;
        for kind in SlotKind::ALL {
            let slot = registry.slot(kind);
            let Some(handle) = slot.handle else { continue };
            if !win.is_window(handle) {
                continue;
            }
            if let Err(e) = win.set_opacity(handle, opacity::OPAQUE) {
                error!(slot = kind.as_str(), error = ?e, "failed to restore opacity");
                ok = false;
            }
            if let Err(e) = win.set_click_through(handle, false) {
                error!(slot = kind.as_str(), error = ?e, "failed to clear click-through");
                ok = false;
            }
        }
        ok
    }
}
