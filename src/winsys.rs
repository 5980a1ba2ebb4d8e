//! Collaborator interfaces between the coordinator core and the OS.
//!
//! The core never talks to X11 directly; it goes through these traits so the
//! state machine can be exercised against an in-memory fake in tests.

use anyhow::Result;

use crate::types::{Rect, WindowHandle};

/// Stacking order targets for [`WindowSystem::set_z_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    Top,
    Bottom,
}

/// Window enumeration, attribute get/set and positioning primitives.
///
/// All attribute applications are best-effort: callers log failures and
/// continue for independent windows.
pub trait WindowSystem {
    /// All top-level windows, in whatever order the OS yields them.
    fn enumerate_top_level(&self) -> Result<Vec<WindowHandle>>;

    fn is_visible(&self, window: WindowHandle) -> Result<bool>;

    fn title(&self, window: WindowHandle) -> Result<String>;

    /// True for ordinary application windows; false for docks, tool windows
    /// and other system surfaces that discovery must skip.
    fn is_normal_window(&self, window: WindowHandle) -> Result<bool>;

    /// Validity probe: does the handle still refer to a live window?
    fn is_window(&self, window: WindowHandle) -> bool;

    fn window_rect(&self, window: WindowHandle) -> Result<Rect>;

    /// Apply an alpha byte (0 = invisible, 255 = opaque).
    fn set_opacity(&self, window: WindowHandle, opacity: u8) -> Result<()>;

    /// Make mouse input pass through the window (or restore normal input).
    fn set_click_through(&self, window: WindowHandle, enabled: bool) -> Result<()>;

    fn move_resize(&self, window: WindowHandle, rect: Rect) -> Result<()>;

    /// Raise and focus the window.
    fn set_foreground(&self, window: WindowHandle) -> Result<()>;

    fn set_z_order(&self, window: WindowHandle, order: ZOrder) -> Result<()>;

    fn foreground_window(&self) -> Result<Option<WindowHandle>>;

    /// Primary screen size in pixels as (width, height).
    fn primary_screen_size(&self) -> (i32, i32);

    /// True if the window carries fullscreen styling (no title bar).
    fn is_fullscreen_style(&self, window: WindowHandle) -> Result<bool>;
}

/// Resolves the process behind a window handle.
pub trait ProcessInspector {
    /// Lower-cased executable name, or `None` when the process cannot be
    /// identified (already gone, or access denied).
    fn process_name_for(&self, window: WindowHandle) -> Result<Option<String>>;
}
