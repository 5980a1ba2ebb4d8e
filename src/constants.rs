//! Application-wide constants
//!
//! Single source of truth for magic numbers and string literals used
//! throughout the application.

/// Configuration file location
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "glasspair";

    /// Configuration file name
    pub const FILENAME: &str = "config.json";
}

/// Opacity defaults and bounds (alpha byte, 0 = invisible, 255 = opaque)
pub mod opacity {
    /// Fully opaque; applied to every window on shutdown
    pub const OPAQUE: u8 = 255;

    /// Default opacity of the active window
    pub const DEFAULT_ACTIVE: u8 = 255;

    /// Default opacity of the background window
    pub const DEFAULT_BACKGROUND: u8 = 160;

    /// Background opacity restored by toggle when no prior value was cached
    pub const TOGGLE_FALLBACK: u8 = 160;
}

/// Coordinator loop timing
pub mod timing {
    use std::time::Duration;

    /// How long the loop blocks on the hotkey channel per iteration
    pub const EVENT_POLL: Duration = Duration::from_millis(100);

    /// Interval between window-handle validity probes
    pub const VALIDITY_CHECK: Duration = Duration::from_secs(5);

    /// Interval between fullscreen-application probes
    pub const GUARD_TICK: Duration = Duration::from_secs(2);
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Key repeat event value; ignored so a held combination fires once
    pub const KEY_REPEAT: i32 = 2;
}

/// X11 protocol constants
pub mod x11 {
    /// Source indication for _NET_ACTIVE_WINDOW (2 = pager/direct user action)
    pub const ACTIVE_WINDOW_SOURCE_PAGER: u32 = 2;

    /// _NET_WM_WINDOW_OPACITY scale: alpha byte replicated across the cardinal
    pub const OPACITY_SCALE: u32 = 0x0101_0101;
}
