//! Global hotkeys: descriptor parsing, action binding, evdev listeners.
//!
//! Key combination descriptors use the `<ctrl>+<alt>+<f7>` form (angle
//! brackets optional, case-insensitive). Parsing happens once at load; an
//! unparseable descriptor is logged and that binding skipped.
//!
//! Listener threads never touch application state. They send the bound
//! [`Action`] over an mpsc channel drained by the coordinator loop, and only
//! on key *press* events (repeats while held are ignored), so each satisfied
//! combination fires exactly once.

use anyhow::{Context, Result};
use evdev::{Device, EventType, InputEventKind, Key};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::constants::input;

/// The closed set of hotkey-triggerable operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ToggleTransparency,
    SwapActive,
    ResetLayout,
    NextPreset,
    Exit,
}

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "toggle_transparency" => Some(Action::ToggleTransparency),
            "swap_active" => Some(Action::SwapActive),
            "reset_layout" => Some(Action::ResetLayout),
            "next_preset" => Some(Action::NextPreset),
            "exit" => Some(Action::Exit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ToggleTransparency => "toggle_transparency",
            Action::SwapActive => "swap_active",
            Action::ResetLayout => "reset_layout",
            Action::NextPreset => "next_preset",
            Action::Exit => "exit",
        }
    }
}

/// Modifier keys held at the moment the terminal key was pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub superkey: bool,
}

impl ModifierState {
    fn from_held(held: impl Fn(Key) -> bool) -> Self {
        Self {
            ctrl: held(Key::KEY_LEFTCTRL) || held(Key::KEY_RIGHTCTRL),
            alt: held(Key::KEY_LEFTALT) || held(Key::KEY_RIGHTALT),
            shift: held(Key::KEY_LEFTSHIFT) || held(Key::KEY_RIGHTSHIFT),
            superkey: held(Key::KEY_LEFTMETA) || held(Key::KEY_RIGHTMETA),
        }
    }
}

/// A parsed key combination: required modifiers plus one terminal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: ModifierState,
    pub key: Key,
}

impl KeyCombo {
    /// Modifiers must match exactly so `<alt>+<f1>` does not also fire on
    /// ctrl+alt+f1.
    fn matches(&self, key: Key, modifiers: ModifierState) -> bool {
        self.key == key && self.modifiers == modifiers
    }
}

/// Parse a descriptor like `<ctrl>+<alt>+<f7>` into a [`KeyCombo`].
pub fn parse_combo(descriptor: &str) -> Result<KeyCombo> {
    let mut modifiers = ModifierState::default();
    let mut terminal = None;

    for part in descriptor.split('+') {
        let token = part
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_lowercase();
        if token.is_empty() {
            anyhow::bail!("empty token in key combination '{descriptor}'");
        }
        match token.as_str() {
            "ctrl" | "control" => modifiers.ctrl = true,
            "alt" => modifiers.alt = true,
            "shift" => modifiers.shift = true,
            "super" | "meta" | "cmd" | "win" => modifiers.superkey = true,
            _ => {
                if terminal.is_some() {
                    anyhow::bail!("more than one non-modifier key in '{descriptor}'");
                }
                terminal = Some(key_from_token(&token).context(format!(
                    "unknown key '{token}' in combination '{descriptor}'"
                ))?);
            }
        }
    }

    let key = terminal
        .ok_or_else(|| anyhow::anyhow!("no non-modifier key in combination '{descriptor}'"))?;
    Ok(KeyCombo { modifiers, key })
}

fn key_from_token(token: &str) -> Result<Key> {
    let key = match token {
        "f1" => Key::KEY_F1,
        "f2" => Key::KEY_F2,
        "f3" => Key::KEY_F3,
        "f4" => Key::KEY_F4,
        "f5" => Key::KEY_F5,
        "f6" => Key::KEY_F6,
        "f7" => Key::KEY_F7,
        "f8" => Key::KEY_F8,
        "f9" => Key::KEY_F9,
        "f10" => Key::KEY_F10,
        "f11" => Key::KEY_F11,
        "f12" => Key::KEY_F12,
        "a" => Key::KEY_A,
        "b" => Key::KEY_B,
        "c" => Key::KEY_C,
        "d" => Key::KEY_D,
        "e" => Key::KEY_E,
        "f" => Key::KEY_F,
        "g" => Key::KEY_G,
        "h" => Key::KEY_H,
        "i" => Key::KEY_I,
        "j" => Key::KEY_J,
        "k" => Key::KEY_K,
        "l" => Key::KEY_L,
        "m" => Key::KEY_M,
        "n" => Key::KEY_N,
        "o" => Key::KEY_O,
        "p" => Key::KEY_P,
        "q" => Key::KEY_Q,
        "r" => Key::KEY_R,
        "s" => Key::KEY_S,
        "t" => Key::KEY_T,
        "u" => Key::KEY_U,
        "v" => Key::KEY_V,
        "w" => Key::KEY_W,
        "x" => Key::KEY_X,
        "y" => Key::KEY_Y,
        "z" => Key::KEY_Z,
        "0" => Key::KEY_0,
        "1" => Key::KEY_1,
        "2" => Key::KEY_2,
        "3" => Key::KEY_3,
        "4" => Key::KEY_4,
        "5" => Key::KEY_5,
        "6" => Key::KEY_6,
        "7" => Key::KEY_7,
        "8" => Key::KEY_8,
        "9" => Key::KEY_9,
        "tab" => Key::KEY_TAB,
        "space" => Key::KEY_SPACE,
        "enter" | "return" => Key::KEY_ENTER,
        "esc" | "escape" => Key::KEY_ESC,
        "home" => Key::KEY_HOME,
        "end" => Key::KEY_END,
        "insert" => Key::KEY_INSERT,
        "delete" => Key::KEY_DELETE,
        _ => anyhow::bail!("unsupported key token '{token}'"),
    };
    Ok(key)
}

/// The parsed hotkey table, built once from settings.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(KeyCombo, Action)>,
}

impl Bindings {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut entries = Vec::new();
        for (name, descriptor) in &settings.hotkeys {
            // validate_and_clamp already dropped unknown action names
            let Some(action) = Action::from_name(name) else { continue };
            match parse_combo(descriptor) {
                Ok(combo) => entries.push((combo, action)),
                Err(e) => {
                    error!(action = %name, descriptor = %descriptor, error = %e, "ignoring unparseable hotkey binding");
                }
            }
        }
        info!(count = entries.len(), "hotkey bindings loaded");
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Action bound to this key press under the given modifier state.
    pub fn matching(&self, key: Key, modifiers: ModifierState) -> Option<Action> {
        self.entries
            .iter()
            .find(|(combo, _)| combo.matches(key, modifiers))
            .map(|(_, action)| *action)
    }
}

/// Find all input devices that look like keyboards (expose a Ctrl key).
fn find_all_keyboard_devices() -> Result<Vec<Device>> {
    const DEV_INPUT: &str = "/dev/input";
    info!(path = %DEV_INPUT, "Scanning for keyboard devices...");

    let mut devices = Vec::new();
    for entry in std::fs::read_dir(DEV_INPUT)
        .context(format!("Failed to read {DEV_INPUT} - are you in the 'input' group?"))?
    {
        let entry = entry?;
        let path = entry.path();
        if let Ok(device) = Device::open(&path)
            && let Some(keys) = device.supported_keys()
            && keys.contains(Key::KEY_LEFTCTRL)
        {
            info!(device_path = %path.display(), name = ?device.name(), "Found keyboard device");
            devices.push(device);
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No keyboard device found. Ensure you're in the 'input' group:\n\
             sudo usermod -aG input $USER\n\
             Then log out and back in."
        )
    }
    info!(count = devices.len(), "Listening on keyboard device(s)");
    Ok(devices)
}

/// Spawn one listener thread per keyboard device. Each sends matched actions
/// over `sender`; the coordinator loop serializes and executes them.
pub fn spawn_listener(bindings: Bindings, sender: Sender<Action>) -> Result<Vec<thread::JoinHandle<()>>> {
    let devices = find_all_keyboard_devices()?;
    let mut handles = Vec::new();

    for device in devices {
        let sender = sender.clone();
        let bindings = bindings.clone();
        let handle = thread::spawn(move || {
            info!(device = ?device.name(), "Hotkey listener started");
            if let Err(e) = listen_for_hotkeys(device, bindings, sender) {
                error!(error = %e, "Hotkey listener error");
            }
        });
        handles.push(handle);
    }
    Ok(handles)
}

/// Listen for bound combinations on a single device.
fn listen_for_hotkeys(mut device: Device, bindings: Bindings, sender: Sender<Action>) -> Result<()> {
    loop {
        let events = device.fetch_events().context("Failed to fetch events")?;

        // Collect presses first; the events iterator must be finished with
        // before the key state can be queried
        let mut presses = Vec::new();
        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }
            if let InputEventKind::Key(key) = event.kind() {
                debug!(key = ?key, value = event.value(), "Key event");
                if event.value() == input::KEY_PRESS {
                    presses.push(key);
                } else if event.value() == input::KEY_REPEAT {
                    // A held combination fires once; autorepeat is dropped
                    debug!(key = ?key, "Ignoring key repeat");
                }
            }
        }

        for key in presses {
            // Real-time modifier state at press time avoids races from
            // batched events
            let key_state = device.get_key_state().context("Failed to get keyboard state")?;
            let modifiers = ModifierState::from_held(|k| key_state.contains(k));

            if let Some(action) = bindings.matching(key, modifiers) {
                info!(action = action.as_str(), key = ?key, "Hotkey matched, sending action");
                sender.send(action).context("Failed to send hotkey action")?;
            }
        }
    }
}

/// Check if hotkeys are available (user has input device permissions).
pub fn check_permissions() -> bool {
    std::fs::read_dir("/dev/input").is_ok()
}

/// Print helpful error message if permissions are missing.
pub fn print_permission_error() {
    error!(path = "/dev/input", "Cannot access input devices");
    error!("Hotkeys require membership in the 'input' group: sudo usermod -aG input $USER");
    warn!(continuing = true, "Continuing without hotkey support...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_round_trip() {
        for action in [
            Action::ToggleTransparency,
            Action::SwapActive,
            Action::ResetLayout,
            Action::NextPreset,
            Action::Exit,
        ] {
            assert_eq!(Action::from_name(action.as_str()), Some(action));
        }
        assert_eq!(Action::from_name("unknown"), None);
    }

    #[test]
    fn test_parse_bracketed_combo() {
        let combo = parse_combo("<ctrl>+<alt>+<f7>").unwrap();
        assert!(combo.modifiers.ctrl);
        assert!(combo.modifiers.alt);
        assert!(!combo.modifiers.shift);
        assert_eq!(combo.key, Key::KEY_F7);
    }

    #[test]
    fn test_parse_unbracketed_and_mixed_case() {
        let combo = parse_combo("Ctrl+Shift+x").unwrap();
        assert!(combo.modifiers.ctrl);
        assert!(combo.modifiers.shift);
        assert_eq!(combo.key, Key::KEY_X);
    }

    #[test]
    fn test_parse_rejects_unknown_key() {
        assert!(parse_combo("<ctrl>+<flux>").is_err());
    }

    #[test]
    fn test_parse_rejects_modifier_only() {
        assert!(parse_combo("<ctrl>+<alt>").is_err());
    }

    #[test]
    fn test_parse_rejects_two_terminal_keys() {
        assert!(parse_combo("<f1>+<f2>").is_err());
    }

    #[test]
    fn test_combo_requires_exact_modifiers() {
        let combo = parse_combo("<alt>+<f1>").unwrap();
        let alt_only = ModifierState { alt: true, ..Default::default() };
        let ctrl_alt = ModifierState { ctrl: true, alt: true, ..Default::default() };

        assert!(combo.matches(Key::KEY_F1, alt_only));
        assert!(!combo.matches(Key::KEY_F1, ctrl_alt));
        assert!(!combo.matches(Key::KEY_F2, alt_only));
    }

    #[test]
    fn test_bindings_from_default_settings() {
        let settings = Settings::default();
        let bindings = Bindings::from_settings(&settings);
        assert_eq!(bindings.entries.len(), 5);

        let ctrl_alt = ModifierState { ctrl: true, alt: true, ..Default::default() };
        assert_eq!(bindings.matching(Key::KEY_F7, ctrl_alt), Some(Action::ToggleTransparency));
        assert_eq!(bindings.matching(Key::KEY_F12, ctrl_alt), Some(Action::Exit));
        let alt_only = ModifierState { alt: true, ..Default::default() };
        assert_eq!(bindings.matching(Key::KEY_F1, alt_only), Some(Action::SwapActive));
        assert_eq!(bindings.matching(Key::KEY_F1, ctrl_alt), None);
    }

    #[test]
    fn test_unparseable_descriptor_skipped() {
        let mut settings = Settings::default();
        settings
            .hotkeys
            .insert("swap_active".to_string(), "<ctrl>+<nosuchkey>".to_string());
        let bindings = Bindings::from_settings(&settings);
        assert_eq!(bindings.entries.len(), 4);
    }
}
