use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::constants::opacity;
use crate::hotkeys::Action;
use crate::types::Rect;

/// A named pair of opacity values. `ide` goes to the currently active slot,
/// `browser` to the other one (not necessarily the actual IDE/browser).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetOpacity {
    #[serde(deserialize_with = "clamped_opacity")]
    pub ide: u8,
    #[serde(deserialize_with = "clamped_opacity")]
    pub browser: u8,
}

impl Default for PresetOpacity {
    fn default() -> Self {
        Self { ide: opacity::DEFAULT_ACTIVE, browser: opacity::DEFAULT_BACKGROUND }
    }
}

/// Persisted settings, one JSON file under the user config dir.
///
/// Missing fields are filled from defaults, unknown fields are ignored, so
/// configs written by older or newer versions load without errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Case-insensitive substrings matched against process names
    pub ide_process_names: Vec<String>,
    pub browser_process_names: Vec<String>,

    #[serde(deserialize_with = "clamped_opacity")]
    pub active_opacity: u8,
    #[serde(deserialize_with = "clamped_opacity")]
    pub background_opacity: u8,

    /// Click-through applies only to the non-active window
    pub clickthrough_enabled: bool,

    /// Last-known screen rectangles keyed by slot name ("ide"/"browser")
    pub window_positions: BTreeMap<String, Rect>,

    pub current_preset: String,
    /// BTreeMap so preset cycling order is stable across runs
    pub presets: BTreeMap<String, PresetOpacity>,

    /// Action name -> key combination descriptor, e.g. "<ctrl>+<alt>+<f7>"
    pub hotkeys: BTreeMap<String, String>,

    pub performance_mode: bool,
    pub auto_start: bool,
}

/// Accepts any integer and clamps it into the 0-255 alpha range, so an
/// out-of-range value in the file degrades instead of rejecting the config.
fn clamped_opacity<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    let clamped = raw.clamp(0, 255) as u8;
    if i64::from(clamped) != raw {
        warn!(value = raw, clamped = clamped, "opacity out of range, clamping");
    }
    Ok(clamped)
}

impl Default for Settings {
    fn default() -> Self {
        let presets = BTreeMap::from([
            (
                "dynamic".to_string(),
                PresetOpacity { ide: opacity::DEFAULT_ACTIVE, browser: opacity::DEFAULT_BACKGROUND },
            ),
            ("code-focused".to_string(), PresetOpacity { ide: 255, browser: 128 }),
            ("documentation".to_string(), PresetOpacity { ide: 192, browser: 192 }),
            ("presentation".to_string(), PresetOpacity { ide: 255, browser: 64 }),
        ]);

        let hotkeys = BTreeMap::from([
            ("toggle_transparency".to_string(), "<ctrl>+<alt>+<f7>".to_string()),
            ("swap_active".to_string(), "<alt>+<f1>".to_string()),
            ("reset_layout".to_string(), "<ctrl>+<alt>+<f8>".to_string()),
            ("next_preset".to_string(), "<ctrl>+<alt>+<f9>".to_string()),
            ("exit".to_string(), "<ctrl>+<alt>+<f12>".to_string()),
        ]);

        Self {
            ide_process_names: [
                "code", "codium", "cursor", "pycharm", "idea", "clion", "rustrover",
                "sublime_text", "zed", "jetbrains",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            browser_process_names: [
                "chrome", "chromium", "firefox", "brave", "vivaldi", "opera", "epiphany",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            active_opacity: opacity::DEFAULT_ACTIVE,
            background_opacity: opacity::DEFAULT_BACKGROUND,
            clickthrough_enabled: false,
            window_positions: BTreeMap::new(),
            current_preset: "dynamic".to_string(),
            presets,
            hotkeys,
            performance_mode: true,
            auto_start: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(crate::constants::config::APP_DIR);
        path.push(crate::constants::config::FILENAME);
        path
    }

    /// Load from the default location. A missing file creates one with
    /// defaults; a corrupt file is left untouched and defaults are used for
    /// this session.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Self {
        if let Ok(contents) = fs::read_to_string(config_path) {
            match serde_json::from_str::<Settings>(&contents) {
                Ok(mut settings) => {
                    settings.validate_and_clamp();
                    return settings;
                }
                Err(e) => {
                    error!(path = %config_path.display(), error = %e, "Failed to parse config file, using defaults");
                    error!(path = %config_path.display(), "The file has been preserved; it will be overwritten on the next save");
                    let mut settings = Self::default();
                    settings.validate_and_clamp();
                    return settings;
                }
            }
        }

        let mut settings = Self::default();
        settings.validate_and_clamp();
        if let Err(e) = settings.save_to(config_path) {
            error!(error = ?e, "Failed to write initial config");
        } else {
            info!(path = %config_path.display(), "Generated config file with defaults");
        }
        settings
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        fs::write(path, contents)
            .context(format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    /// Repair invariants after loading: presets never empty, current_preset
    /// always resolves, hotkey table only holds known action names.
    pub fn validate_and_clamp(&mut self) {
        if self.presets.is_empty() {
            warn!("presets table is empty, restoring default preset");
            self.presets.insert(
                "dynamic".to_string(),
                PresetOpacity { ide: opacity::DEFAULT_ACTIVE, browser: opacity::DEFAULT_BACKGROUND },
            );
        }

        if !self.presets.contains_key(&self.current_preset) {
            let fallback = self
                .presets
                .keys()
                .next()
                .cloned()
                .unwrap_or_else(|| "dynamic".to_string());
            warn!(current = %self.current_preset, fallback = %fallback, "current_preset does not resolve, falling back");
            self.current_preset = fallback;
        }

        self.hotkeys.retain(|name, _| {
            let known = Action::from_name(name).is_some();
            if !known {
                warn!(action = %name, "dropping hotkey binding for unknown action");
            }
            known
        });
    }

    /// Opacity pair of the current preset. `validate_and_clamp` guarantees
    /// the lookup succeeds after load; this guards direct runtime edits too.
    pub fn current_preset_opacity(&self) -> PresetOpacity {
        self.presets.get(&self.current_preset).copied().unwrap_or(PresetOpacity {
            ide: opacity::DEFAULT_ACTIVE,
            browser: opacity::DEFAULT_BACKGROUND,
        })
    }
}
