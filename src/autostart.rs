//! XDG autostart entry, synced with the `auto_start` setting.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

const DESKTOP_FILE: &str = "glasspair.desktop";

fn desktop_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("autostart");
    path.push(DESKTOP_FILE);
    path
}

fn enable() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to resolve current executable")?;
    let contents = format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=glasspair\n\
         Exec={}\n\
         X-GNOME-Autostart-enabled=true\n",
        exe.display()
    );
    let path = desktop_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create autostart directory: {}", parent.display()))?;
    }
    fs::write(&path, contents)
        .context(format!("Failed to write autostart entry to {}", path.display()))?;
    info!(path = %path.display(), "autostart entry written");
    Ok(())
}

fn disable() -> Result<()> {
    let path = desktop_path();
    if path.exists() {
        fs::remove_file(&path)
            .context(format!("Failed to remove autostart entry {}", path.display()))?;
        info!(path = %path.display(), "autostart entry removed");
    }
    Ok(())
}

/// Bring the autostart entry in line with the setting. Best-effort.
pub fn sync(auto_start: bool) {
    let result = if auto_start { enable() } else { disable() };
    if let Err(e) = result {
        warn!(error = ?e, "failed to sync autostart entry");
    }
}
