//! Run-on-login registration.
//!
//! - Windows: a value under `HKCU\...\CurrentVersion\Run`, written with `reg`
//! - macOS: a LaunchAgent plist in `~/Library/LaunchAgents`
//! - Linux: an XDG autostart `.desktop` entry
//!
//! Registration is idempotent; running it on every start just rewrites the
//! same entry with the current executable path.

use std::path::{Path, PathBuf};
#[cfg(target_os = "windows")]
use std::process::Command;
use tracing::info;

/// Name used for the registry value, LaunchAgent label and desktop entry.
pub const APP_NAME: &str = "MouseClickCounter";

/// Label of the macOS launch agent.
pub const LAUNCH_AGENT_LABEL: &str = "com.mouseclickcounter.agent";

/// Errors from registering run-on-login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoStartError {
    /// Could not determine the running executable
    Executable(String),
    /// Could not find the per-user directory the entry belongs in
    NoHomeDirectory,
    Io(String),
    /// The registration tool ran but reported failure
    Command(String),
    Unsupported,
}

impl std::fmt::Display for AutoStartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutoStartError::Executable(e) => write!(f, "Cannot locate executable: {e}"),
            AutoStartError::NoHomeDirectory => write!(f, "Cannot locate the home directory"),
            AutoStartError::Io(e) => write!(f, "IO error: {e}"),
            AutoStartError::Command(e) => write!(f, "Registration failed: {e}"),
            AutoStartError::Unsupported => {
                write!(f, "Start on login is not supported on this platform")
            }
        }
    }
}

impl std::error::Error for AutoStartError {}

/// Register the running executable to start tracking on login.
pub fn register() -> Result<PathBuf, AutoStartError> {
    let exe = std::env::current_exe().map_err(|e| AutoStartError::Executable(e.to_string()))?;
    register_executable(&exe)
}

#[cfg(target_os = "windows")]
fn register_executable(exe: &Path) -> Result<PathBuf, AutoStartError> {
    const RUN_KEY: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";

    let command = format!("\"{}\" start", exe.display());
    let output = Command::new("reg")
        .args(["add", RUN_KEY, "/v", APP_NAME, "/t", "REG_SZ", "/d"])
        .arg(&command)
        .arg("/f")
        .output()
        .map_err(|e| AutoStartError::Io(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(AutoStartError::Command(stderr));
    }
    info!("Registered {APP_NAME} under {RUN_KEY}");
    Ok(PathBuf::from(RUN_KEY))
}

#[cfg(target_os = "macos")]
fn register_executable(exe: &Path) -> Result<PathBuf, AutoStartError> {
    let dir = dirs::home_dir()
        .ok_or(AutoStartError::NoHomeDirectory)?
        .join("Library")
        .join("LaunchAgents");
    let path = write_entry(
        &dir,
        &format!("{LAUNCH_AGENT_LABEL}.plist"),
        &render_plist(LAUNCH_AGENT_LABEL, exe),
    )?;
    info!("Installed launch agent at {}", path.display());
    Ok(path)
}

#[cfg(target_os = "linux")]
fn register_executable(exe: &Path) -> Result<PathBuf, AutoStartError> {
    let dir = dirs::config_dir()
        .ok_or(AutoStartError::NoHomeDirectory)?
        .join("autostart");
    register_desktop_entry_at(&dir, exe)
}

#[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
fn register_executable(_exe: &Path) -> Result<PathBuf, AutoStartError> {
    Err(AutoStartError::Unsupported)
}

/// Write an XDG autostart entry for `exe` into `dir`.
pub fn register_desktop_entry_at(dir: &Path, exe: &Path) -> Result<PathBuf, AutoStartError> {
    let path = write_entry(
        dir,
        "mouse-click-counter.desktop",
        &render_desktop_entry(exe),
    )?;
    info!("Installed autostart entry at {}", path.display());
    Ok(path)
}

fn write_entry(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf, AutoStartError> {
    std::fs::create_dir_all(dir).map_err(|e| AutoStartError::Io(e.to_string()))?;
    let path = dir.join(file_name);
    std::fs::write(&path, content).map_err(|e| AutoStartError::Io(e.to_string()))?;
    Ok(path)
}

/// LaunchAgent plist that runs `<exe> start` at login.
pub fn render_plist(label: &str, exe: &Path) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>{label}</string>
  <key>ProgramArguments</key>
  <array>
    <string>{exe}</string>
    <string>start</string>
  </array>
  <key>RunAtLoad</key>
  <true/>
</dict>
</plist>
"#,
        label = xml_escape(label),
        exe = xml_escape(&exe.display().to_string())
    )
}

/// XDG desktop entry that runs `<exe> start` at login.
pub fn render_desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Mouse Click Counter\n\
         Comment=Counts primary mouse button clicks per device\n\
         Exec=\"{}\" start\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n",
        exe.display()
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
