//! Browser process lifecycle
//!
//! Launches a Chrome/Chromium binary against an isolated, ephemeral profile
//! directory with a freshly-picked DevTools debugging port, and owns killing
//! the process and removing the profile again. The connection to the
//! debugging endpoint is a separate concern, see [`crate::browser::connection`].

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::AutomationConfig;
use crate::error::EngineError;
use crate::utils::constants::CHROME_USER_AGENT;

/// RAII guard for the ephemeral profile directory
///
/// Automatically removes the directory on drop unless consumed by
/// `into_path()`. This ensures cleanup happens on all launch error paths
/// without manual intervention; on success ownership transfers to
/// [`BrowserProcess`].
struct ProfileDirGuard {
    path: PathBuf,
    keep: bool,
}

impl ProfileDirGuard {
    fn new(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path).context("Failed to create ephemeral profile directory")?;
        Ok(Self { path, keep: false })
    }

    fn into_path(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for ProfileDirGuard {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to clean up profile dir {}: {}", self.path.display(), e);
            } else {
                info!(
                    "Cleaned up profile dir after launch failure: {}",
                    self.path.display()
                );
            }
        }
    }
}

/// One OS-level browser instance owned by a single run.
pub struct BrowserProcess {
    child: Child,
    /// OS process id of the browser.
    pub pid: u32,
    /// DevTools debugging port the browser was launched on.
    pub port: u16,
    /// Ephemeral user-data directory, never shared across runs.
    pub profile_dir: PathBuf,
}

impl BrowserProcess {
    /// Launch the browser against a fresh ephemeral profile.
    ///
    /// Picks an available debugging port, starts the binary, and fails fast
    /// if the binary cannot be found or spawned. The profile directory is
    /// removed again if the spawn fails.
    pub async fn launch(config: &AutomationConfig) -> Result<Self, EngineError> {
        launch_inner(config)
            .await
            .map_err(|e| EngineError::Launch(format!("{e:#}")))
    }

    /// Kill the browser process and wait for it to exit. Best-effort: the
    /// process may already be gone if the user closed the window themselves.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Browser process {} already gone: {}", self.pid, e);
            return;
        }
        if let Err(e) = self.child.wait().await {
            warn!("Failed to wait for browser process {} exit: {}", self.pid, e);
        } else {
            info!("Browser process {} terminated", self.pid);
        }
    }

    /// Non-blocking liveness check.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Recursively remove the ephemeral profile directory. Errors are
    /// swallowed: cleanup is best-effort, never a run failure.
    pub fn remove_profile_dir(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            warn!(
                "Failed to remove profile dir {}: {}. Manual cleanup may be required.",
                self.profile_dir.display(),
                e
            );
        } else {
            info!("Removed profile dir {}", self.profile_dir.display());
        }
    }
}

async fn launch_inner(config: &AutomationConfig) -> Result<BrowserProcess> {
    let chrome_path = find_browser_executable().await?;
    let port = pick_debug_port()?;

    let profile_path = std::env::temp_dir().join(format!(
        "chatpilot_profile_{}_{}",
        std::process::id(),
        uuid::Uuid::new_v4().simple()
    ));
    let guard = ProfileDirGuard::new(profile_path)?;

    let mut cmd = Command::new(&chrome_path);
    cmd.arg(format!("--remote-debugging-port={port}"))
        .arg(format!("--user-data-dir={}", guard.path.display()))
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-desktop-notifications")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--disable-background-networking")
        .arg("--disable-background-timer-throttling")
        .arg("--disable-backgrounding-occluded-windows")
        .arg("--disable-breakpad")
        .arg("--disable-component-extensions-with-background-pages")
        .arg("--disable-extensions")
        .arg("--disable-hang-monitor")
        .arg("--disable-ipc-flooding-protection")
        .arg("--disable-popup-blocking")
        .arg("--disable-prompt-on-repost")
        .arg("--metrics-recording-only")
        .arg("--password-store=basic")
        .arg("--use-mock-keychain")
        .arg("--mute-audio")
        .arg("--window-size=1280,900");

    if config.headless {
        cmd.arg("--headless=new").arg("--hide-scrollbars");
    }

    if should_disable_sandbox() {
        info!("Detected containerized environment, disabling sandbox");
        cmd.arg("--no-sandbox").arg("--disable-setuid-sandbox");
    }

    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    info!(
        "Launching {} on debug port {} with profile {}",
        chrome_path.display(),
        port,
        guard.path.display()
    );

    let child = cmd.spawn().context("Failed to spawn browser process")?;
    let pid = child
        .id()
        .context("Browser process exited before a pid was available")?;

    Ok(BrowserProcess {
        child,
        pid,
        port,
        profile_dir: guard.into_path(),
    })
}

/// Pick an available debugging port by binding to an ephemeral port and
/// immediately releasing it.
fn pick_debug_port() -> Result<u16> {
    let listener =
        TcpListener::bind("127.0.0.1:0").context("Failed to bind an ephemeral port")?;
    let port = listener
        .local_addr()
        .context("Failed to read bound port")?
        .port();
    drop(listener);
    Ok(port)
}

/// Find Chrome/Chromium executable on the system with platform-specific search paths.
pub async fn find_browser_executable() -> Result<PathBuf> {
    // Environment variable overrides all other methods
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("Using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    // Common Chrome/Chromium installation paths by platform
    let paths = if cfg!(target_os = "windows") {
        vec![
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"%PROGRAMFILES%\Google\Chrome\Application\chrome.exe",
            r"%LOCALAPPDATA%\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "~/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = if path_str.starts_with('~') {
            if let Some(home) = dirs::home_dir() {
                home.join(&path_str[2..])
            } else {
                continue;
            }
        } else if path_str.contains('%') && cfg!(target_os = "windows") {
            PathBuf::from(expand_windows_env_vars(path_str))
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            info!("Found browser at: {}", path.display());
            return Ok(path);
        }
    }

    // Fall back to `which` on Unix systems
    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            let output = std::process::Command::new("which").arg(cmd).output();
            if let Ok(output) = output
                && output.status.success()
            {
                let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path_str.is_empty() {
                    let path = PathBuf::from(path_str);
                    info!("Found browser using 'which': {}", path.display());
                    return Ok(path);
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "Chrome/Chromium executable not found; install Chrome or set CHROMIUM_PATH"
    ))
}

/// Expand Windows environment variables in the form %VAR% within a path string.
///
/// If a variable doesn't exist, the original %VAR% token is preserved.
fn expand_windows_env_vars(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '%' {
            let var_name: String = chars.by_ref().take_while(|&c| c != '%').collect();
            if !var_name.is_empty() {
                if let Ok(value) = std::env::var(&var_name) {
                    result.push_str(&value);
                } else {
                    result.push('%');
                    result.push_str(&var_name);
                    result.push('%');
                }
            } else {
                result.push('%');
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// Detect if running in containerized environment (Docker, etc.)
/// In containers, sandbox must be disabled as setuid doesn't work
fn should_disable_sandbox() -> bool {
    std::path::Path::new("/.dockerenv").exists()
        || std::env::var("container").is_ok()
        || std::env::var("KUBERNETES_SERVICE_HOST").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picked_ports_are_nonzero_and_vary() {
        let a = pick_debug_port().unwrap();
        let b = pick_debug_port().unwrap();
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }

    #[test]
    fn env_var_expansion_preserves_unknown_tokens() {
        let input = "%CHATPILOT_DOES_NOT_EXIST%\\chrome.exe";
        assert_eq!(expand_windows_env_vars(input), input);
    }

    #[test]
    fn profile_guard_removes_dir_unless_consumed() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("profile");

        let guard = ProfileDirGuard::new(dir.clone()).unwrap();
        assert!(dir.exists());
        drop(guard);
        assert!(!dir.exists());

        let guard = ProfileDirGuard::new(dir.clone()).unwrap();
        let kept = guard.into_path();
        assert!(kept.exists());
        std::fs::remove_dir_all(kept).unwrap();
    }
}
