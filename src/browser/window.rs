//! Platform-conditional window hiding
//!
//! Some runs want a real (headful) browser for anti-bot reasons but don't
//! want the window stealing focus. Hiding is modeled as a capability check
//! with a no-op fallback instead of platform branches at every call site.

use tracing::{debug, info};

/// Whether this host can hide another process's window.
pub fn can_hide_window() -> bool {
    cfg!(target_os = "macos")
}

/// Best-effort: hide the browser window belonging to `pid`.
///
/// Silently a no-op on platforms without an implementation. Failures are
/// logged at debug level and never propagate; a visible window is a cosmetic
/// problem, not a run failure.
pub async fn hide_window(pid: u32) {
    if !can_hide_window() {
        debug!("Window hiding not supported on this platform, skipping");
        return;
    }

    let script = format!(
        "tell application \"System Events\" to set visible of (first process whose unix id is {pid}) to false"
    );
    match tokio::process::Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .await
    {
        Ok(out) if out.status.success() => info!("Hid browser window (pid {})", pid),
        Ok(out) => debug!(
            "osascript could not hide window: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        ),
        Err(e) => debug!("osascript unavailable: {}", e),
    }
}
