//! Host-process termination hooks
//!
//! If the host process is interrupted while a run is in flight, the child
//! browser and its ephemeral profile must still be cleaned up, unless the
//! caller explicitly asked to keep the browser alive. The hook is a spawned
//! Ctrl-C listener; the returned disposer aborts it during normal teardown so
//! a later interrupt can't double-clean.

use std::path::PathBuf;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Disposer for the registered hooks. Dropping without `dispose()` leaves the
/// listener running, which is only correct if the process is about to exit.
pub struct TerminationHooks {
    handle: JoinHandle<()>,
}

impl TerminationHooks {
    /// Register an interrupt hook for the given browser process.
    pub fn register(pid: u32, profile_dir: PathBuf, keep_browser: bool) -> Self {
        let handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                debug!("Interrupt listener unavailable; relying on normal teardown");
                return;
            }
            warn!("Interrupted; cleaning up browser process {}", pid);
            if !keep_browser {
                kill_by_pid(pid);
                if let Err(e) = std::fs::remove_dir_all(&profile_dir) {
                    debug!(
                        "Profile dir {} not removed on interrupt: {}",
                        profile_dir.display(),
                        e
                    );
                }
            }
            std::process::exit(130);
        });
        info!("Registered termination hooks for browser pid {}", pid);
        Self { handle }
    }

    /// Remove the hooks. Called on the normal teardown path before the run
    /// coordinator performs its own cleanup.
    pub fn dispose(self) {
        self.handle.abort();
        debug!("Termination hooks removed");
    }
}

#[cfg(unix)]
fn kill_by_pid(pid: u32) {
    let _ = std::process::Command::new("kill")
        .arg("-9")
        .arg(pid.to_string())
        .status();
}

#[cfg(windows)]
fn kill_by_pid(pid: u32) {
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .status();
}
