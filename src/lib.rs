//! Browser-driven chat automation engine
//!
//! Drives a real Chrome/Chromium process over the DevTools protocol to
//! submit a prompt into a chat web application, wait for the generated
//! answer, and capture it as text and markdown. The caller supplies a prompt,
//! optional attachments and per-run overrides; everything else (process and
//! profile lifecycle, protocol plumbing, cookie sync, page choreography,
//! cleanup) happens behind [`run`].

mod browser;
mod cookies;
mod error;
mod monitor;
mod page;
mod runner;
mod utils;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::utils::constants::{
    DEFAULT_ATTACHMENT_TIMEOUT_MS, DEFAULT_HEARTBEAT_INTERVAL_MS, DEFAULT_INPUT_TIMEOUT_MS,
    DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_SETTLE_MS, DEFAULT_SUBMIT_TIMEOUT_MS, DEFAULT_TARGET_URL,
};

pub use crate::browser::{can_hide_window, find_browser_executable};
pub use crate::error::EngineError;
pub use crate::page::AssistantAnswer;
pub use crate::runner::{RunResult, run};

/// Resolved run parameters. Built once per run from the defaults, the
/// optional config file, and the caller's overrides; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Chat application URL to drive.
    #[serde(default = "default_target_url")]
    pub target_url: String,

    /// Total time allowed for the assistant's answer to appear.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Time allowed for the composer to become present and enabled.
    #[serde(default = "default_input_timeout_ms")]
    pub input_timeout_ms: u64,

    /// Time allowed for submission to be confirmed as a conversation turn.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// Time allowed for attachment uploads to settle.
    #[serde(default = "default_attachment_timeout_ms")]
    pub attachment_timeout_ms: u64,

    /// Cap on the post-detection settle window.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Cadence of the background status poller.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Run the browser headless. Headful helps past anti-bot challenges.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Hide the browser window after launch (best-effort, headful only).
    #[serde(default)]
    pub hide_window: bool,

    /// Leave the browser and its profile alive after the run.
    #[serde(default)]
    pub keep_browser: bool,

    /// Copy cookies from the real browser profile before navigating.
    #[serde(default = "default_sync_cookies")]
    pub sync_cookies: bool,

    /// Downgrade cookie-sync failures to warnings and run logged-out.
    #[serde(default)]
    pub allow_cookie_errors: bool,

    /// Named Chrome profile to read cookies from ("Default" when unset).
    #[serde(default)]
    pub cookie_profile: Option<String>,

    /// Explicit cookie database path, overriding profile discovery.
    #[serde(default)]
    pub cookie_store_path: Option<PathBuf>,

    /// Desired model label, fuzzy-matched against the switcher menu.
    #[serde(default)]
    pub model: Option<String>,

    /// Verbose tracing for selector and protocol diagnostics.
    #[serde(default)]
    pub debug: bool,
}

/// Per-run overrides applied on top of file/default configuration. All
/// fields optional; `None` keeps the underlying value.
#[derive(Debug, Clone, Default)]
pub struct AutomationOverrides {
    pub target_url: Option<String>,
    pub response_timeout_ms: Option<u64>,
    pub input_timeout_ms: Option<u64>,
    pub heartbeat_interval_ms: Option<u64>,
    pub headless: Option<bool>,
    pub hide_window: Option<bool>,
    pub keep_browser: Option<bool>,
    pub sync_cookies: Option<bool>,
    pub allow_cookie_errors: Option<bool>,
    pub cookie_profile: Option<String>,
    pub cookie_store_path: Option<PathBuf>,
    pub model: Option<String>,
    pub debug: Option<bool>,
}

fn default_target_url() -> String {
    DEFAULT_TARGET_URL.to_string()
}
fn default_response_timeout_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_MS
}
fn default_input_timeout_ms() -> u64 {
    DEFAULT_INPUT_TIMEOUT_MS
}
fn default_submit_timeout_ms() -> u64 {
    DEFAULT_SUBMIT_TIMEOUT_MS
}
fn default_attachment_timeout_ms() -> u64 {
    DEFAULT_ATTACHMENT_TIMEOUT_MS
}
fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}
fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}
fn default_headless() -> bool {
    true
}
fn default_sync_cookies() -> bool {
    true
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            target_url: default_target_url(),
            response_timeout_ms: default_response_timeout_ms(),
            input_timeout_ms: default_input_timeout_ms(),
            submit_timeout_ms: default_submit_timeout_ms(),
            attachment_timeout_ms: default_attachment_timeout_ms(),
            settle_ms: default_settle_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            headless: default_headless(),
            hide_window: false,
            keep_browser: false,
            sync_cookies: default_sync_cookies(),
            allow_cookie_errors: false,
            cookie_profile: None,
            cookie_store_path: None,
            model: None,
            debug: false,
        }
    }
}

impl AutomationConfig {
    /// Resolve a run configuration: defaults, then the optional config file,
    /// then the caller's overrides.
    pub fn resolve(overrides: AutomationOverrides) -> Self {
        let mut config = load_yaml_config().unwrap_or_default();
        config.apply(overrides);
        config
    }

    fn apply(&mut self, overrides: AutomationOverrides) {
        if let Some(v) = overrides.target_url {
            self.target_url = v;
        }
        if let Some(v) = overrides.response_timeout_ms {
            self.response_timeout_ms = v;
        }
        if let Some(v) = overrides.input_timeout_ms {
            self.input_timeout_ms = v;
        }
        if let Some(v) = overrides.heartbeat_interval_ms {
            self.heartbeat_interval_ms = v;
        }
        if let Some(v) = overrides.headless {
            self.headless = v;
        }
        if let Some(v) = overrides.hide_window {
            self.hide_window = v;
        }
        if let Some(v) = overrides.keep_browser {
            self.keep_browser = v;
        }
        if let Some(v) = overrides.sync_cookies {
            self.sync_cookies = v;
        }
        if let Some(v) = overrides.allow_cookie_errors {
            self.allow_cookie_errors = v;
        }
        if let Some(v) = overrides.cookie_profile {
            self.cookie_profile = Some(v);
        }
        if let Some(v) = overrides.cookie_store_path {
            self.cookie_store_path = Some(v);
        }
        if let Some(v) = overrides.model {
            self.model = Some(v);
        }
        if let Some(v) = overrides.debug {
            self.debug = v;
        }
    }
}

/// Load config.yaml from the user config directory, falling back to the
/// working directory, then to defaults.
pub fn load_yaml_config() -> anyhow::Result<AutomationConfig> {
    let candidates = [
        dirs::config_dir().map(|d| d.join("chatpilot/config.yaml")),
        Some(PathBuf::from("config.yaml")),
    ];
    for path in candidates.into_iter().flatten() {
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let contents = std::fs::read_to_string(&path)?;
            return Ok(serde_yaml::from_str(&contents)?);
        }
    }
    Ok(AutomationConfig::default())
}

/// A file to be uploaded into the chat composer.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Absolute path handed to the browser's file input.
    pub path: PathBuf,
    /// Display name used in progress logs.
    pub name: String,
}

impl Attachment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }
}

/// Install a tracing subscriber for binaries and ad hoc callers. Honors
/// `RUST_LOG` when set; otherwise the `debug` flag picks the level.
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;
    let fallback = if debug { "chatpilot=debug" } else { "chatpilot=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = AutomationConfig::default();
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
        assert!(config.headless);
        assert!(config.sync_cookies);
        assert!(!config.keep_browser);
        assert!(config.model.is_none());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let mut config = AutomationConfig::default();
        config.apply(AutomationOverrides {
            target_url: Some("https://claude.ai/".into()),
            headless: Some(false),
            model: Some("5.1 Instant".into()),
            response_timeout_ms: Some(30_000),
            ..Default::default()
        });
        assert_eq!(config.target_url, "https://claude.ai/");
        assert!(!config.headless);
        assert_eq!(config.model.as_deref(), Some("5.1 Instant"));
        assert_eq!(config.response_timeout_ms, 30_000);
        // untouched fields keep their defaults
        assert_eq!(config.input_timeout_ms, DEFAULT_INPUT_TIMEOUT_MS);
    }

    #[test]
    fn yaml_fields_are_all_optional() {
        let config: AutomationConfig = serde_yaml::from_str("headless: false\n").unwrap();
        assert!(!config.headless);
        assert_eq!(config.response_timeout_ms, DEFAULT_RESPONSE_TIMEOUT_MS);

        let config: AutomationConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.headless);
    }

    #[test]
    fn attachment_name_derives_from_path() {
        let a = Attachment::new("/tmp/report.pdf");
        assert_eq!(a.name, "report.pdf");
    }
}
