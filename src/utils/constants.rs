//! Shared configuration constants
//!
//! Default values used throughout the engine to keep timeouts and launch
//! parameters in one place instead of scattered magic numbers.

use std::time::Duration;

/// Chrome user agent string for stealth mode
///
/// Updated: 2026-07-14 to Chrome 138 (current stable)
/// Next update: 2026-10-14 (quarterly schedule)
///
/// Chrome releases new stable versions ~every 4 weeks.
/// Update quarterly to stay within reasonable version window.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.7204.100 Safari/537.36";

/// Default chat application URL.
pub const DEFAULT_TARGET_URL: &str = "https://chatgpt.com/";

/// Total time allowed for the assistant's answer to appear.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 180_000;

/// Time allowed for the composer to become present and enabled.
pub const DEFAULT_INPUT_TIMEOUT_MS: u64 = 20_000;

/// Time allowed for the submitted prompt to show up as a conversation turn.
pub const DEFAULT_SUBMIT_TIMEOUT_MS: u64 = 20_000;

/// Time allowed for attachment uploads to settle after the file input is set.
pub const DEFAULT_ATTACHMENT_TIMEOUT_MS: u64 = 60_000;

/// Cap on the post-detection settle window (longest-text-wins re-extraction).
pub const DEFAULT_SETTLE_MS: u64 = 8_000;

/// Cadence of the background status poller.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 15_000;

/// How long to keep retrying the DevTools `/json/version` handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Bounded retry budget for the send-button click.
pub const SEND_CLICK_ATTEMPTS: usize = 3;

/// Bounded retry budget for the copy-affordance transcript capture.
pub const TRANSCRIPT_ATTEMPTS: usize = 3;

/// Poll cadence for the response wait fallback loop.
pub const RESPONSE_POLL_INTERVAL: Duration = Duration::from_millis(750);

/// How often the stop-generating safety net runs during the response wait.
pub const STOP_SAFETY_INTERVAL: Duration = Duration::from_secs(5);
