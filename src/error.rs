//! Engine error taxonomy
//!
//! Every fatal outcome of a run maps to exactly one variant here, carrying
//! enough context (which step, how long it waited) to be actionable. Transport
//! failures that are really "the browser window was closed" are reclassified
//! into [`EngineError::ConnectionClosed`] so callers can tell the user to keep
//! the window open instead of reporting a raw socket error.

use thiserror::Error;

/// Errors surfaced by the automation engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Browser binary missing or the process failed to start.
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Navigation issued but the document never became interactive.
    #[error("page did not reach an interactive document state within {waited_ms}ms")]
    DocumentNotReady { waited_ms: u64 },

    /// Anti-bot interstitial detected. Remediation differs between headless
    /// and headful mode, so the hint is computed from the run configuration.
    #[error("anti-bot challenge detected on the chat page; {}", block_hint(.headless))]
    Blocked { headless: bool },

    /// No candidate composer element became available and enabled.
    #[error("prompt input did not become ready within {waited_ms}ms")]
    PromptNotReady { waited_ms: u64 },

    /// The model-switcher control itself could not be located.
    #[error("model switcher button not found on the page")]
    ModelSwitcherMissing,

    /// The switcher opened but no menu option matched the requested label.
    #[error("no model option matching '{wanted}' appeared in the switcher menu")]
    ModelOptionNotFound { wanted: String },

    /// Uploads were set on the file input but the composer never settled.
    #[error("attachment upload did not complete within {waited_ms}ms")]
    AttachmentTimeout { waited_ms: u64 },

    /// The prompt was inserted and sent but never showed up as a new turn.
    #[error("prompt submission was not confirmed within {waited_ms}ms")]
    SubmitNotConfirmed { waited_ms: u64 },

    /// No assistant answer appeared before the total response timeout.
    #[error("no response detected within {waited_ms}ms")]
    ResponseTimeout { waited_ms: u64 },

    /// Reading or applying cookies from the native browser profile failed.
    #[error("cookie sync failed: {0}")]
    CookieSync(String),

    /// The debugging connection went away mid-run, usually because the user
    /// closed the browser window.
    #[error("browser closed before the answer was captured; keep the automation window open until the run finishes")]
    ConnectionClosed,

    /// Any other DevTools protocol failure.
    #[error("devtools protocol error: {0}")]
    Protocol(String),
}

fn block_hint(headless: &bool) -> &'static str {
    if *headless {
        "re-run with headless disabled so the challenge can be solved in a visible window"
    } else {
        "solve the challenge in the browser window, then re-run"
    }
}

/// Message signatures that indicate the transport died rather than the
/// operation failing. chromiumoxide surfaces these in several shapes
/// depending on where the close was observed.
const CONNECTION_LOSS_MARKERS: &[&str] = &[
    "connection closed",
    "connection reset",
    "websocket",
    "ws error",
    "channel closed",
    "broken pipe",
    "browser has been closed",
    "receiving on a closed channel",
    "sending on a closed channel",
];

/// Whether an error message text looks like a lost debugging connection.
pub fn looks_like_connection_loss(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONNECTION_LOSS_MARKERS.iter().any(|m| lower.contains(m))
}

/// Reclassify a raw protocol error.
///
/// `disconnected` is the connection's disconnect flag at the time the error
/// surfaced; when it is set the transport is known-dead and the message text
/// is irrelevant.
pub fn classify_protocol_error(message: String, disconnected: bool) -> EngineError {
    if disconnected || looks_like_connection_loss(&message) {
        EngineError::ConnectionClosed
    } else {
        EngineError::Protocol(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_close_messages_are_reclassified() {
        let err = classify_protocol_error("WS error: Connection closed normally".into(), false);
        assert!(matches!(err, EngineError::ConnectionClosed));

        let err = classify_protocol_error("sending on a closed channel".into(), false);
        assert!(matches!(err, EngineError::ConnectionClosed));
    }

    #[test]
    fn disconnect_flag_wins_over_message_text() {
        let err = classify_protocol_error("evaluate failed: some generic error".into(), true);
        assert!(matches!(err, EngineError::ConnectionClosed));
    }

    #[test]
    fn ordinary_protocol_errors_pass_through() {
        let err = classify_protocol_error("Invalid selector".into(), false);
        assert!(matches!(err, EngineError::Protocol(m) if m == "Invalid selector"));
    }

    #[test]
    fn blocked_message_varies_by_mode() {
        let headless = EngineError::Blocked { headless: true }.to_string();
        let headful = EngineError::Blocked { headless: false }.to_string();
        assert!(headless.contains("headless disabled"));
        assert!(headful.contains("solve the challenge"));
        assert_ne!(headless, headful);
    }
}
