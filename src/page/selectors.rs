//! Candidate selector tables for the target chat application
//!
//! The chat UI ships no stable automation contract, so every element is
//! located through an ordered list of candidates: the most specific,
//! current-markup selector first, older or looser fallbacks after it. These
//! tables are the expected maintenance surface when the DOM drifts.

/// Text-input surfaces where the prompt is typed, most specific first.
pub const COMPOSER: &[&str] = &[
    "#prompt-textarea",
    "div[contenteditable='true'].ProseMirror",
    "textarea[data-testid='prompt-textarea']",
    "form textarea",
];

/// Send controls for the composed prompt.
pub const SEND_BUTTON: &[&str] = &[
    "button[data-testid='send-button']",
    "button[aria-label='Send prompt']",
    "form button[type='submit']",
];

/// "Stop generating" controls shown while a response streams.
pub const STOP_BUTTON: &[&str] = &[
    "button[data-testid='stop-button']",
    "button[aria-label='Stop generating']",
    "button[aria-label='Stop streaming']",
];

/// Assistant message bodies, newest turn last in document order.
pub const ASSISTANT_TURN: &[&str] = &[
    "article [data-message-author-role='assistant']",
    "[data-message-author-role='assistant']",
];

/// User message bodies, used to confirm the prompt landed as a turn.
pub const USER_TURN: &[&str] = &[
    "article [data-message-author-role='user']",
    "[data-message-author-role='user']",
];

/// Control that opens the model-switcher menu.
pub const MODEL_SWITCHER: &[&str] = &[
    "button[data-testid='model-switcher-dropdown-button']",
    "button[aria-label*='Model selector']",
    "button[aria-haspopup='menu'][id^='radix']",
];

/// Entries inside the opened model menu.
pub const MODEL_OPTION: &[&str] = &[
    "div[role='menuitem']",
    "[data-testid^='model-switcher-']",
];

/// Transient "working" indicators sampled by the status poller and the
/// settle window.
pub const WORKING_INDICATOR: &[&str] = &[
    "button[data-testid='stop-button']",
    ".result-streaming",
    "[data-testid='thinking-indicator']",
    "button[aria-label='Stop generating']",
];

/// Indicators that an attachment upload is still in flight.
pub const UPLOAD_INDICATOR: &[&str] = &[
    "[data-testid='attachment-uploading']",
    "div[aria-label='Uploading']",
    "circle[stroke-dashoffset]",
];

/// The hidden file input behind the attach control.
pub const FILE_INPUT: &[&str] = &["input[type='file']"];

/// Per-turn copy affordances.
pub const COPY_BUTTON: &[&str] = &[
    "button[data-testid='copy-turn-action-button']",
    "button[aria-label='Copy']",
];

/// Lowercased substrings of title/markup that identify an anti-bot
/// interstitial rather than the chat application.
pub const BLOCK_MARKERS: &[&str] = &[
    "just a moment",
    "verify you are human",
    "challenge-platform",
    "cf-chl",
    "checking your browser",
];
