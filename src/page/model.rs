//! Model variant selection
//!
//! Opens the model-switcher menu and picks the option matching the requested
//! label. Labels in the menu, test ids, and what users type all disagree on
//! case, spacing and punctuation, so matching happens on a normalized token:
//! lowercase, alphanumerics only.

use std::time::Duration;

use chromiumoxide::page::Page;
use tracing::{debug, info};

use crate::browser::DebugConnection;
use crate::error::EngineError;
use crate::page::{queries, selectors};
use crate::utils::PollPacing;

/// Outcome of the model-selection step, logged for the progress stream.
#[derive(Debug, PartialEq, Eq)]
pub enum ModelOutcome {
    /// The switcher already showed the requested model.
    AlreadySelected,
    /// A matching menu option was clicked.
    Switched(String),
}

/// Collapse a label or test id to lowercase alphanumerics.
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Whether a menu option matches the requested label, on either its visible
/// text or its test id.
pub fn option_matches(wanted: &str, option: &queries::MenuOption) -> bool {
    let needle = normalize_label(wanted);
    if needle.is_empty() {
        return false;
    }
    if normalize_label(&option.label).contains(&needle) {
        return true;
    }
    option
        .test_id
        .as_deref()
        .is_some_and(|id| normalize_label(id).contains(&needle))
}

/// Ensure the requested model is active.
///
/// Three outcomes: already selected (no-op), switched, or
/// [`EngineError::ModelOptionNotFound`] after a bounded poll window. A
/// missing switcher control is the separate
/// [`EngineError::ModelSwitcherMissing`].
pub async fn select_model(
    conn: &DebugConnection,
    page: &Page,
    wanted: &str,
) -> Result<ModelOutcome, EngineError> {
    // Short-circuit when the switcher already shows the requested model.
    let current: queries::SwitcherLabel = conn
        .eval_json(page, &queries::switcher_label(selectors::MODEL_SWITCHER))
        .await?;
    if let Some(label) = &current.label
        && normalize_label(label).contains(&normalize_label(wanted))
    {
        info!("Model '{}' already selected", label.trim());
        return Ok(ModelOutcome::AlreadySelected);
    }

    let opened: queries::ClickOutcome = conn
        .eval_json(page, &queries::pointer_click(selectors::MODEL_SWITCHER))
        .await?;
    if !opened.clicked {
        return Err(EngineError::ModelSwitcherMissing);
    }
    debug!(
        "Opened model switcher via {}",
        opened.selector.as_deref().unwrap_or("?")
    );

    // The menu renders asynchronously after the pointer sequence; poll for a
    // matching option inside a bounded window.
    let mut pacing = PollPacing::new(Duration::from_secs(10));
    loop {
        let menu: queries::MenuOptions = conn
            .eval_json(page, &queries::menu_options(selectors::MODEL_OPTION))
            .await?;
        if let Some((index, option)) = menu
            .options
            .iter()
            .enumerate()
            .find(|(_, o)| option_matches(wanted, o))
        {
            let clicked: queries::Clicked = conn
                .eval_json(
                    page,
                    &queries::click_menu_option(selectors::MODEL_OPTION, index),
                )
                .await?;
            if clicked.clicked {
                info!("Switched model to '{}'", option.label);
                return Ok(ModelOutcome::Switched(option.label.clone()));
            }
        }

        if pacing.expired() {
            return Err(EngineError::ModelOptionNotFound {
                wanted: wanted.to_string(),
            });
        }
        pacing.pause().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(label: &str, test_id: Option<&str>) -> queries::MenuOption {
        queries::MenuOption {
            label: label.to_string(),
            test_id: test_id.map(|s| s.to_string()),
        }
    }

    #[test]
    fn matching_ignores_case_space_and_punctuation() {
        let wanted = "5.1 Instant";
        assert!(option_matches(wanted, &option("ChatGPT 5.1 Instant", None)));
        assert!(option_matches(wanted, &option("5.1Instant", None)));
        assert!(option_matches(
            wanted,
            &option("Something else", Some("chatgpt-5.1-instant"))
        ));
    }

    #[test]
    fn non_matches_are_rejected() {
        assert!(!option_matches("5.1 Instant", &option("5.1 Thinking", None)));
        assert!(!option_matches(
            "5.1 Instant",
            &option("Auto", Some("model-switcher-auto"))
        ));
        assert!(!option_matches("", &option("ChatGPT 5.1 Instant", None)));
    }

    #[test]
    fn normalization_strips_everything_but_alphanumerics() {
        assert_eq!(normalize_label("ChatGPT 5.1-Instant "), "chatgpt51instant");
        assert_eq!(normalize_label("---"), "");
    }
}
