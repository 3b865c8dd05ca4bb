//! Prompt submission
//!
//! Focuses the composer, inserts the prompt through synthetic input so the
//! editor's framework state updates, verifies the text actually landed (and
//! force-writes it if not), then fires the send control with an Enter-key
//! fallback and waits until the prompt is visible as a conversation turn.

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, InsertTextParams,
};
use chromiumoxide::page::Page;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::browser::DebugConnection;
use crate::error::EngineError;
use crate::page::{queries, selectors};
use crate::utils::constants::SEND_CLICK_ATTEMPTS;
use crate::utils::{PollPacing, truncate_for_log};

pub async fn submit_prompt(
    conn: &DebugConnection,
    page: &Page,
    prompt: &str,
    timeout: Duration,
) -> Result<(), EngineError> {
    info!("Submitting prompt: {}", truncate_for_log(prompt, 80));

    let focus: queries::FocusOutcome = conn
        .eval_json(page, &queries::focus_composer(selectors::COMPOSER))
        .await?;
    if focus.focused {
        debug!(
            "Focused composer via {}",
            focus.selector.as_deref().unwrap_or("?")
        );
    } else {
        warn!("Composer focus not confirmed; inserting into active element anyway");
    }

    // Brief human-ish pause between focus and typing; instant insertion
    // right after a pointer event trips some client-side heuristics.
    let jitter = rand::rng().random_range(120u64..400);
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    page.execute(InsertTextParams::new(prompt))
        .await
        .map_err(|e| conn.classify(e))?;

    // Verify the editor (or fallback field) holds the text; contenteditable
    // editors occasionally swallow synthetic insertion.
    let current: queries::ComposerText = conn
        .eval_json(page, &queries::composer_text(selectors::COMPOSER))
        .await?;
    if current.text.is_empty() {
        warn!("Inserted text did not land; writing composer content directly");
        let wrote: queries::ForceWrite = conn
            .eval_json(page, &queries::force_write(selectors::COMPOSER, prompt))
            .await?;
        if !wrote.ok {
            return Err(EngineError::Protocol(
                "could not write prompt into the composer".into(),
            ));
        }
    }

    let mut sent = false;
    for attempt in 0..SEND_CLICK_ATTEMPTS {
        let click: queries::ClickOutcome = conn
            .eval_json(page, &queries::pointer_click(selectors::SEND_BUTTON))
            .await?;
        if click.clicked {
            info!("Clicked send control (attempt {})", attempt + 1);
            sent = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    if !sent {
        info!("No clickable send control; falling back to Enter key");
        press_enter(conn, page).await?;
    }

    // Submission is only trusted once the prompt shows up as a user turn.
    let needle = confirmation_needle(prompt);
    let mut pacing = PollPacing::new(timeout);
    loop {
        let confirmed: queries::Confirmed = conn
            .eval_json(
                page,
                &queries::submit_confirmed(selectors::USER_TURN, &needle),
            )
            .await?;
        if confirmed.confirmed {
            info!("Prompt submission confirmed");
            return Ok(());
        }
        if pacing.expired() {
            return Err(EngineError::SubmitNotConfirmed {
                waited_ms: pacing.waited_ms(),
            });
        }
        pacing.pause().await;
    }
}

/// Prefix of the prompt used to recognize it in the conversation DOM. Long
/// prompts get truncated by the UI, so matching on a bounded prefix is more
/// reliable than full-text equality.
fn confirmation_needle(prompt: &str) -> String {
    prompt.trim().chars().take(120).collect()
}

async fn press_enter(conn: &DebugConnection, page: &Page) -> Result<(), EngineError> {
    let down = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyDown)
        .key("Enter")
        .code("Enter")
        .text("\r")
        .windows_virtual_key_code(13)
        .native_virtual_key_code(13)
        .build()
        .map_err(EngineError::Protocol)?;
    page.execute(down).await.map_err(|e| conn.classify(e))?;

    let up = DispatchKeyEventParams::builder()
        .r#type(DispatchKeyEventType::KeyUp)
        .key("Enter")
        .code("Enter")
        .windows_virtual_key_code(13)
        .native_virtual_key_code(13)
        .build()
        .map_err(EngineError::Protocol)?;
    page.execute(up).await.map_err(|e| conn.classify(e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needle_is_trimmed_and_bounded() {
        assert_eq!(confirmation_needle("  Hello  "), "Hello");
        let long: String = "x".repeat(500);
        assert_eq!(confirmation_needle(&long).chars().count(), 120);
    }
}
