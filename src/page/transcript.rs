//! Transcript capture
//!
//! The UI's own copy affordance produces the cleanest markdown of the
//! assistant's answer, so capture hooks clipboard writes, clicks copy, and
//! reads the payload back. This path is allowed to fail: after its bounded
//! retry budget the plain extracted text (or an HTML-to-markdown conversion)
//! substitutes silently. Capture quality degrades; the run never does.

use std::time::Duration;

use chromiumoxide::page::Page;
use tracing::{debug, info};

use crate::browser::DebugConnection;
use crate::page::response::AssistantAnswer;
use crate::page::{queries, selectors};
use crate::utils::PollPacing;
use crate::utils::constants::TRANSCRIPT_ATTEMPTS;

/// Produce the canonical markdown for the answer. Never fails.
pub async fn capture_markdown(
    conn: &DebugConnection,
    page: &Page,
    answer: &AssistantAnswer,
) -> String {
    match try_copy_affordance(conn, page, answer).await {
        Some(markdown) => {
            info!("Captured transcript via the copy affordance");
            markdown
        }
        None => {
            debug!("Copy affordance capture missed; falling back to extracted text");
            fallback_markdown(answer)
        }
    }
}

/// Best-effort markdown when the copy path yields nothing.
pub fn fallback_markdown(answer: &AssistantAnswer) -> String {
    match &answer.html {
        Some(html) if !html.trim().is_empty() => {
            let converted = html2md::parse_html(html);
            if converted.trim().is_empty() {
                answer.text.clone()
            } else {
                converted
            }
        }
        _ => answer.text.clone(),
    }
}

async fn try_copy_affordance(
    conn: &DebugConnection,
    page: &Page,
    answer: &AssistantAnswer,
) -> Option<String> {
    let hooked: Result<queries::ObserverInstall, _> =
        conn.eval_json(page, &queries::clipboard_hook()).await;
    if !hooked.map(|h| h.installed).unwrap_or(false) {
        return None;
    }

    for attempt in 0..TRANSCRIPT_ATTEMPTS {
        let click = queries::copy_click(selectors::COPY_BUTTON, answer.turn_id.as_deref());
        match conn.eval_json::<queries::Clicked>(page, &click).await {
            Ok(clicked) if clicked.clicked => {
                // The copy handler writes asynchronously; give it a moment.
                let mut pacing = PollPacing::new(Duration::from_secs(1));
                loop {
                    match conn
                        .eval_json::<queries::ClipboardText>(page, &queries::clipboard_read())
                        .await
                    {
                        Ok(clip) => {
                            if let Some(text) = clip.text
                                && !text.trim().is_empty()
                            {
                                return Some(text);
                            }
                        }
                        Err(_) => return None,
                    }
                    if pacing.expired() {
                        break;
                    }
                    pacing.pause().await;
                }
            }
            Ok(_) => debug!("No copy control found (attempt {})", attempt + 1),
            Err(_) => return None,
        }
        tokio::time::sleep(Duration::from_millis(300 * (attempt as u64 + 1))).await;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(text: &str, html: Option<&str>) -> AssistantAnswer {
        AssistantAnswer {
            text: text.to_string(),
            html: html.map(|h| h.to_string()),
            turn_id: None,
        }
    }

    #[test]
    fn fallback_prefers_html_conversion() {
        let md = fallback_markdown(&answer(
            "Hello world",
            Some("<p>Hello <strong>world</strong></p>"),
        ));
        assert!(md.contains("**world**"));
    }

    #[test]
    fn fallback_uses_plain_text_without_html() {
        assert_eq!(fallback_markdown(&answer("Hello world", None)), "Hello world");
        assert_eq!(
            fallback_markdown(&answer("Hello world", Some("   "))),
            "Hello world"
        );
    }
}
