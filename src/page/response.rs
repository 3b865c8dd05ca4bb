//! Response wait and settle window
//!
//! Waits for the newest assistant turn to carry text, fed by a page-side
//! mutation observer with a periodic fallback poll, then holds a bounded
//! settle window so a mid-stream render isn't captured as the final answer.
//!
//! Known edge case, accepted as-is: the settle heuristic keeps the longest
//! text seen, so a legitimately short final answer that briefly renders as a
//! longer transient partial can be over-captured.

use std::time::{Duration, Instant};

use chromiumoxide::page::Page;
use tracing::{debug, info};

use crate::browser::DebugConnection;
use crate::error::EngineError;
use crate::page::{queries, selectors};
use crate::utils::constants::{RESPONSE_POLL_INTERVAL, STOP_SAFETY_INTERVAL};

/// Captured result of one assistant turn.
#[derive(Debug, Clone)]
pub struct AssistantAnswer {
    pub text: String,
    pub html: Option<String>,
    pub turn_id: Option<String>,
}

/// Longest-text-wins bookkeeping for the settle window.
#[derive(Debug, Default)]
pub struct SettleTracker {
    best: String,
}

impl SettleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a re-extracted text; keeps it only if longer than the best so
    /// far. Returns whether the candidate was kept.
    pub fn offer(&mut self, candidate: &str) -> bool {
        if candidate.len() > self.best.len() {
            self.best = candidate.to_string();
            true
        } else {
            false
        }
    }

    pub fn best(&self) -> &str {
        &self.best
    }
}

/// Block until the assistant's answer has appeared and settled.
pub async fn wait_for_answer(
    conn: &DebugConnection,
    page: &Page,
    total_timeout: Duration,
    settle_cap: Duration,
) -> Result<AssistantAnswer, EngineError> {
    let mut probe = probe_once(conn, page).await?;

    if !(probe.found && !probe.text.is_empty()) {
        let observer: queries::ObserverInstall = conn
            .eval_json(page, &queries::install_mutation_observer())
            .await?;
        if observer.installed {
            debug!("Mutation observer installed; waiting for the assistant turn");
        }

        let started = Instant::now();
        let mut last_mutations = 0u64;
        let mut last_safety = Instant::now();
        let mut tick = 0u32;

        loop {
            if conn.is_disconnected() {
                return Err(EngineError::ConnectionClosed);
            }
            if started.elapsed() >= total_timeout {
                return Err(EngineError::ResponseTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            tokio::time::sleep(RESPONSE_POLL_INTERVAL).await;
            tick += 1;

            if last_safety.elapsed() >= STOP_SAFETY_INTERVAL {
                last_safety = Instant::now();
                let clicked: queries::Clicked = conn
                    .eval_json(page, &queries::stop_safety(selectors::STOP_BUTTON))
                    .await?;
                if clicked.clicked {
                    debug!("Safety net clicked a lingering stop-generating control");
                }
            }

            let mutations: queries::MutationCount =
                conn.eval_json(page, &queries::mutation_count()).await?;
            let changed = mutations.count != last_mutations;
            last_mutations = mutations.count;

            // Re-probe on observer activity, with an unconditional fallback
            // probe every few ticks in case the observer misses renders.
            if !changed && tick % 4 != 0 {
                continue;
            }
            probe = probe_once(conn, page).await?;
            if probe.found && !probe.text.is_empty() {
                break;
            }
        }
    }

    info!("Answer detected, entering settle window");
    let mut tracker = SettleTracker::new();
    tracker.offer(&probe.text);
    let mut latest = probe;

    let settle_started = Instant::now();
    while latest.generating && settle_started.elapsed() < settle_cap {
        tokio::time::sleep(Duration::from_millis(500)).await;
        if conn.is_disconnected() {
            break;
        }
        match probe_once(conn, page).await {
            Ok(p) => {
                if p.found {
                    tracker.offer(&p.text);
                    latest = p;
                }
            }
            Err(EngineError::ConnectionClosed) => break,
            Err(e) => return Err(e),
        }
    }

    // One final re-extract after the indicator cleared (or the cap hit) to
    // pick up the last render.
    if !conn.is_disconnected()
        && let Ok(p) = probe_once(conn, page).await
        && p.found
    {
        tracker.offer(&p.text);
        latest = p;
    }

    info!(
        "Answer settled after {}ms ({} chars)",
        settle_started.elapsed().as_millis(),
        tracker.best().chars().count()
    );
    Ok(AssistantAnswer {
        text: tracker.best().to_string(),
        html: latest.html,
        turn_id: latest.turn_id,
    })
}

async fn probe_once(
    conn: &DebugConnection,
    page: &Page,
) -> Result<queries::ResponseProbe, EngineError> {
    conn.eval_json(
        page,
        &queries::response_probe(selectors::ASSISTANT_TURN, selectors::WORKING_INDICATOR),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_keeps_longest_text() {
        let mut tracker = SettleTracker::new();
        assert!(tracker.offer("Hi"));
        assert!(tracker.offer("Hi there"));
        assert!(!tracker.offer("Hi"));
        assert_eq!(tracker.best(), "Hi there");
    }

    #[test]
    fn tracker_ignores_equal_length_rerenders() {
        let mut tracker = SettleTracker::new();
        tracker.offer("final");
        assert!(!tracker.offer("FINAL"));
        assert_eq!(tracker.best(), "final");
    }

    /// The settle scenario: text appears while the generating indicator is
    /// still visible, survives re-extraction across indicator ticks, and is
    /// returned once the indicator clears.
    #[test]
    fn settle_sequence_returns_stable_text() {
        let renders = [
            ("Hi there", true),
            ("Hi there", true),
            ("Hi there", false),
        ];
        let mut tracker = SettleTracker::new();
        let mut generating = true;
        for (text, indicator) in renders {
            if !generating {
                break;
            }
            tracker.offer(text);
            generating = indicator;
        }
        assert_eq!(tracker.best(), "Hi there");
    }
}
