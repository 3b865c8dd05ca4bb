//! Background status monitor
//!
//! While the orchestrator is blocked waiting for the answer, a low-frequency
//! poller samples the page's "working" indicators and emits a progress line
//! whenever the sampled message changes. Purely observational: it shares the
//! multiplexed connection but never influences control flow, and it is
//! stopped the moment the response wait resolves.

use std::time::Duration;

use chromiumoxide::page::Page;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::browser::connection::raw_eval_json;
use crate::page::{queries, selectors};

pub struct StatusMonitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl StatusMonitor {
    /// Spawn the poller on its own task.
    pub fn start(page: Page, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let poller_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so the monitor stays
            // quiet until a full interval has passed.
            ticker.tick().await;

            let mut last_message: Option<String> = None;
            loop {
                tokio::select! {
                    _ = poller_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let query = queries::status_probe(selectors::WORKING_INDICATOR);
                        match raw_eval_json::<queries::StatusProbe>(&page, &query).await {
                            Ok(probe) => {
                                if probe.message != last_message {
                                    if let Some(message) = &probe.message {
                                        info!("Assistant is working: {}", message);
                                    }
                                    last_message = probe.message;
                                }
                            }
                            // Sampling failures are expected around teardown
                            // and never worth surfacing.
                            Err(e) => debug!("Status probe failed: {e:#}"),
                        }
                    }
                }
            }
            debug!("Status monitor stopped");
        });
        Self { token, handle }
    }

    /// Stop the poller and wait for its task to finish.
    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.handle.await;
    }
}
