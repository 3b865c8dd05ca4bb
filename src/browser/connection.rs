//! DevTools protocol connection
//!
//! Owns the one multiplexed websocket channel to the launched browser. The
//! endpoint is discovered through the HTTP `/json/version` handshake, then
//! all traffic flows through chromiumoxide's correlated request/response
//! machinery, so the step sequence and the status poller can have calls in
//! flight concurrently without interfering.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::{dom, network, page as page_domain};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::error::{EngineError, classify_protocol_error};
use crate::utils::constants::CONNECT_TIMEOUT;

/// One live connection to the browser's debugging endpoint.
pub struct DebugConnection {
    browser: Browser,
    handler_task: JoinHandle<()>,
    disconnected: Arc<AtomicBool>,
}

impl DebugConnection {
    /// Discover the websocket endpoint on `port` and connect.
    ///
    /// The browser needs a moment after spawn before the debugging port
    /// accepts connections, so the handshake retries on a short interval
    /// until [`CONNECT_TIMEOUT`] elapses.
    pub async fn connect(port: u16) -> Result<Self, EngineError> {
        let ws_url = discover_ws_url(port)
            .await
            .map_err(|e| EngineError::Launch(format!("{e:#}")))?;
        info!("Discovered DevTools endpoint: {}", ws_url);

        let (browser, mut handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| EngineError::Launch(format!("DevTools connect failed: {e}")))?;

        let disconnected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&disconnected);
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(e) = h {
                    let message = e.to_string();
                    // Chrome emits events chromiumoxide doesn't model; those
                    // deserialize failures are noise, not faults.
                    let benign = message
                        .contains("data did not match any variant of untagged enum Message")
                        || message.contains("Failed to deserialize WS response");
                    if benign {
                        trace!("Suppressed benign CDP serialization error: {}", message);
                    } else {
                        error!("DevTools handler error: {}", message);
                    }
                }
            }
            flag.store(true, Ordering::SeqCst);
            debug!("DevTools event stream ended; connection marked lost");
        });

        Ok(Self {
            browser,
            handler_task,
            disconnected,
        })
    }

    /// Whether the channel has emitted its disconnect signal.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Open a fresh tab for the run.
    pub async fn new_page(&self) -> Result<Page, EngineError> {
        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| self.classify(e))
    }

    /// Enable the protocol domains the run needs. DOM is only required when
    /// attachments will be uploaded.
    pub async fn enable_domains(&self, page: &Page, with_dom: bool) -> Result<(), EngineError> {
        page.execute(network::EnableParams::default())
            .await
            .map_err(|e| self.classify(e))?;
        page.execute(page_domain::EnableParams::default())
            .await
            .map_err(|e| self.classify(e))?;
        if with_dom {
            page.execute(dom::EnableParams::default())
                .await
                .map_err(|e| self.classify(e))?;
        }
        debug!("Enabled protocol domains (dom: {})", with_dom);
        Ok(())
    }

    /// Evaluate a page-script expression and deserialize its JSON result,
    /// reclassifying transport deaths.
    ///
    /// Awaits a script-internal promise when the expression returns one, so
    /// observer-backed queries can resolve asynchronously page-side.
    pub async fn eval_json<T: DeserializeOwned>(
        &self,
        page: &Page,
        expression: &str,
    ) -> Result<T, EngineError> {
        raw_eval_json(page, expression)
            .await
            .map_err(|e| classify_protocol_error(format!("{e:#}"), self.is_disconnected()))
    }

    /// Map a raw protocol error, reclassifying transport deaths.
    pub fn classify(&self, err: CdpError) -> EngineError {
        classify_protocol_error(err.to_string(), self.is_disconnected())
    }

    /// Close the channel. Skipped when the connection is already lost: there
    /// is no point sending a close command down a dead socket.
    pub async fn close(mut self) {
        if !self.is_disconnected() {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close command failed: {}", e);
            }
        } else {
            debug!("Connection already lost, skipping close command");
        }
        self.handler_task.abort();
    }
}

/// Evaluate an expression on a page and deserialize the JSON payload, with
/// no connection-state classification. The status monitor uses this directly
/// because it runs on its own task and treats every failure as ignorable.
pub(crate) async fn raw_eval_json<T: DeserializeOwned>(
    page: &Page,
    expression: &str,
) -> anyhow::Result<T> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .return_by_value(true)
        .await_promise(true)
        .build()
        .map_err(|e| anyhow::anyhow!("bad evaluate params: {e}"))?;
    let result = page.evaluate_expression(params).await?;
    let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value)
        .map_err(|e| anyhow::anyhow!("unexpected page query payload: {e}"))
}

/// Poll the DevTools HTTP endpoint until it reports a websocket URL.
async fn discover_ws_url(port: u16) -> anyhow::Result<String> {
    let version_url = format!("http://127.0.0.1:{port}/json/version");
    let client = reqwest::Client::new();
    let started = std::time::Instant::now();
    let mut last_error = None;

    while started.elapsed() < CONNECT_TIMEOUT {
        match client.get(&version_url).send().await {
            Ok(resp) => match resp.json::<serde_json::Value>().await {
                Ok(json) => {
                    if let Some(ws) = json["webSocketDebuggerUrl"].as_str() {
                        return Ok(ws.to_string());
                    }
                    last_error = Some(anyhow::anyhow!("no webSocketDebuggerUrl in response"));
                }
                Err(e) => last_error = Some(anyhow::anyhow!("version payload parse failed: {e}")),
            },
            Err(e) => last_error = Some(anyhow::anyhow!("endpoint not reachable yet: {e}")),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    Err(last_error
        .unwrap_or_else(|| anyhow::anyhow!("DevTools endpoint never became reachable"))
        .context(format!(
            "gave up waiting for the debugging port after {}s",
            CONNECT_TIMEOUT.as_secs()
        )))
}
