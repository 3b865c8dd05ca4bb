//! Run coordinator
//!
//! Wires the process manager, protocol connection, cookie synchronizer,
//! page orchestrator and status monitor together, and owns the cleanup
//! policy: teardown executes exactly once per run, on success, on any fatal
//! step error, and on connection loss alike.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::browser::{BrowserProcess, DebugConnection, TerminationHooks, hide_window};
use crate::cookies::CookieSynchronizer;
use crate::error::EngineError;
use crate::monitor::StatusMonitor;
use crate::page::{AssistantAnswer, PageDriver};
use crate::utils::estimate_tokens;
use crate::{Attachment, AutomationConfig, AutomationOverrides};

/// Final output of the engine, handed back to the session layer.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Plain text of the assistant's answer.
    pub answer_text: String,
    /// Canonical markdown (copy-affordance capture, or a fallback render).
    pub answer_markdown: String,
    /// Raw HTML of the answer turn, when extraction yielded one.
    pub answer_html: Option<String>,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
    /// Rough token count of the markdown.
    pub token_estimate: u32,
    /// Browser process id, for the caller's bookkeeping.
    pub pid: u32,
    /// DevTools port the run used.
    pub port: u16,
    /// Ephemeral profile directory (already removed unless `keep_browser`).
    pub profile_dir: PathBuf,
}

/// Execute one full prompt-to-answer run.
///
/// The sole public entry point: launches the browser, connects, optionally
/// syncs cookies, drives the page step sequence with the status monitor
/// alongside the response wait, captures the transcript, and tears
/// everything down before returning.
pub async fn run(
    prompt: &str,
    attachments: &[Attachment],
    overrides: AutomationOverrides,
) -> Result<RunResult, EngineError> {
    let config = AutomationConfig::resolve(overrides);
    if config.debug {
        debug!("Resolved run configuration: {:?}", config);
    }
    let started = Instant::now();

    let mut process = BrowserProcess::launch(&config).await?;
    let hooks = TerminationHooks::register(
        process.pid,
        process.profile_dir.clone(),
        config.keep_browser,
    );

    let conn = match DebugConnection::connect(process.port).await {
        Ok(conn) => conn,
        Err(e) => {
            finalize(None, hooks, &mut process, &config).await;
            return Err(e);
        }
    };

    if config.hide_window && !config.headless {
        hide_window(process.pid).await;
    }

    let outcome = drive(&config, &conn, prompt, attachments).await;

    finalize(Some(conn), hooks, &mut process, &config).await;

    let (answer, markdown) = outcome?;
    let result = RunResult {
        answer_text: answer.text,
        answer_html: answer.html,
        token_estimate: estimate_tokens(&markdown),
        answer_markdown: markdown,
        elapsed_ms: started.elapsed().as_millis() as u64,
        pid: process.pid,
        port: process.port,
        profile_dir: process.profile_dir.clone(),
    };
    info!(
        "Run finished in {}ms (~{} tokens)",
        result.elapsed_ms, result.token_estimate
    );
    Ok(result)
}

/// The step sequence proper, separated so the coordinator can tear down on
/// every exit path with one `finalize` call.
async fn drive(
    config: &AutomationConfig,
    conn: &DebugConnection,
    prompt: &str,
    attachments: &[Attachment],
) -> Result<(AssistantAnswer, String), EngineError> {
    let page = conn.new_page().await?;
    conn.enable_domains(&page, !attachments.is_empty()).await?;

    if config.sync_cookies {
        let mut synchronizer = CookieSynchronizer::new();
        let applied = synchronizer.sync(conn, &page, config).await?;
        info!("Cookie sync applied {} cookies", applied);
    } else {
        debug!("Cookie sync disabled for this run");
    }

    let driver = PageDriver::new(conn, &page, config);
    driver.navigate().await?;
    driver.check_block().await?;
    driver.wait_for_composer().await?;
    driver.select_model().await?;
    driver.upload_attachments(attachments).await?;
    driver.submit_prompt(prompt).await?;

    // The monitor runs only while the response wait blocks, and its output
    // is purely observational.
    let monitor = StatusMonitor::start(
        page.clone(),
        Duration::from_millis(config.heartbeat_interval_ms),
    );
    let waited = driver.wait_for_answer().await;
    monitor.stop().await;
    let answer = waited?;

    let markdown = driver.capture_markdown(&answer).await;
    Ok((answer, markdown))
}

/// Teardown, executed exactly once per run.
///
/// Order: close the protocol connection (skipped internally when already
/// lost) → remove termination hooks → kill the process (skipped when the
/// caller keeps the browser, or when the connection died and the process is
/// already gone by the user's own hand) → remove the profile directory
/// (best-effort).
async fn finalize(
    conn: Option<DebugConnection>,
    hooks: TerminationHooks,
    process: &mut BrowserProcess,
    config: &AutomationConfig,
) {
    let connection_lost = conn.as_ref().is_some_and(|c| c.is_disconnected());
    if let Some(conn) = conn {
        conn.close().await;
    }
    hooks.dispose();

    if config.keep_browser {
        info!(
            "Keeping browser alive as requested (pid {}, profile {})",
            process.pid,
            process.profile_dir.display()
        );
        return;
    }

    if connection_lost && !process.is_alive() {
        debug!("Browser already exited; skipping kill");
    } else {
        process.kill().await;
    }
    process.remove_profile_dir();
    info!(
        "Cleanup complete (pid {}, port {})",
        process.pid, process.port
    );
}
