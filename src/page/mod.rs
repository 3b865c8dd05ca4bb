//! Page action orchestration
//!
//! The step sequence that turns a live chat page into an answered prompt:
//! navigate → block check → composer ready → model select → upload → submit
//! → response wait → transcript capture. Steps run strictly in order, each
//! under its own timeout; only the status poller runs alongside.

pub mod model;
pub mod queries;
pub mod response;
pub mod selectors;
pub mod submit;
pub mod transcript;
pub mod upload;

use std::time::Duration;

use chromiumoxide::page::Page;
use tracing::{debug, info};

use crate::AutomationConfig;
use crate::browser::DebugConnection;
use crate::error::EngineError;
use crate::utils::PollPacing;

pub use response::AssistantAnswer;

/// How long the document gets to reach an interactive ready state after
/// navigation is issued.
const NAVIGATION_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Drives the step sequence against one page of one run.
pub struct PageDriver<'a> {
    conn: &'a DebugConnection,
    page: &'a Page,
    config: &'a AutomationConfig,
}

impl<'a> PageDriver<'a> {
    pub fn new(conn: &'a DebugConnection, page: &'a Page, config: &'a AutomationConfig) -> Self {
        Self { conn, page, config }
    }

    /// Navigate to the chat application and wait for the document to become
    /// interactive.
    pub async fn navigate(&self) -> Result<(), EngineError> {
        info!("Navigating to {}", self.config.target_url);
        self.page
            .goto(self.config.target_url.as_str())
            .await
            .map_err(|e| self.conn.classify(e))?;

        let mut pacing = PollPacing::new(NAVIGATION_READY_TIMEOUT);
        loop {
            let ready: queries::ReadyState = self
                .conn
                .eval_json(self.page, &queries::ready_state())
                .await?;
            if ready.state == "interactive" || ready.state == "complete" {
                debug!("Document ready state: {}", ready.state);
                return Ok(());
            }
            if pacing.expired() {
                return Err(EngineError::DocumentNotReady {
                    waited_ms: pacing.waited_ms(),
                });
            }
            pacing.pause().await;
        }
    }

    /// Fail fast if an anti-bot interstitial is shown instead of the chat
    /// application. No submission step runs past this point when blocked.
    pub async fn check_block(&self) -> Result<(), EngineError> {
        let probe: queries::BlockProbe = self
            .conn
            .eval_json(self.page, &queries::block_probe(selectors::BLOCK_MARKERS))
            .await?;
        if probe.blocked {
            info!("Anti-bot interstitial detected (title: '{}')", probe.title);
            return Err(EngineError::Blocked {
                headless: self.config.headless,
            });
        }
        Ok(())
    }

    /// Wait until one candidate composer is present and not disabled.
    pub async fn wait_for_composer(&self) -> Result<(), EngineError> {
        let timeout = Duration::from_millis(self.config.input_timeout_ms);
        let mut pacing = PollPacing::new(timeout);
        loop {
            let probe: queries::ComposerProbe = self
                .conn
                .eval_json(self.page, &queries::composer_probe(selectors::COMPOSER))
                .await?;
            if probe.found && !probe.disabled {
                info!(
                    "Composer ready ({})",
                    probe.selector.as_deref().unwrap_or("?")
                );
                return Ok(());
            }
            if pacing.expired() {
                return Err(EngineError::PromptNotReady {
                    waited_ms: pacing.waited_ms(),
                });
            }
            pacing.pause().await;
        }
    }

    /// Switch to the configured model variant, when one is requested.
    pub async fn select_model(&self) -> Result<(), EngineError> {
        let Some(wanted) = &self.config.model else {
            return Ok(());
        };
        match model::select_model(self.conn, self.page, wanted).await? {
            model::ModelOutcome::AlreadySelected => {}
            model::ModelOutcome::Switched(label) => {
                debug!("Model picker clicked '{}'", label);
            }
        }
        Ok(())
    }

    /// Upload attachments, if any, and wait for the composer to settle.
    pub async fn upload_attachments(
        &self,
        attachments: &[crate::Attachment],
    ) -> Result<(), EngineError> {
        if attachments.is_empty() {
            return Ok(());
        }
        upload::upload_attachments(
            self.conn,
            self.page,
            attachments,
            Duration::from_millis(self.config.attachment_timeout_ms),
        )
        .await
    }

    /// Insert and send the prompt, then wait for submission confirmation.
    pub async fn submit_prompt(&self, prompt: &str) -> Result<(), EngineError> {
        submit::submit_prompt(
            self.conn,
            self.page,
            prompt,
            Duration::from_millis(self.config.submit_timeout_ms),
        )
        .await
    }

    /// Wait for the assistant's answer to appear and settle.
    pub async fn wait_for_answer(&self) -> Result<AssistantAnswer, EngineError> {
        response::wait_for_answer(
            self.conn,
            self.page,
            Duration::from_millis(self.config.response_timeout_ms),
            Duration::from_millis(self.config.settle_ms),
        )
        .await
    }

    /// Capture the canonical markdown transcript for the answer.
    pub async fn capture_markdown(&self, answer: &AssistantAnswer) -> String {
        transcript::capture_markdown(self.conn, self.page, answer).await
    }
}
