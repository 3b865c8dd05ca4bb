//! Attachment upload into the chat composer
//!
//! The attach control fronts a hidden `input[type=file]`; uploads are
//! performed by setting that input's file list over the DOM domain, one
//! attachment at a time in submitted order, then waiting for the composer to
//! settle (no upload indicator, send control enabled again).

use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::page::Page;
use tracing::{debug, info};

use crate::Attachment;
use crate::browser::DebugConnection;
use crate::error::EngineError;
use crate::page::{queries, selectors};
use crate::utils::PollPacing;

pub async fn upload_attachments(
    conn: &DebugConnection,
    page: &Page,
    attachments: &[Attachment],
    timeout: Duration,
) -> Result<(), EngineError> {
    for (idx, attachment) in attachments.iter().enumerate() {
        let input = find_file_input(conn, page).await?;
        let params = SetFileInputFilesParams::builder()
            .files(vec![attachment.path.to_string_lossy().into_owned()])
            .backend_node_id(input.backend_node_id)
            .build()
            .map_err(EngineError::Protocol)?;
        page.execute(params).await.map_err(|e| conn.classify(e))?;
        info!(
            "Uploaded attachment {}/{}: {}",
            idx + 1,
            attachments.len(),
            attachment.name
        );
    }

    // The UI processes uploads asynchronously after the file list is set;
    // wait for the composite settled condition.
    let mut pacing = PollPacing::new(timeout);
    loop {
        let state: queries::UploadState = conn
            .eval_json(
                page,
                &queries::upload_state(selectors::UPLOAD_INDICATOR, selectors::SEND_BUTTON),
            )
            .await?;
        if !state.uploading && state.send_enabled {
            debug!("Attachment uploads settled");
            return Ok(());
        }
        if pacing.expired() {
            return Err(EngineError::AttachmentTimeout {
                waited_ms: pacing.waited_ms(),
            });
        }
        pacing.pause().await;
    }
}

async fn find_file_input(
    conn: &DebugConnection,
    page: &Page,
) -> Result<chromiumoxide::element::Element, EngineError> {
    for selector in selectors::FILE_INPUT {
        match page.find_element(*selector).await {
            Ok(element) => return Ok(element),
            Err(e) => {
                if conn.is_disconnected() {
                    return Err(EngineError::ConnectionClosed);
                }
                debug!("No file input at '{}': {}", selector, e);
            }
        }
    }
    Err(EngineError::Protocol(
        "no file input element found for attachment upload".into(),
    ))
}
