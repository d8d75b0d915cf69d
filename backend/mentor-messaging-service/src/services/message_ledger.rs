use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::message::is_blank;
use crate::models::{Message, NewMessage, MAX_CONTENT_CHARS};
use crate::services::ThreadRegistry;
use crate::store::DynStore;

/// Appends messages and serves thread history.
#[derive(Clone)]
pub struct MessageLedger {
    store: DynStore,
    threads: ThreadRegistry,
}

impl MessageLedger {
    pub fn new(store: DynStore, threads: ThreadRegistry) -> Self {
        Self { store, threads }
    }

    /// Append `content` from `sender_id` to a thread.
    ///
    /// Blank content is ignored and yields `Ok(None)`. On success the returned
    /// message carries the server-assigned id, sequence number and timestamp.
    pub async fn append(
        &self,
        thread_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> AppResult<Option<Message>> {
        if is_blank(content) {
            debug!(thread_id = %thread_id, sender_id = %sender_id, "ignoring blank message");
            return Ok(None);
        }
        validate_length(content)?;

        self.threads.get_for_participant(thread_id, sender_id).await?;

        let message = self
            .store
            .append_message(NewMessage {
                thread_id,
                sender_id,
                content: content.to_string(),
            })
            .await?;

        metrics::record_message_appended();
        info!(
            message_id = %message.id,
            thread_id = %thread_id,
            sender_id = %sender_id,
            sequence_number = message.sequence_number,
            "message appended"
        );
        Ok(Some(message))
    }

    /// Full history, oldest first. Does not touch read state.
    pub async fn fetch(&self, thread_id: Uuid, viewer_id: Uuid) -> AppResult<Vec<Message>> {
        self.threads.get_for_participant(thread_id, viewer_id).await?;
        Ok(self.store.list_messages(thread_id).await?)
    }
}

pub(crate) fn validate_length(content: &str) -> AppResult<()> {
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::BadRequest(format!(
            "message exceeds {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}
