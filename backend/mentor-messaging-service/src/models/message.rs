use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound on message length, in characters.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// A stored chat message. Immutable apart from the recipient's read flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    /// Position within the thread; strictly increasing, assigned on append.
    pub sequence_number: i64,
    /// Set once the non-sending participant has read the message.
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_unread_for(&self, viewer_id: Uuid) -> bool {
        self.sender_id != viewer_id && !self.is_read
    }
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
}

/// Blank (empty or whitespace-only) content is never stored.
pub fn is_blank(content: &str) -> bool {
    content.trim().is_empty()
}
