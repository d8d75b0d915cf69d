//! Persistent store seam.
//!
//! Every mutation of threads, messages and notifications goes through a
//! [`Store`]. `PgStore` is the production backend; `MemoryStore` keeps the same
//! contract (including the one-thread-per-pair constraint) in process memory.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Message, NewMessage, NewNotification, Notification, NotificationFilter, ParticipantPair,
    Thread,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// SQLSTATE for unique_violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("uniqueness constraint violated")]
    Conflict,

    #[error("row not found")]
    NotFound,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION) =>
            {
                StoreError::Conflict
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_thread_by_pair(&self, pair: ParticipantPair) -> StoreResult<Option<Thread>>;

    /// Insert a new thread for `pair`. Returns [`StoreError::Conflict`] when a
    /// thread for the pair already exists.
    async fn insert_thread(&self, pair: ParticipantPair) -> StoreResult<Thread>;

    async fn get_thread(&self, thread_id: Uuid) -> StoreResult<Option<Thread>>;

    /// Threads the user participates in, most recently active first.
    async fn list_threads(&self, user_id: Uuid) -> StoreResult<Vec<Thread>>;

    /// Atomically assign the next sequence number, store the message and move
    /// the thread's last-message pointer.
    async fn append_message(&self, new: NewMessage) -> StoreResult<Message>;

    /// Full history in append order.
    async fn list_messages(&self, thread_id: Uuid) -> StoreResult<Vec<Message>>;

    /// Flag every unread message not sent by `viewer_id` as read. Returns how
    /// many messages changed.
    async fn mark_thread_read(&self, thread_id: Uuid, viewer_id: Uuid) -> StoreResult<u64>;

    async fn count_unread(&self, thread_id: Uuid, viewer_id: Uuid) -> StoreResult<i64>;

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification>;

    /// Newest first.
    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>>;

    /// `None` when no such notification belongs to `user_id`; otherwise whether
    /// the read flag changed.
    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>>;

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64>;

    async fn count_unread_notifications(&self, user_id: Uuid) -> StoreResult<i64>;
}

pub type DynStore = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_unavailable() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
