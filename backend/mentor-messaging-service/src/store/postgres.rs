use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    LastMessage, Message, NewMessage, NewNotification, Notification, NotificationFilter,
    NotificationKind, NotificationType, ParticipantPair, Thread,
};

const THREAD_COLUMNS: &str = "id, participant_low, participant_high, last_message_id, \
     last_message_sender_id, last_message_content, last_message_at, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, thread_id, sender_id, content, sequence_number, is_read, read_at, created_at";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, notification_type, entity_id, title, message, is_read, read_at, created_at";

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn thread_from_row(row: &PgRow) -> Result<Thread, sqlx::Error> {
    let last_message_id: Option<Uuid> = row.try_get("last_message_id")?;
    let last_message = match last_message_id {
        Some(id) => Some(LastMessage {
            id,
            sender_id: row.try_get("last_message_sender_id")?,
            content: row.try_get("last_message_content")?,
            created_at: row.try_get("last_message_at")?,
        }),
        None => None,
    };

    Ok(Thread {
        id: row.try_get("id")?,
        participant_low: row.try_get("participant_low")?,
        participant_high: row.try_get("participant_high")?,
        last_message,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    notification_type: String,
    entity_id: Option<Uuid>,
    title: String,
    message: String,
    is_read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let notification_type: NotificationType =
            row.notification_type.parse().map_err(StoreError::Corrupt)?;
        let kind = NotificationKind::from_parts(notification_type, row.entity_id)
            .map_err(StoreError::Corrupt)?;

        Ok(Notification {
            id: row.id,
            user_id: row.user_id,
            kind,
            title: row.title,
            message: row.message,
            is_read: row.is_read,
            read_at: row.read_at,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_thread_by_pair(&self, pair: ParticipantPair) -> StoreResult<Option<Thread>> {
        let row = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE participant_low = $1 AND participant_high = $2"
        ))
        .bind(pair.low())
        .bind(pair.high())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(thread_from_row).transpose()?)
    }

    async fn insert_thread(&self, pair: ParticipantPair) -> StoreResult<Thread> {
        // Plain INSERT: a concurrent creator surfaces as 23505 -> StoreError::Conflict.
        let row = sqlx::query(&format!(
            "INSERT INTO threads (id, participant_low, participant_high) \
             VALUES ($1, $2, $3) RETURNING {THREAD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(pair.low())
        .bind(pair.high())
        .fetch_one(&self.pool)
        .await?;

        Ok(thread_from_row(&row)?)
    }

    async fn get_thread(&self, thread_id: Uuid) -> StoreResult<Option<Thread>> {
        let row = sqlx::query(&format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = $1"))
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(thread_from_row).transpose()?)
    }

    async fn list_threads(&self, user_id: Uuid) -> StoreResult<Vec<Thread>> {
        let rows = sqlx::query(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads \
             WHERE participant_low = $1 OR participant_high = $1 \
             ORDER BY updated_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(thread_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn append_message(&self, new: NewMessage) -> StoreResult<Message> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the thread serialises appends within it.
        let seq: Option<i64> = sqlx::query_scalar(
            "UPDATE threads SET last_seq = last_seq + 1 WHERE id = $1 RETURNING last_seq",
        )
        .bind(new.thread_id)
        .fetch_optional(&mut *tx)
        .await?;
        let seq = seq.ok_or(StoreError::NotFound)?;

        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (id, thread_id, sender_id, content, sequence_number, created_at) \
             VALUES ($1, $2, $3, $4, $5, clock_timestamp()) RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.thread_id)
        .bind(new.sender_id)
        .bind(&new.content)
        .bind(seq)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE threads
               SET last_message_id = $2,
                   last_message_sender_id = $3,
                   last_message_content = $4,
                   last_message_at = $5,
                   updated_at = GREATEST(updated_at, $5)
             WHERE id = $1
            "#,
        )
        .bind(message.thread_id)
        .bind(message.id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message)
    }

    async fn list_messages(&self, thread_id: Uuid) -> StoreResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = $1 \
             ORDER BY sequence_number ASC"
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_thread_read(&self, thread_id: Uuid, viewer_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages
               SET is_read = TRUE, read_at = NOW()
             WHERE thread_id = $1 AND sender_id <> $2 AND is_read = FALSE
            "#,
        )
        .bind(thread_id)
        .bind(viewer_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread(&self, thread_id: Uuid, viewer_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE thread_id = $1 AND sender_id <> $2 AND is_read = FALSE",
        )
        .bind(thread_id)
        .bind(viewer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "INSERT INTO notifications (id, user_id, notification_type, entity_id, title, message) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.kind.notification_type().as_str())
        .bind(new.kind.entity_id())
        .bind(&new.title)
        .bind(&new.message)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 \
               AND ($2::text IS NULL OR notification_type = $2) \
               AND ($3::boolean IS NULL OR is_read = $3) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4"
        ))
        .bind(user_id)
        .bind(filter.notification_type.map(|t| t.as_str()))
        .bind(filter.is_read)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>> {
        let updated = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() \
             WHERE id = $1 AND user_id = $2 AND is_read = FALSE",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated > 0 {
            return Ok(Some(true));
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE id = $1 AND user_id = $2)",
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.then_some(false))
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() \
             WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
