use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    LastMessage, Message, NewMessage, NewNotification, Notification, NotificationFilter,
    ParticipantPair, Thread,
};

#[derive(Default)]
struct Inner {
    threads: HashMap<Uuid, Thread>,
    /// Unique index over normalised participant pairs.
    threads_by_pair: HashMap<ParticipantPair, Uuid>,
    last_seq: HashMap<Uuid, i64>,
    /// Per-thread history in append order.
    messages: HashMap<Uuid, Vec<Message>>,
    notifications: HashMap<Uuid, Notification>,
}

/// In-process store with the same contract as the Postgres one.
///
/// `set_available(false)` makes every call fail with
/// [`StoreError::Unavailable`], which is how tests exercise the transient
/// failure path.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_thread_by_pair(&self, pair: ParticipantPair) -> StoreResult<Option<Thread>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .threads_by_pair
            .get(&pair)
            .and_then(|id| inner.threads.get(id))
            .cloned())
    }

    async fn insert_thread(&self, pair: ParticipantPair) -> StoreResult<Thread> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        if inner.threads_by_pair.contains_key(&pair) {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let thread = Thread {
            id: Uuid::new_v4(),
            participant_low: pair.low(),
            participant_high: pair.high(),
            last_message: None,
            created_at: now,
            updated_at: now,
        };
        inner.threads_by_pair.insert(pair, thread.id);
        inner.last_seq.insert(thread.id, 0);
        inner.threads.insert(thread.id, thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: Uuid) -> StoreResult<Option<Thread>> {
        self.check_available()?;
        Ok(self.inner.read().await.threads.get(&thread_id).cloned())
    }

    async fn list_threads(&self, user_id: Uuid) -> StoreResult<Vec<Thread>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let mut threads: Vec<Thread> = inner
            .threads
            .values()
            .filter(|t| t.is_participant(user_id))
            .cloned()
            .collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(threads)
    }

    async fn append_message(&self, new: NewMessage) -> StoreResult<Message> {
        self.check_available()?;
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let thread = inner
            .threads
            .get_mut(&new.thread_id)
            .ok_or(StoreError::NotFound)?;
        let seq = inner.last_seq.entry(new.thread_id).or_insert(0);
        *seq += 1;

        // Keep timestamps non-decreasing within a thread even if the clock steps back.
        let previous: Option<DateTime<Utc>> = thread.last_message.as_ref().map(|m| m.created_at);
        let now = Utc::now();
        let created_at = previous.map_or(now, |p| p.max(now));

        let message = Message {
            id: Uuid::new_v4(),
            thread_id: new.thread_id,
            sender_id: new.sender_id,
            content: new.content,
            sequence_number: *seq,
            is_read: false,
            read_at: None,
            created_at,
        };

        thread.last_message = Some(LastMessage {
            id: message.id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            created_at,
        });
        thread.updated_at = thread.updated_at.max(created_at);

        inner
            .messages
            .entry(new.thread_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, thread_id: Uuid) -> StoreResult<Vec<Message>> {
        self.check_available()?;
        Ok(self
            .inner
            .read()
            .await
            .messages
            .get(&thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_thread_read(&self, thread_id: Uuid, viewer_id: Uuid) -> StoreResult<u64> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut changed = 0;
        if let Some(messages) = inner.messages.get_mut(&thread_id) {
            for message in messages.iter_mut().filter(|m| m.is_unread_for(viewer_id)) {
                message.is_read = true;
                message.read_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_unread(&self, thread_id: Uuid, viewer_id: Uuid) -> StoreResult<i64> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .get(&thread_id)
            .map(|msgs| msgs.iter().filter(|m| m.is_unread_for(viewer_id)).count() as i64)
            .unwrap_or(0))
    }

    async fn insert_notification(&self, new: NewNotification) -> StoreResult<Notification> {
        self.check_available()?;
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> StoreResult<Vec<Notification>> {
        self.check_available()?;
        let inner = self.inner.read().await;
        let mut list: Vec<Notification> = inner
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && filter.matches(n))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list.truncate(filter.limit.max(0) as usize);
        Ok(list)
    }

    async fn mark_notification_read(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        match inner.notifications.get_mut(&notification_id) {
            Some(n) if n.user_id == user_id => {
                if n.is_read {
                    Ok(Some(false))
                } else {
                    n.is_read = true;
                    n.read_at = Some(Utc::now());
                    Ok(Some(true))
                }
            }
            _ => Ok(None),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        let mut changed = 0;
        for n in inner
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            n.read_at = Some(now);
            changed += 1;
        }
        Ok(changed)
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> StoreResult<i64> {
        self.check_available()?;
        let inner = self.inner.read().await;
        Ok(inner
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;

    fn pair() -> ParticipantPair {
        ParticipantPair::new(Uuid::new_v4(), Uuid::new_v4()).unwrap()
    }

    #[tokio::test]
    async fn second_insert_for_same_pair_conflicts() {
        let store = MemoryStore::new();
        let pair = pair();

        store.insert_thread(pair).await.unwrap();
        let err = store.insert_thread(pair).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequence_and_moves_pointer() {
        let store = MemoryStore::new();
        let pair = pair();
        let thread = store.insert_thread(pair).await.unwrap();

        let first = store
            .append_message(NewMessage {
                thread_id: thread.id,
                sender_id: pair.low(),
                content: "one".into(),
            })
            .await
            .unwrap();
        let second = store
            .append_message(NewMessage {
                thread_id: thread.id,
                sender_id: pair.high(),
                content: "two".into(),
            })
            .await
            .unwrap();

        assert_eq!(first.sequence_number, 1);
        assert_eq!(second.sequence_number, 2);
        assert!(second.created_at >= first.created_at);

        let thread = store.get_thread(thread.id).await.unwrap().unwrap();
        let last = thread.last_message.unwrap();
        assert_eq!(last.id, second.id);
        assert_eq!(thread.updated_at, last.created_at.max(thread.created_at));
    }

    #[tokio::test]
    async fn append_to_unknown_thread_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .append_message(NewMessage {
                thread_id: Uuid::new_v4(),
                sender_id: Uuid::new_v4(),
                content: "x".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.insert_thread(pair()).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_available(true);
        assert!(store.insert_thread(pair()).await.is_ok());
    }

    #[tokio::test]
    async fn notification_read_is_scoped_to_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let n = store
            .insert_notification(NewNotification {
                user_id: owner,
                kind: NotificationKind::System,
                title: "hello".into(),
                message: "world".into(),
            })
            .await
            .unwrap();

        assert_eq!(
            store.mark_notification_read(n.id, Uuid::new_v4()).await.unwrap(),
            None
        );
        assert_eq!(store.mark_notification_read(n.id, owner).await.unwrap(), Some(true));
        assert_eq!(store.mark_notification_read(n.id, owner).await.unwrap(), Some(false));
    }
}
