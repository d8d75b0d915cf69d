use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Thread;
use crate::services::ThreadRegistry;
use crate::store::DynStore;
use crate::websocket::{EventBroadcaster, ServerEvent};

/// Per-viewer read state of thread messages.
#[derive(Clone)]
pub struct ReadStateTracker {
    store: DynStore,
    threads: ThreadRegistry,
    broadcaster: EventBroadcaster,
}

impl ReadStateTracker {
    pub fn new(store: DynStore, threads: ThreadRegistry, broadcaster: EventBroadcaster) -> Self {
        Self {
            store,
            threads,
            broadcaster,
        }
    }

    /// Mark every message in the thread not sent by `viewer_id` as read.
    ///
    /// Returns the number of messages that changed. Repeating the call is a
    /// no-op; `message_read` is only pushed to the participants when
    /// something actually changed.
    pub async fn mark_read(&self, thread_id: Uuid, viewer_id: Uuid) -> AppResult<u64> {
        let thread = self
            .threads
            .get_for_participant(thread_id, viewer_id)
            .await?;

        let changed = self.store.mark_thread_read(thread_id, viewer_id).await?;
        if changed == 0 {
            return Ok(0);
        }

        info!(thread_id = %thread_id, reader_id = %viewer_id, changed, "thread marked read");
        self.broadcaster
            .publish_many(
                &thread.participants(),
                &ServerEvent::MessageRead {
                    thread_id,
                    reader_id: viewer_id,
                },
            )
            .await;
        Ok(changed)
    }

    /// Messages in the thread sent by the other participant that `viewer_id`
    /// has not read yet.
    pub async fn unread_count(&self, thread_id: Uuid, viewer_id: Uuid) -> AppResult<i64> {
        self.threads
            .get_for_participant(thread_id, viewer_id)
            .await?;
        Ok(self.store.count_unread(thread_id, viewer_id).await?)
    }

    /// `unread_count` for a thread the caller already holds.
    pub async fn unread_in(&self, thread: &Thread, viewer_id: Uuid) -> AppResult<i64> {
        if !thread.is_participant(viewer_id) {
            return Err(AppError::Forbidden);
        }
        Ok(self.store.count_unread(thread.id, viewer_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMessage;
    use crate::store::{MemoryStore, Store};
    use crate::websocket::ConnectionRegistry;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryStore>,
        tracker: ReadStateTracker,
        threads: ThreadRegistry,
        broadcaster: EventBroadcaster,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: DynStore = store.clone();
        let threads = ThreadRegistry::new(dyn_store.clone());
        let broadcaster =
            EventBroadcaster::new(ConnectionRegistry::new(16));
        Fixture {
            store,
            tracker: ReadStateTracker::new(dyn_store, threads.clone(), broadcaster.clone()),
            threads,
            broadcaster,
        }
    }

    async fn send(store: &MemoryStore, thread_id: Uuid, sender_id: Uuid, content: &str) {
        store
            .append_message(NewMessage {
                thread_id,
                sender_id,
                content: content.into(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn counts_only_the_other_side() {
        let f = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let thread = f.threads.resolve(alice, bob).await.unwrap();

        send(&f.store, thread.id, alice, "a1").await;
        send(&f.store, thread.id, alice, "a2").await;
        send(&f.store, thread.id, bob, "b1").await;

        assert_eq!(f.tracker.unread_count(thread.id, bob).await.unwrap(), 2);
        assert_eq!(f.tracker.unread_count(thread.id, alice).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent_and_leaves_own_messages() {
        let f = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let thread = f.threads.resolve(alice, bob).await.unwrap();
        send(&f.store, thread.id, alice, "hi").await;
        send(&f.store, thread.id, bob, "hey").await;

        assert_eq!(f.tracker.mark_read(thread.id, bob).await.unwrap(), 1);
        assert_eq!(f.tracker.mark_read(thread.id, bob).await.unwrap(), 0);
        assert_eq!(f.tracker.unread_count(thread.id, bob).await.unwrap(), 0);
        assert_eq!(f.tracker.unread_count(thread.id, alice).await.unwrap(), 1);

        let history = f.store.list_messages(thread.id).await.unwrap();
        let bobs = history.iter().find(|m| m.sender_id == bob).unwrap();
        assert!(!bobs.is_read);
        let alices = history.iter().find(|m| m.sender_id == alice).unwrap();
        assert!(alices.is_read && alices.read_at.is_some());
    }

    #[tokio::test]
    async fn read_receipt_goes_to_both_participants_once() {
        let f = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let thread = f.threads.resolve(alice, bob).await.unwrap();
        send(&f.store, thread.id, alice, "hi").await;

        let (_a, mut alice_rx) = f.broadcaster.registry().register(alice).await;
        let (_b, mut bob_rx) = f.broadcaster.registry().register(bob).await;

        f.tracker.mark_read(thread.id, bob).await.unwrap();
        f.tracker.mark_read(thread.id, bob).await.unwrap();

        for rx in [&mut alice_rx, &mut bob_rx] {
            let text = rx.recv().await.unwrap();
            assert!(text.contains("\"message_read\""));
            assert!(text.contains(&bob.to_string()));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn outsiders_are_forbidden() {
        let f = fixture();
        let thread = f
            .threads
            .resolve(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();

        assert!(matches!(
            f.tracker.mark_read(thread.id, Uuid::new_v4()).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            f.tracker.unread_in(&thread, Uuid::new_v4()).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn unread_in_counts_only_the_other_side() {
        let f = fixture();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let thread = f.threads.resolve(alice, bob).await.unwrap();
        send(&f.store, thread.id, alice, "a1").await;
        send(&f.store, thread.id, alice, "a2").await;

        assert_eq!(f.tracker.unread_in(&thread, bob).await.unwrap(), 2);
        assert_eq!(f.tracker.unread_in(&thread, alice).await.unwrap(), 0);
    }
}
