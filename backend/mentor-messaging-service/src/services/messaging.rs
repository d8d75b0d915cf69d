use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::message::is_blank;
use crate::models::{DomainEvent, Message, Thread, ThreadSummary};
use crate::services::message_ledger::validate_length;
use crate::services::{MessageLedger, NotificationDispatcher, ReadStateTracker, ThreadRegistry};
use crate::websocket::{EventBroadcaster, ServerEvent};

/// One send request, from either the real-time channel or HTTP.
#[derive(Debug, Clone, Default)]
pub struct SendMessage {
    /// Omitted on first contact; the thread is then resolved from the pair.
    pub thread_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub content: String,
    /// Opaque token echoed back on the sender's copy of `new_message`.
    pub client_message_id: Option<String>,
}

/// Orchestrates a send: thread resolution, append, fan-out and the
/// recipient's notification.
#[derive(Clone)]
pub struct MessagingService {
    threads: ThreadRegistry,
    ledger: MessageLedger,
    read_state: ReadStateTracker,
    broadcaster: EventBroadcaster,
    notifications: NotificationDispatcher,
}

impl MessagingService {
    pub fn new(
        threads: ThreadRegistry,
        ledger: MessageLedger,
        read_state: ReadStateTracker,
        broadcaster: EventBroadcaster,
        notifications: NotificationDispatcher,
    ) -> Self {
        Self {
            threads,
            ledger,
            read_state,
            broadcaster,
            notifications,
        }
    }

    /// Send a message from `sender_id`.
    ///
    /// Returns `Ok(None)` for blank content without resolving or creating a
    /// thread. Once the append has committed the call succeeds even if
    /// delivery or the notification fails.
    pub async fn send(&self, sender_id: Uuid, cmd: SendMessage) -> AppResult<Option<Message>> {
        if is_blank(&cmd.content) {
            debug!(sender_id = %sender_id, "ignoring blank send");
            return Ok(None);
        }
        validate_length(&cmd.content)?;

        let thread = self.target_thread(sender_id, &cmd).await?;
        let receiver_id = thread.counterpart(sender_id).ok_or(AppError::Forbidden)?;

        let Some(message) = self
            .ledger
            .append(thread.id, sender_id, &cmd.content)
            .await?
        else {
            return Ok(None);
        };

        self.broadcaster
            .publish(
                receiver_id,
                &ServerEvent::NewMessage {
                    message: message.clone(),
                    client_message_id: None,
                },
            )
            .await;
        self.broadcaster
            .publish(
                sender_id,
                &ServerEvent::NewMessage {
                    message: message.clone(),
                    client_message_id: cmd.client_message_id,
                },
            )
            .await;

        let event = DomainEvent::MessageReceived {
            recipient_id: receiver_id,
            sender_name: None,
            thread_id: thread.id,
            content: message.content.clone(),
        };
        if let Err(e) = self.notifications.dispatch(event).await {
            warn!(
                error = %e,
                message_id = %message.id,
                receiver_id = %receiver_id,
                "message committed but notification failed"
            );
        }

        Ok(Some(message))
    }

    async fn target_thread(&self, sender_id: Uuid, cmd: &SendMessage) -> AppResult<Thread> {
        match (cmd.thread_id, cmd.receiver_id) {
            (Some(thread_id), receiver_id) => {
                let thread = self
                    .threads
                    .get_for_participant(thread_id, sender_id)
                    .await?;
                if let Some(receiver_id) = receiver_id {
                    if thread.counterpart(sender_id) != Some(receiver_id) {
                        return Err(AppError::BadRequest(
                            "receiver is not the other participant of the thread".into(),
                        ));
                    }
                }
                Ok(thread)
            }
            (None, Some(receiver_id)) => self.threads.resolve(sender_id, receiver_id).await,
            (None, None) => Err(AppError::BadRequest(
                "either threadId or receiverId is required".into(),
            )),
        }
    }

    /// The caller's conversations, most recently active first, each with its
    /// unread count.
    pub async fn list_threads(&self, user_id: Uuid) -> AppResult<Vec<ThreadSummary>> {
        let threads = self.threads.list_for_user(user_id).await?;
        let mut summaries = Vec::with_capacity(threads.len());
        for thread in threads {
            let Some(contact_id) = thread.counterpart(user_id) else {
                continue;
            };
            let unread_count = self.read_state.unread_in(&thread, user_id).await?;
            summaries.push(ThreadSummary {
                thread_id: thread.id,
                contact_id,
                last_message: thread.last_message,
                unread_count,
                updated_at: thread.updated_at,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationConfig;
    use crate::store::{DynStore, MemoryStore};
    use crate::websocket::ConnectionRegistry;
    use std::sync::Arc;

    fn service() -> (MessagingService, EventBroadcaster, NotificationDispatcher) {
        let store: DynStore = Arc::new(MemoryStore::new());
        let broadcaster =
            EventBroadcaster::new(ConnectionRegistry::new(16));
        let threads = ThreadRegistry::new(store.clone());
        let ledger = MessageLedger::new(store.clone(), threads.clone());
        let read_state = ReadStateTracker::new(store.clone(), threads.clone(), broadcaster.clone());
        let notifications = NotificationDispatcher::new(
            store,
            broadcaster.clone(),
            NotificationConfig::default(),
        );
        (
            MessagingService::new(
                threads,
                ledger,
                read_state,
                broadcaster.clone(),
                notifications.clone(),
            ),
            broadcaster,
            notifications,
        )
    }

    fn first_contact(receiver_id: Uuid, content: &str) -> SendMessage {
        SendMessage {
            receiver_id: Some(receiver_id),
            content: content.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn blank_send_creates_no_thread() {
        let (svc, _, _) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        assert!(svc.send(alice, first_contact(bob, " \n")).await.unwrap().is_none());
        assert!(svc.list_threads(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn first_contact_creates_thread_and_notifies() {
        let (svc, _, notifications) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let message = svc
            .send(alice, first_contact(bob, "hello"))
            .await
            .unwrap()
            .unwrap();

        let bobs = svc.list_threads(bob).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].thread_id, message.thread_id);
        assert_eq!(bobs[0].contact_id, alice);
        assert_eq!(bobs[0].unread_count, 1);
        assert_eq!(svc.list_threads(alice).await.unwrap()[0].unread_count, 0);
        assert_eq!(notifications.unread_count(bob).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sender_copy_carries_token_and_receiver_copy_does_not() {
        let (svc, broadcaster, _) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (_a, mut alice_rx) = broadcaster.registry().register(alice).await;
        let (_b, mut bob_rx) = broadcaster.registry().register(bob).await;

        svc.send(
            alice,
            SendMessage {
                client_message_id: Some("tmp-1".into()),
                ..first_contact(bob, "hi")
            },
        )
        .await
        .unwrap();

        let to_alice = alice_rx.recv().await.unwrap();
        assert!(to_alice.contains("\"new_message\""));
        assert!(to_alice.contains("tmp-1"));

        let to_bob = bob_rx.recv().await.unwrap();
        assert!(to_bob.contains("\"new_message\""));
        assert!(!to_bob.contains("tmp-1"));
        let notification = bob_rx.recv().await.unwrap();
        assert!(notification.contains("\"notification.message\""));
    }

    #[tokio::test]
    async fn thread_and_receiver_must_agree() {
        let (svc, _, _) = service();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let message = svc
            .send(alice, first_contact(bob, "hi"))
            .await
            .unwrap()
            .unwrap();

        let err = svc
            .send(
                alice,
                SendMessage {
                    thread_id: Some(message.thread_id),
                    receiver_id: Some(Uuid::new_v4()),
                    content: "again".into(),
                    client_message_id: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn send_without_target_is_rejected() {
        let (svc, _, _) = service();
        let err = svc
            .send(
                Uuid::new_v4(),
                SendMessage {
                    content: "hi".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
