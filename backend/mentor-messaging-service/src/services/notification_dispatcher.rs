use serde::{Deserialize, Deserializer};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    DomainEvent, NewNotification, Notification, NotificationFilter, NotificationKind,
    NotificationType,
};
use crate::store::DynStore;
use crate::websocket::{EventBroadcaster, ServerEvent};

/// Listing parameters as they arrive from the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    #[serde(rename = "type", default, deserialize_with = "parse_type")]
    pub notification_type: Option<NotificationType>,
    #[serde(rename = "read")]
    pub is_read: Option<bool>,
    pub limit: Option<i64>,
}

fn parse_type<'de, D>(deserializer: D) -> Result<Option<NotificationType>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| raw.parse().map_err(serde::de::Error::custom))
        .transpose()
}

/// Persists notifications and pushes them to the recipient's live connections.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: DynStore,
    broadcaster: EventBroadcaster,
    config: NotificationConfig,
}

impl NotificationDispatcher {
    pub fn new(store: DynStore, broadcaster: EventBroadcaster, config: NotificationConfig) -> Self {
        Self {
            store,
            broadcaster,
            config,
        }
    }

    /// Persist one notification for `user_id`, then push it.
    ///
    /// The push is best effort; an offline recipient sees the notification on
    /// their next listing.
    pub async fn raise(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> AppResult<Notification> {
        let notification = self
            .store
            .insert_notification(NewNotification {
                user_id,
                kind,
                title: title.into(),
                message: message.into(),
            })
            .await?;

        let notification_type = notification.notification_type();
        metrics::record_notification_raised(notification_type.as_str());
        info!(
            notification_id = %notification.id,
            user_id = %user_id,
            notification_type = %notification_type,
            "notification raised"
        );

        let report = self
            .broadcaster
            .publish(user_id, &ServerEvent::Notification(notification.clone()))
            .await;
        debug!(
            notification_id = %notification.id,
            delivered = report.delivered,
            "notification pushed"
        );
        Ok(notification)
    }

    /// Turn a domain transition into its single notification.
    pub async fn dispatch(&self, event: DomainEvent) -> AppResult<Notification> {
        debug!(event = event.name(), recipient = %event.recipient(), "dispatching domain event");
        let new = event.into_notification(self.config.preview_chars);
        self.raise(new.user_id, new.kind, new.title, new.message)
            .await
    }

    /// Newest first. `limit` is clamped to the configured maximum.
    pub async fn list(
        &self,
        user_id: Uuid,
        query: NotificationQuery,
    ) -> AppResult<Vec<Notification>> {
        let filter = NotificationFilter {
            notification_type: query.notification_type,
            is_read: query.is_read,
            limit: self.config.effective_limit(query.limit),
        };
        Ok(self.store.list_notifications(user_id, &filter).await?)
    }

    /// Marking an already-read notification succeeds. Notifications that do
    /// not exist or belong to someone else are `NotFound`.
    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> AppResult<()> {
        match self
            .store
            .mark_notification_read(notification_id, user_id)
            .await?
        {
            Some(changed) => {
                debug!(notification_id = %notification_id, changed, "notification marked read");
                Ok(())
            }
            None => Err(AppError::NotFound),
        }
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let updated = self.store.mark_all_notifications_read(user_id).await?;
        if updated > 0 {
            info!(user_id = %user_id, updated, "notifications marked read");
        }
        Ok(updated)
    }

    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self.store.count_unread_notifications(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::websocket::ConnectionRegistry;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn dispatcher() -> NotificationDispatcher {
        NotificationDispatcher::new(
            Arc::new(MemoryStore::new()),
            EventBroadcaster::new(ConnectionRegistry::new(16)),
            NotificationConfig::default(),
        )
    }

    #[tokio::test]
    async fn raise_persists_and_pushes() {
        let d = dispatcher();
        let user = Uuid::new_v4();
        let (_h, mut rx) = d.broadcaster.registry().register(user).await;

        let n = d
            .raise(user, NotificationKind::System, "Welcome", "Hello there")
            .await
            .unwrap();
        assert!(!n.is_read);
        assert_eq!(d.unread_count(user).await.unwrap(), 1);

        let text = rx.recv().await.unwrap();
        assert!(text.contains("\"notification.system\""));
        assert!(text.contains(&n.id.to_string()));
    }

    #[tokio::test]
    async fn raise_for_offline_user_still_persists() {
        let d = dispatcher();
        let user = Uuid::new_v4();
        d.raise(user, NotificationKind::System, "t", "m").await.unwrap();
        assert_eq!(d.list(user, NotificationQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dispatch_session_cancelled_produces_one_session_notification() {
        let d = dispatcher();
        let mentee = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let n = d
            .dispatch(DomainEvent::SessionCancelled {
                recipient_id: mentee,
                cancelled_by_name: "Dana".into(),
                session_id,
                scheduled_for: Utc::now(),
                reason: Some("conflict".into()),
            })
            .await
            .unwrap();

        assert_eq!(n.user_id, mentee);
        assert_eq!(n.kind, NotificationKind::Session { session_id });
        assert_eq!(n.title, "Session cancelled");
        assert_eq!(d.unread_count(mentee).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let d = dispatcher();
        let user = Uuid::new_v4();
        let first = d
            .raise(user, NotificationKind::System, "first", "m")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        d.raise(
            user,
            NotificationKind::Goal {
                goal_id: Uuid::new_v4(),
            },
            "second",
            "m",
        )
        .await
        .unwrap();
        d.mark_read(first.id, user).await.unwrap();

        let all = d.list(user, NotificationQuery::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["second", "first"]);

        let unread = d
            .list(
                user,
                NotificationQuery {
                    is_read: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].title, "second");

        let system = d
            .list(
                user,
                NotificationQuery {
                    notification_type: Some(NotificationType::System),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(system.len(), 1);
        assert_eq!(system[0].id, first.id);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent_and_owner_scoped() {
        let d = dispatcher();
        let owner = Uuid::new_v4();
        let n = d
            .raise(owner, NotificationKind::System, "t", "m")
            .await
            .unwrap();

        assert!(matches!(
            d.mark_read(n.id, Uuid::new_v4()).await,
            Err(AppError::NotFound)
        ));
        d.mark_read(n.id, owner).await.unwrap();
        d.mark_read(n.id, owner).await.unwrap();
        assert_eq!(d.unread_count(owner).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_all_read_touches_only_the_caller() {
        let d = dispatcher();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        for _ in 0..3 {
            d.raise(alice, NotificationKind::System, "t", "m").await.unwrap();
        }
        d.raise(bob, NotificationKind::System, "t", "m").await.unwrap();

        assert_eq!(d.mark_all_read(alice).await.unwrap(), 3);
        assert_eq!(d.mark_all_read(alice).await.unwrap(), 0);
        assert_eq!(d.unread_count(bob).await.unwrap(), 1);
    }
}
