use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use super::{events::ServerEvent, ConnectionRegistry};
use crate::metrics;

/// Outcome of one `publish` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    /// Connections that were closed or too far behind; they have been unregistered.
    pub dropped: usize,
}

impl DeliveryReport {
    fn merge(&mut self, other: DeliveryReport) {
        self.attempted += other.attempted;
        self.delivered += other.delivered;
        self.dropped += other.dropped;
    }
}

/// Best-effort, at-most-once push to a user's live connections.
///
/// Nothing is queued for offline users: durability belongs to the store and
/// clients catch up by fetching.
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: ConnectionRegistry,
}

impl EventBroadcaster {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Deliver `event` to every live connection of `user_id`.
    ///
    /// Never waits on a consumer: the event is placed on each connection's
    /// bounded queue or the connection is dropped. A queue that is closed, or
    /// still full because its reader fell a whole buffer behind, gets its
    /// connection unregistered. Successive calls for the same user land in
    /// each queue in call order.
    pub async fn publish(&self, user_id: Uuid, event: &ServerEvent) -> DeliveryReport {
        let connections = self.registry.connections_for(user_id).await;
        if connections.is_empty() {
            tracing::trace!(user_id = %user_id, event = event.event_type(), "no live connections");
            return DeliveryReport::default();
        }

        let event_type = event.event_type();
        let mut report = DeliveryReport {
            attempted: connections.len(),
            ..DeliveryReport::default()
        };
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, event = event_type, "failed to serialize event");
                return report;
            }
        };

        for conn in &connections {
            let reason = match conn.sender.try_send(payload.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::record_event_delivered(event_type);
                    continue;
                }
                Err(TrySendError::Full(_)) => "lagging",
                Err(TrySendError::Closed(_)) => "closed",
            };

            report.dropped += 1;
            metrics::record_event_dropped(event_type, reason);
            tracing::warn!(
                user_id = %user_id,
                connection = %conn.handle,
                reason,
                event = event_type,
                "dropping unresponsive connection"
            );
            self.registry.unregister(conn.handle).await;
        }

        tracing::debug!(
            user_id = %user_id,
            event = event_type,
            delivered = report.delivered,
            dropped = report.dropped,
            "event published"
        );
        report
    }

    /// `publish` to each user in turn.
    pub async fn publish_many(&self, user_ids: &[Uuid], event: &ServerEvent) -> DeliveryReport {
        let mut total = DeliveryReport::default();
        for user_id in user_ids {
            total.merge(self.publish(*user_id, event).await);
        }
        total
    }
}
