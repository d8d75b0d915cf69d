use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Notification type tag
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    /// New chat message
    Message,
    /// Session requested, confirmed, cancelled or rescheduled
    Session,
    /// Mentorship connection requested, accepted or declined
    ConnectionRequest,
    /// Mentor application approved or rejected
    MentorApproval,
    /// Goal milestone reached
    Goal,
    /// Platform announcement
    System,
}

impl NotificationType {
    pub const ALL: [NotificationType; 6] = [
        NotificationType::Message,
        NotificationType::Session,
        NotificationType::ConnectionRequest,
        NotificationType::MentorApproval,
        NotificationType::Goal,
        NotificationType::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Message => "MESSAGE",
            NotificationType::Session => "SESSION",
            NotificationType::ConnectionRequest => "CONNECTION_REQUEST",
            NotificationType::MentorApproval => "MENTOR_APPROVAL",
            NotificationType::Goal => "GOAL",
            NotificationType::System => "SYSTEM",
        }
    }

    /// Real-time event name used when the notification is pushed.
    pub fn event_type(&self) -> &'static str {
        match self {
            NotificationType::Message => "notification.message",
            NotificationType::Session => "notification.session",
            NotificationType::ConnectionRequest => "notification.connection_request",
            NotificationType::MentorApproval => "notification.mentor_approval",
            NotificationType::Goal => "notification.goal",
            NotificationType::System => "notification.system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("unknown notification type '{s}'"))
    }
}

/// What a notification is about. Each variant carries exactly the reference
/// that is meaningful for its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    #[serde(rename_all = "camelCase")]
    Message { thread_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Session { session_id: Uuid },
    #[serde(rename_all = "camelCase")]
    ConnectionRequest { request_id: Uuid },
    #[serde(rename_all = "camelCase")]
    MentorApproval { application_id: Uuid },
    #[serde(rename_all = "camelCase")]
    Goal { goal_id: Uuid },
    System,
}

impl NotificationKind {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationKind::Message { .. } => NotificationType::Message,
            NotificationKind::Session { .. } => NotificationType::Session,
            NotificationKind::ConnectionRequest { .. } => NotificationType::ConnectionRequest,
            NotificationKind::MentorApproval { .. } => NotificationType::MentorApproval,
            NotificationKind::Goal { .. } => NotificationType::Goal,
            NotificationKind::System => NotificationType::System,
        }
    }

    pub fn entity_id(&self) -> Option<Uuid> {
        match *self {
            NotificationKind::Message { thread_id } => Some(thread_id),
            NotificationKind::Session { session_id } => Some(session_id),
            NotificationKind::ConnectionRequest { request_id } => Some(request_id),
            NotificationKind::MentorApproval { application_id } => Some(application_id),
            NotificationKind::Goal { goal_id } => Some(goal_id),
            NotificationKind::System => None,
        }
    }

    /// Rebuild a kind from its flat stored form. Fails when the reference is
    /// missing for a type that needs one, or present for one that does not.
    pub fn from_parts(
        notification_type: NotificationType,
        entity_id: Option<Uuid>,
    ) -> Result<Self, String> {
        let missing = || format!("{notification_type} notification requires an entity id");
        Ok(match notification_type {
            NotificationType::Message => NotificationKind::Message {
                thread_id: entity_id.ok_or_else(missing)?,
            },
            NotificationType::Session => NotificationKind::Session {
                session_id: entity_id.ok_or_else(missing)?,
            },
            NotificationType::ConnectionRequest => NotificationKind::ConnectionRequest {
                request_id: entity_id.ok_or_else(missing)?,
            },
            NotificationType::MentorApproval => NotificationKind::MentorApproval {
                application_id: entity_id.ok_or_else(missing)?,
            },
            NotificationType::Goal => NotificationKind::Goal {
                goal_id: entity_id.ok_or_else(missing)?,
            },
            NotificationType::System => {
                if entity_id.is_some() {
                    return Err("SYSTEM notification cannot reference an entity".to_string());
                }
                NotificationKind::System
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    /// Recipient
    pub user_id: Uuid,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn notification_type(&self) -> NotificationType {
        self.kind.notification_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// A view over one user's notifications. Every field narrows the same set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotificationFilter {
    pub notification_type: Option<NotificationType>,
    pub is_read: Option<bool>,
    pub limit: i64,
}

impl NotificationFilter {
    pub fn all(limit: i64) -> Self {
        Self {
            notification_type: None,
            is_read: None,
            limit,
        }
    }

    pub fn matches(&self, notification: &Notification) -> bool {
        self.notification_type
            .map_or(true, |t| t == notification.notification_type())
            && self.is_read.map_or(true, |r| r == notification.is_read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_parses_case_insensitively() {
        assert_eq!(
            "session".parse::<NotificationType>().unwrap(),
            NotificationType::Session
        );
        assert_eq!(
            "CONNECTION_REQUEST".parse::<NotificationType>().unwrap(),
            NotificationType::ConnectionRequest
        );
        assert!("LIKE".parse::<NotificationType>().is_err());
    }

    #[test]
    fn kind_round_trips_through_flat_parts() {
        let session_id = Uuid::new_v4();
        let kind = NotificationKind::Session { session_id };
        let rebuilt =
            NotificationKind::from_parts(kind.notification_type(), kind.entity_id()).unwrap();
        assert_eq!(rebuilt, kind);
    }

    #[test]
    fn kind_requires_reference_where_meaningful() {
        assert!(NotificationKind::from_parts(NotificationType::Message, None).is_err());
        assert!(
            NotificationKind::from_parts(NotificationType::System, Some(Uuid::new_v4())).is_err()
        );
        assert_eq!(
            NotificationKind::from_parts(NotificationType::System, None).unwrap(),
            NotificationKind::System
        );
    }

    #[test]
    fn notification_serializes_flat_with_variant_reference() {
        let session_id = Uuid::new_v4();
        let n = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::Session { session_id },
            title: "Session cancelled".into(),
            message: "Your session was cancelled".into(),
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "SESSION");
        assert_eq!(value["sessionId"], session_id.to_string());
        assert_eq!(value["isRead"], false);
        assert!(value.get("threadId").is_none());
    }

    #[test]
    fn filter_matches_type_and_read_state() {
        let n = Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::System,
            title: "t".into(),
            message: "m".into(),
            is_read: true,
            read_at: Some(Utc::now()),
            created_at: Utc::now(),
        };

        assert!(NotificationFilter::all(10).matches(&n));
        let unread_only = NotificationFilter {
            is_read: Some(false),
            ..NotificationFilter::all(10)
        };
        assert!(!unread_only.matches(&n));
        let sessions = NotificationFilter {
            notification_type: Some(NotificationType::Session),
            ..NotificationFilter::all(10)
        };
        assert!(!sessions.matches(&n));
    }
}
