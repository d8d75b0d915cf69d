//! Domain transitions that notify a user.
//!
//! Session scheduling, connection approval and the mentor-approval workflow
//! each emit one of these per transition; the notification dispatcher turns
//! every event into exactly one notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::notification::{NewNotification, NotificationKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        recipient_id: Uuid,
        sender_name: Option<String>,
        thread_id: Uuid,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    SessionRequested {
        mentor_id: Uuid,
        mentee_name: String,
        session_id: Uuid,
        scheduled_for: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    SessionConfirmed {
        mentee_id: Uuid,
        mentor_name: String,
        session_id: Uuid,
        scheduled_for: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    SessionCancelled {
        recipient_id: Uuid,
        cancelled_by_name: String,
        session_id: Uuid,
        scheduled_for: DateTime<Utc>,
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SessionRescheduled {
        recipient_id: Uuid,
        rescheduled_by_name: String,
        session_id: Uuid,
        scheduled_for: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionRequested {
        mentor_id: Uuid,
        mentee_name: String,
        request_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionAccepted {
        mentee_id: Uuid,
        mentor_name: String,
        request_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    ConnectionDeclined {
        mentee_id: Uuid,
        mentor_name: String,
        request_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    MentorApproved { mentor_id: Uuid, application_id: Uuid },
    #[serde(rename_all = "camelCase")]
    MentorRejected {
        mentor_id: Uuid,
        application_id: Uuid,
        reason: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GoalCompleted {
        mentor_id: Uuid,
        mentee_name: String,
        goal_id: Uuid,
        goal_title: String,
    },
    #[serde(rename_all = "camelCase")]
    System {
        user_id: Uuid,
        title: String,
        message: String,
    },
}

impl DomainEvent {
    pub fn recipient(&self) -> Uuid {
        match self {
            DomainEvent::MessageReceived { recipient_id, .. }
            | DomainEvent::SessionCancelled { recipient_id, .. }
            | DomainEvent::SessionRescheduled { recipient_id, .. } => *recipient_id,
            DomainEvent::SessionRequested { mentor_id, .. }
            | DomainEvent::ConnectionRequested { mentor_id, .. }
            | DomainEvent::MentorApproved { mentor_id, .. }
            | DomainEvent::MentorRejected { mentor_id, .. }
            | DomainEvent::GoalCompleted { mentor_id, .. } => *mentor_id,
            DomainEvent::SessionConfirmed { mentee_id, .. }
            | DomainEvent::ConnectionAccepted { mentee_id, .. }
            | DomainEvent::ConnectionDeclined { mentee_id, .. } => *mentee_id,
            DomainEvent::System { user_id, .. } => *user_id,
        }
    }

    /// Short name used in logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::MessageReceived { .. } => "message_received",
            DomainEvent::SessionRequested { .. } => "session_requested",
            DomainEvent::SessionConfirmed { .. } => "session_confirmed",
            DomainEvent::SessionCancelled { .. } => "session_cancelled",
            DomainEvent::SessionRescheduled { .. } => "session_rescheduled",
            DomainEvent::ConnectionRequested { .. } => "connection_requested",
            DomainEvent::ConnectionAccepted { .. } => "connection_accepted",
            DomainEvent::ConnectionDeclined { .. } => "connection_declined",
            DomainEvent::MentorApproved { .. } => "mentor_approved",
            DomainEvent::MentorRejected { .. } => "mentor_rejected",
            DomainEvent::GoalCompleted { .. } => "goal_completed",
            DomainEvent::System { .. } => "system",
        }
    }

    /// The single notification this transition produces.
    pub fn into_notification(self, preview_chars: usize) -> NewNotification {
        let user_id = self.recipient();
        let (kind, title, message) = match self {
            DomainEvent::MessageReceived {
                sender_name,
                thread_id,
                content,
                ..
            } => (
                NotificationKind::Message { thread_id },
                match sender_name {
                    Some(name) => format!("New message from {name}"),
                    None => "New message".to_string(),
                },
                truncate_preview(&content, preview_chars),
            ),
            DomainEvent::SessionRequested {
                mentee_name,
                session_id,
                scheduled_for,
                ..
            } => (
                NotificationKind::Session { session_id },
                "New session request".to_string(),
                format!(
                    "{mentee_name} requested a session on {}",
                    format_when(scheduled_for)
                ),
            ),
            DomainEvent::SessionConfirmed {
                mentor_name,
                session_id,
                scheduled_for,
                ..
            } => (
                NotificationKind::Session { session_id },
                "Session confirmed".to_string(),
                format!(
                    "{mentor_name} confirmed your session on {}",
                    format_when(scheduled_for)
                ),
            ),
            DomainEvent::SessionCancelled {
                cancelled_by_name,
                session_id,
                scheduled_for,
                reason,
                ..
            } => (
                NotificationKind::Session { session_id },
                "Session cancelled".to_string(),
                with_reason(
                    format!(
                        "{cancelled_by_name} cancelled the session on {}",
                        format_when(scheduled_for)
                    ),
                    reason,
                ),
            ),
            DomainEvent::SessionRescheduled {
                rescheduled_by_name,
                session_id,
                scheduled_for,
                ..
            } => (
                NotificationKind::Session { session_id },
                "Session rescheduled".to_string(),
                format!(
                    "{rescheduled_by_name} moved your session to {}",
                    format_when(scheduled_for)
                ),
            ),
            DomainEvent::ConnectionRequested {
                mentee_name,
                request_id,
                ..
            } => (
                NotificationKind::ConnectionRequest { request_id },
                "New connection request".to_string(),
                format!("{mentee_name} would like you to be their mentor"),
            ),
            DomainEvent::ConnectionAccepted {
                mentor_name,
                request_id,
                ..
            } => (
                NotificationKind::ConnectionRequest { request_id },
                "Connection accepted".to_string(),
                format!("{mentor_name} accepted your connection request"),
            ),
            DomainEvent::ConnectionDeclined {
                mentor_name,
                request_id,
                ..
            } => (
                NotificationKind::ConnectionRequest { request_id },
                "Connection declined".to_string(),
                format!("{mentor_name} declined your connection request"),
            ),
            DomainEvent::MentorApproved { application_id, .. } => (
                NotificationKind::MentorApproval { application_id },
                "Mentor application approved".to_string(),
                "Your mentor profile is now visible to mentees".to_string(),
            ),
            DomainEvent::MentorRejected {
                application_id,
                reason,
                ..
            } => (
                NotificationKind::MentorApproval { application_id },
                "Mentor application not approved".to_string(),
                with_reason(
                    "Your mentor application was not approved".to_string(),
                    reason,
                ),
            ),
            DomainEvent::GoalCompleted {
                mentee_name,
                goal_id,
                goal_title,
                ..
            } => (
                NotificationKind::Goal { goal_id },
                "Goal completed".to_string(),
                format!("{mentee_name} completed \"{goal_title}\""),
            ),
            DomainEvent::System { title, message, .. } => (NotificationKind::System, title, message),
        };

        NewNotification {
            user_id,
            kind,
            title,
            message,
        }
    }
}

fn format_when(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn with_reason(message: String, reason: Option<String>) -> String {
    match reason.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => format!("{message}: {r}"),
        _ => message,
    }
}

/// Cut `message` to at most `max_chars` characters, marking the cut with "...".
pub fn truncate_preview(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let truncated: String = message.chars().take(keep).collect();
    format!("{truncated}...")
}
