pub mod domain_event;
pub mod message;
pub mod notification;
pub mod thread;

pub use domain_event::DomainEvent;
pub use message::{Message, NewMessage, MAX_CONTENT_CHARS};
pub use notification::{
    NewNotification, Notification, NotificationFilter, NotificationKind, NotificationType,
};
pub use thread::{LastMessage, ParticipantPair, Thread, ThreadSummary};
