//! Wire events for the real-time channel.
//!
//! Server events are flat JSON objects with a `type` field:
//! ```json
//! { "type": "new_message", "id": "...", "threadId": "...", "senderId": "...",
//!   "content": "hi", "createdAt": "...", "sequenceNumber": 1 }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::models::{Message, Notification};

/// Server -> client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Sent once, right after the channel opens
    Connected { connection_id: Uuid, user_id: Uuid },

    /// A message was committed to a thread the user participates in
    NewMessage {
        message: Message,
        /// Echo of the sender's correlation token; only on the sender's copy
        client_message_id: Option<String>,
    },

    /// `reader_id` read the thread
    MessageRead { thread_id: Uuid, reader_id: Uuid },

    /// A notification was raised for the user
    Notification(Notification),

    /// A send from this connection was not persisted
    SendFailed {
        client_message_id: Option<String>,
        thread_id: Option<Uuid>,
        error: String,
        retryable: bool,
    },

    Error { code: String, message: String },

    Pong,
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::NewMessage { .. } => "new_message",
            Self::MessageRead { .. } => "message_read",
            Self::Notification(n) => n.notification_type().event_type(),
            Self::SendFailed { .. } => "send_failed",
            Self::Error { .. } => "error",
            Self::Pong => "pong",
        }
    }

    /// Flat JSON object: `type` plus the event's own fields.
    pub fn to_payload_value(&self) -> Result<Value, serde_json::Error> {
        let body = match self {
            Self::Connected {
                connection_id,
                user_id,
            } => json!({ "connectionId": connection_id, "userId": user_id }),
            Self::NewMessage {
                message,
                client_message_id,
            } => {
                let mut value = serde_json::to_value(message)?;
                if let (Some(token), Value::Object(map)) = (client_message_id, &mut value) {
                    map.insert("clientMessageId".to_string(), json!(token));
                }
                value
            }
            Self::MessageRead {
                thread_id,
                reader_id,
            } => json!({ "threadId": thread_id, "readerId": reader_id }),
            Self::Notification(notification) => serde_json::to_value(notification)?,
            Self::SendFailed {
                client_message_id,
                thread_id,
                error,
                retryable,
            } => json!({
                "clientMessageId": client_message_id,
                "threadId": thread_id,
                "error": error,
                "retryable": retryable,
            }),
            Self::Error { code, message } => json!({ "code": code, "message": message }),
            Self::Pong => Value::Object(Map::new()),
        };

        let mut payload = Map::new();
        if let Value::Object(fields) = body {
            payload.extend(fields);
        }
        // Notification bodies carry their own `type` tag; the event name wins
        // and the tag moves to `notificationType`.
        if let Some(tag) = payload.remove("type") {
            payload.insert("notificationType".to_string(), tag);
        }
        payload.insert("type".to_string(), json!(self.event_type()));
        Ok(Value::Object(payload))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_payload_value()?)
    }
}

/// Client -> server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// `thread_id` may be omitted on first contact; the thread is then
    /// resolved from the sender and `receiver_id`.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        #[serde(default)]
        thread_id: Option<Uuid>,
        content: String,
        #[serde(default)]
        receiver_id: Option<Uuid>,
        #[serde(default)]
        client_message_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MarkRead { thread_id: Uuid },
    Ping,
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationKind;
    use chrono::Utc;

    fn message() -> Message {
        Message {
            id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "hi".into(),
            sequence_number: 1,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn new_message_payload_is_flat() {
        let msg = message();
        let value = ServerEvent::NewMessage {
            message: msg.clone(),
            client_message_id: None,
        }
        .to_payload_value()
        .unwrap();

        assert_eq!(value["type"], "new_message");
        assert_eq!(value["id"], msg.id.to_string());
        assert_eq!(value["threadId"], msg.thread_id.to_string());
        assert_eq!(value["senderId"], msg.sender_id.to_string());
        assert_eq!(value["content"], "hi");
        assert!(value.get("createdAt").is_some());
        assert!(value.get("clientMessageId").is_none());
    }

    #[test]
    fn sender_copy_echoes_correlation_token() {
        let value = ServerEvent::NewMessage {
            message: message(),
            client_message_id: Some("tmp-42".into()),
        }
        .to_payload_value()
        .unwrap();
        assert_eq!(value["clientMessageId"], "tmp-42");
    }

    #[test]
    fn notification_event_type_mirrors_tag() {
        let session_id = Uuid::new_v4();
        let event = ServerEvent::Notification(Notification {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: NotificationKind::Session { session_id },
            title: "Session cancelled".into(),
            message: "cancelled".into(),
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        });

        assert_eq!(event.event_type(), "notification.session");
        let value = event.to_payload_value().unwrap();
        assert_eq!(value["type"], "notification.session");
        assert_eq!(value["notificationType"], "SESSION");
        assert_eq!(value["sessionId"], session_id.to_string());
    }

    #[test]
    fn message_read_payload() {
        let thread_id = Uuid::new_v4();
        let reader_id = Uuid::new_v4();
        let json = ServerEvent::MessageRead {
            thread_id,
            reader_id,
        }
        .to_json()
        .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "message_read");
        assert_eq!(value["threadId"], thread_id.to_string());
    }

    #[test]
    fn parses_send_message_without_thread() {
        let receiver = Uuid::new_v4();
        let text = format!(
            r#"{{"type":"send_message","content":"hello","receiverId":"{receiver}"}}"#
        );
        let event = ClientEvent::from_json(&text).unwrap();
        assert_eq!(
            event,
            ClientEvent::SendMessage {
                thread_id: None,
                content: "hello".into(),
                receiver_id: Some(receiver),
                client_message_id: None,
            }
        );
    }

    #[test]
    fn parses_mark_read_and_ping() {
        let thread_id = Uuid::new_v4();
        let event =
            ClientEvent::from_json(&format!(r#"{{"type":"mark_read","threadId":"{thread_id}"}}"#))
                .unwrap();
        assert_eq!(event, ClientEvent::MarkRead { thread_id });
        assert_eq!(
            ClientEvent::from_json(r#"{"type":"ping"}"#).unwrap(),
            ClientEvent::Ping
        );
    }

    #[test]
    fn rejects_unknown_event() {
        assert!(ClientEvent::from_json(r#"{"type":"typing"}"#).is_err());
    }
}
