/// Wire-format checks for the public models.
use mentor_messaging_service::models::{
    DomainEvent, NotificationKind, NotificationType, ParticipantPair,
};
use mentor_messaging_service::websocket::ClientEvent;
use serde_json::json;
use uuid::Uuid;

#[test]
fn test_notification_type_serialization() {
    for notification_type in NotificationType::ALL {
        let json = serde_json::to_string(&notification_type).unwrap();
        assert_eq!(json, format!("\"{}\"", notification_type.as_str()));
        let parsed: NotificationType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, notification_type);
    }
}

#[test]
fn test_notification_event_names() {
    assert_eq!(
        NotificationType::ConnectionRequest.event_type(),
        "notification.connection_request"
    );
    assert_eq!(
        NotificationType::MentorApproval.event_type(),
        "notification.mentor_approval"
    );
}

#[test]
fn test_domain_event_wire_format() {
    let mentor_id = Uuid::new_v4();
    let request_id = Uuid::new_v4();
    let event: DomainEvent = serde_json::from_value(json!({
        "event": "connection_requested",
        "mentorId": mentor_id,
        "menteeName": "Sam",
        "requestId": request_id
    }))
    .unwrap();

    assert_eq!(event.recipient(), mentor_id);
    let new = event.into_notification(100);
    assert_eq!(new.kind, NotificationKind::ConnectionRequest { request_id });
    assert!(new.message.contains("Sam"));
}

#[test]
fn test_message_notification_preview_is_truncated() {
    let event = DomainEvent::MessageReceived {
        recipient_id: Uuid::new_v4(),
        sender_name: Some("Alice".into()),
        thread_id: Uuid::new_v4(),
        content: "x".repeat(500),
    };
    let new = event.into_notification(100);
    assert_eq!(new.title, "New message from Alice");
    assert_eq!(new.message.chars().count(), 100);
    assert!(new.message.ends_with("..."));
}

#[test]
fn test_unknown_domain_event_is_rejected() {
    let result = serde_json::from_value::<DomainEvent>(json!({
        "event": "post_liked",
        "userId": Uuid::new_v4()
    }));
    assert!(result.is_err());
}

#[test]
fn test_client_send_message_format() {
    let thread_id = Uuid::new_v4();
    let event: ClientEvent = serde_json::from_value(json!({
        "type": "send_message",
        "threadId": thread_id,
        "content": "hello",
        "clientMessageId": "tmp-9"
    }))
    .unwrap();

    match event {
        ClientEvent::SendMessage {
            thread_id: Some(id),
            client_message_id: Some(token),
            receiver_id: None,
            ..
        } => {
            assert_eq!(id, thread_id);
            assert_eq!(token, "tmp-9");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn test_participant_pair_is_canonical() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let pair = ParticipantPair::new(b, a).unwrap();
    assert!(pair.low() < pair.high());
    assert_eq!(pair.other(a), Some(b));
    assert!(ParticipantPair::new(a, a).is_err());
}
