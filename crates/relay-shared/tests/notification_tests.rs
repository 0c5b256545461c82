//! Tests for notification.rs

use relay_shared::notification::{truncate_body, MAX_BODY_CHARS};
use relay_shared::{BatchReport, ChatNotification, DeliveryFailure, DeliveryResult, RelayError};

fn chat(token: &str, text: &str) -> ChatNotification {
    ChatNotification {
        recipient_token: token.to_string(),
        sender_name: "Maria".to_string(),
        message_text: text.to_string(),
        chat_room_id: Some("room-7".to_string()),
        post_title: Some("Spare seedlings".to_string()),
    }
}

#[test]
fn test_short_body_untouched() {
    assert_eq!(truncate_body("See you at the garden", MAX_BODY_CHARS), "See you at the garden");
}

#[test]
fn test_exactly_limit_untouched() {
    let body = "a".repeat(MAX_BODY_CHARS);
    assert_eq!(truncate_body(&body, MAX_BODY_CHARS), body);
}

#[test]
fn test_long_body_truncated_with_ellipsis() {
    let body = "b".repeat(150);
    let out = truncate_body(&body, MAX_BODY_CHARS);
    assert_eq!(out.chars().count(), MAX_BODY_CHARS);
    assert!(out.ends_with("..."));
    assert!(out.starts_with("bbb"));
}

#[test]
fn test_truncation_respects_char_boundaries() {
    let body = "ñ".repeat(120);
    let out = truncate_body(&body, MAX_BODY_CHARS);
    assert_eq!(out.chars().count(), MAX_BODY_CHARS);
}

#[test]
fn test_push_message_payload() {
    let msg = chat(" tok-1 ", "Hello").to_push_message(MAX_BODY_CHARS);
    assert_eq!(msg.token, "tok-1");
    assert_eq!(msg.title, "Maria");
    assert_eq!(msg.body, "Hello");
    assert_eq!(msg.data.get("type").map(String::as_str), Some("chat_message"));
    assert_eq!(msg.data.get("chatRoomId").map(String::as_str), Some("room-7"));
    assert_eq!(msg.data.get("postTitle").map(String::as_str), Some("Spare seedlings"));
}

#[test]
fn test_missing_sender_gets_generic_title() {
    let mut n = chat("tok", "Hi");
    n.sender_name = String::new();
    n.chat_room_id = None;
    let msg = n.to_push_message(MAX_BODY_CHARS);
    assert_eq!(msg.title, "New message");
    assert!(!msg.data.contains_key("chatRoomId"));
}

#[test]
fn test_validation_requires_token_and_text() {
    let err = chat("", "Hi").validate().unwrap_err();
    assert!(matches!(err, RelayError::Validation { ref field, .. } if field == "recipientToken"));

    let err = chat("tok", "  ").validate().unwrap_err();
    assert!(matches!(err, RelayError::Validation { ref field, .. } if field == "messageText"));

    assert!(chat("tok", "Hi").validate().is_ok());
}

#[test]
fn test_batch_report_counts() {
    let invalid = DeliveryFailure::InvalidToken("unregistered".to_string());
    let report = BatchReport::from_results(vec![
        DeliveryResult::delivered("a", "projects/p/messages/1".to_string()),
        DeliveryResult::failed("b", &invalid),
        DeliveryResult::delivered("c", "projects/p/messages/2".to_string()),
    ]);
    assert_eq!(report.success_count, 2);
    assert_eq!(report.failure_count, 1);
    assert_eq!(report.responses.len(), 3);
    assert_eq!(report.responses[1].code.as_deref(), Some("invalid_token"));
}

#[test]
fn test_failure_codes_distinct() {
    let invalid = DeliveryFailure::InvalidToken("x".into());
    let other = DeliveryFailure::DeliveryError("x".into());
    assert_ne!(invalid.code(), other.code());
    assert!(matches!(RelayError::from(invalid.clone()), RelayError::InvalidToken(_)));
    assert!(matches!(RelayError::from(other.clone()), RelayError::Delivery(_)));
    // single sends report the same code as batch items
    assert_eq!(RelayError::from(other.clone()).code(), other.code());
    assert_eq!(RelayError::from(invalid.clone()).code(), invalid.code());
}
