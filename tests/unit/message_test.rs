//! Tests for messages and sender identity

use prometheus_workload::builders::OrchestratorBuilder;
use prometheus_workload::core::{Message, PostError, PAYLOAD_SIZE};

#[test]
fn test_message_is_fixed_size() {
    let msg = Message::from_bytes(b"hello");
    assert_eq!(msg.payload().len(), PAYLOAD_SIZE);
    assert_eq!(&msg.payload()[..5], b"hello");
    assert!(msg.origin().is_none());
}

#[test]
fn test_reply_reaches_live_origin() {
    let sender = OrchestratorBuilder::default();
    let msg = Message::from_bytes(&[1]).with_origin(sender.handle().downgrade());

    assert_eq!(msg.origin().unwrap().id(), sender.id());
    msg.reply(&Message::from_bytes(&[2])).unwrap();
    assert_eq!(sender.handle().pending_messages(), 1);
}

#[test]
fn test_origin_does_not_keep_sender_alive() {
    let sender = OrchestratorBuilder::default();
    let origin = sender.handle().downgrade();
    let id = sender.id();
    drop(sender);

    assert!(origin.upgrade().is_none());
    assert_eq!(origin.id(), id);
    assert_eq!(origin.post(&Message::new()), Err(PostError::Disconnected));
}

#[test]
fn test_origin_upgrade_shares_inbox() {
    let sender = OrchestratorBuilder::default();
    let handle = sender.handle().downgrade().upgrade().unwrap();
    handle.post(&Message::new()).unwrap();
    assert_eq!(sender.handle().pending_messages(), 1);
    assert_eq!(handle.name(), "orchestrator");
}
