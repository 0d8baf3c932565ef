use std::{sync::Arc, time::Duration};

use frame_messenger::{
    FrameChannel, Messenger, MessengerConfig, MessengerError, RequestId, ResponseEnvelope,
    RESPONSE_TYPE,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::time::Instant;

use super::{color_payload, next_request_id, setup};

const TEN_SECONDS: Duration = Duration::from_millis(10000);

#[tokio::test(start_paused = true)]
async fn test_generate_image_success() {
    let (channel, mut parent_rx, messenger) = setup();

    let pending = messenger.send("generate_image", color_payload("#ff6b6b"), Some(TEN_SECONDS));
    let id = next_request_id(&mut parent_rx).await;
    assert_eq!(id, pending.request_id().as_str());

    channel
        .post_to_frame(json!({
            "type": RESPONSE_TYPE,
            "eventId": id,
            "success": true,
            "data": { "imageUrl": "https://x/y.png" }
        }))
        .unwrap();

    let response = pending.await.unwrap();
    assert_eq!(
        response,
        ResponseEnvelope::success(
            RequestId::from(id),
            Some(json!({ "imageUrl": "https://x/y.png" }))
        )
    );
    assert_eq!(messenger.pending_count(), 0);
    assert!(!messenger.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_generate_image_denied() {
    let (channel, mut parent_rx, messenger) = setup();

    let pending = messenger.send("generate_image", color_payload("#ff6b6b"), Some(TEN_SECONDS));
    let id = next_request_id(&mut parent_rx).await;

    channel
        .post_to_frame(json!({
            "type": RESPONSE_TYPE,
            "eventId": id,
            "success": false,
            "error": "denied"
        }))
        .unwrap();

    let response = pending.await.unwrap();
    assert!(!response.success);
    assert_eq!(response.data, None);
    assert_eq!(response.error.as_deref(), Some("denied"));
    assert!(!messenger.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_generate_image_times_out() {
    let (_channel, _parent_rx, messenger) = setup();
    let start = Instant::now();

    let result = messenger
        .send("generate_image", color_payload("#ff6b6b"), Some(TEN_SECONDS))
        .await;

    match result {
        Err(MessengerError::Timeout { action, timeout_ms }) => {
            assert_eq!(action, "generate_image");
            assert_eq!(timeout_ms, 10000);
        }
        other => panic!("Expected timeout, got {:?}", other),
    }
    assert!(start.elapsed() >= TEN_SECONDS);
    assert_eq!(messenger.pending_count(), 0);
    assert!(!messenger.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_response_after_timeout_is_ignored() {
    let (channel, mut parent_rx, messenger) = setup();

    let pending = messenger.send("slow", None, Some(Duration::from_millis(100)));
    let id = next_request_id(&mut parent_rx).await;
    assert!(matches!(pending.await, Err(MessengerError::Timeout { .. })));

    let late = json!({ "type": RESPONSE_TYPE, "eventId": id, "success": true });
    assert!(!messenger.handle_message(&late));
    channel.post_to_frame(late).unwrap();
    assert_eq!(messenger.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_independent() {
    let (channel, mut parent_rx, messenger) = setup();

    let first = messenger.send("generate_image", color_payload("#000000"), None);
    let second = messenger.send("generate_image", color_payload("#ffffff"), None);
    assert_ne!(first.request_id(), second.request_id());
    assert_eq!(messenger.pending_count(), 2);

    let first_id = next_request_id(&mut parent_rx).await;
    let second_id = next_request_id(&mut parent_rx).await;
    assert_eq!(first_id, first.request_id().as_str());
    assert_eq!(second_id, second.request_id().as_str());

    channel
        .post_to_frame(json!({ "type": RESPONSE_TYPE, "eventId": second_id, "success": true }))
        .unwrap();

    let response = second.await.unwrap();
    assert_eq!(response.event_id.as_str(), second_id);
    assert_eq!(messenger.pending_count(), 1);
    assert!(messenger.is_pending(first.request_id()));
    assert!(messenger.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_rejects_everything() {
    let (_channel, _parent_rx, messenger) = setup();

    let pending: Vec<_> = (0..3)
        .map(|i| messenger.send(&format!("action_{}", i), None, None))
        .collect();
    assert_eq!(messenger.pending_count(), 3);

    assert_eq!(messenger.cancel_all(), 3);
    assert_eq!(messenger.pending_count(), 0);
    assert!(!messenger.is_loading());

    for request in pending {
        match request.await {
            Err(MessengerError::Cancelled { reason }) => assert_eq!(reason, "cancelled"),
            other => panic!("Expected cancellation, got {:?}", other),
        }
    }
    assert_eq!(messenger.cancel_all(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unmatched_and_malformed_messages_are_ignored() {
    let (channel, mut parent_rx, messenger) = setup();

    let pending = messenger.send("generate_image", None, None);
    let id = next_request_id(&mut parent_rx).await;

    for noise in [
        json!("not an object"),
        json!({ "type": "IFRAME_EVENT", "eventId": id }),
        json!({ "type": RESPONSE_TYPE, "success": true }),
        json!({ "type": RESPONSE_TYPE, "eventId": "no-such-request", "success": true }),
    ] {
        channel.post_to_frame(noise).unwrap();
    }
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    assert_eq!(messenger.pending_count(), 1);

    // the listener is still alive after the noise
    channel
        .post_to_frame(json!({ "type": RESPONSE_TYPE, "eventId": id, "success": true }))
        .unwrap();
    assert!(pending.await.unwrap().success);
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_rejects_immediately() {
    let (channel, _parent_rx, messenger) = setup();
    channel.close();
    let start = Instant::now();

    let result = messenger
        .send("generate_image", color_payload("#ff6b6b"), Some(TEN_SECONDS))
        .await;

    assert!(matches!(result, Err(MessengerError::SendFailed { .. })));
    assert!(start.elapsed() < TEN_SECONDS);
    assert_eq!(messenger.pending_count(), 0);
    assert!(!messenger.is_loading());
}

#[tokio::test(start_paused = true)]
async fn test_loading_transitions() {
    let (channel, mut parent_rx, messenger) = setup();
    let mut loading = messenger.loading();
    assert!(!*loading.borrow_and_update());

    let pending = messenger.send("generate_image", None, None);
    loading.changed().await.unwrap();
    assert!(*loading.borrow_and_update());

    let id = next_request_id(&mut parent_rx).await;
    channel
        .post_to_frame(json!({ "type": RESPONSE_TYPE, "eventId": id, "success": true }))
        .unwrap();
    pending.await.unwrap();

    loading.changed().await.unwrap();
    assert!(!*loading.borrow_and_update());
}

#[tokio::test(start_paused = true)]
async fn test_configured_defaults_apply() {
    let config = MessengerConfig::from_str(
        r#"{ "default_timeout": 2000, "cancel_reason": "frame unloaded" }"#,
    )
    .unwrap();
    let channel = Arc::new(FrameChannel::new(config.channel_capacity));
    let messenger = Messenger::new(channel, &config);

    let timed_out = messenger.send("a", None, None).await;
    assert!(matches!(
        timed_out,
        Err(MessengerError::Timeout {
            timeout_ms: 2000,
            ..
        })
    ));

    let cancelled = messenger.send("b", None, None);
    messenger.cancel_all();
    assert!(matches!(
        cancelled.await,
        Err(MessengerError::Cancelled { reason }) if reason == "frame unloaded"
    ));
}
