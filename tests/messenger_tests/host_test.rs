use std::{sync::Arc, time::Duration};

use frame_messenger::{
    config::DemoConfig,
    host::{ImageGenerator, GENERATE_IMAGE},
    FrameChannel, FrameHost, Messenger, MessengerError, RequestEnvelope, TypedSender,
};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;

use super::color_payload;

#[derive(Serialize)]
struct GenerateImage {
    color: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedImage {
    image_url: String,
    color: String,
    width: u32,
    height: u32,
    generated_at: String,
}

fn start_host(channel: &Arc<FrameChannel>) -> tokio::task::JoinHandle<()> {
    FrameHost::new(channel.clone())
        .handler(GENERATE_IMAGE, ImageGenerator::new(DemoConfig::default()))
        .handler("echo", |request: &RequestEnvelope| {
            Ok::<_, String>(Value::Object(request.payload.clone()))
        })
        .spawn()
}

#[tokio::test(start_paused = true)]
async fn test_host_round_trip() {
    let channel = Arc::new(FrameChannel::new(16));
    let host = start_host(&channel);
    let messenger = Messenger::with_defaults(channel.clone());
    let start = Instant::now();

    let response = messenger
        .send(GENERATE_IMAGE, color_payload("#FF6B6B"), None)
        .await
        .unwrap();

    assert!(response.success);
    let data = response.data.unwrap();
    assert_eq!(
        data["imageUrl"],
        json!("https://placehold.co/512x512/ff6b6b/ffffff.png")
    );
    // simulated host latency
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert!(!messenger.is_loading());

    host.abort();
}

#[tokio::test(start_paused = true)]
async fn test_host_typed_round_trip() {
    let channel = Arc::new(FrameChannel::new(16));
    let host = start_host(&channel);
    let messenger = Messenger::with_defaults(channel.clone());
    let generate = TypedSender::<GenerateImage, GeneratedImage>::new(GENERATE_IMAGE);

    let response = generate
        .send(
            &messenger,
            &GenerateImage {
                color: "#00ff00".to_string(),
            },
            Some(Duration::from_secs(10)),
        )
        .await
        .unwrap();

    let image = response.data.unwrap();
    assert_eq!(image.color, "#00ff00");
    assert_eq!((image.width, image.height), (512, 512));
    assert!(image.image_url.ends_with("/00ff00/ffffff.png"));
    assert!(image.generated_at.ends_with('Z'));

    host.abort();
}

#[tokio::test(start_paused = true)]
async fn test_host_failures_resolve_as_envelopes() {
    let channel = Arc::new(FrameChannel::new(16));
    let host = start_host(&channel);
    let messenger = Messenger::with_defaults(channel.clone());

    let invalid = messenger
        .send(GENERATE_IMAGE, color_payload("chartreuse"), None)
        .await
        .unwrap();
    assert!(!invalid.success);
    assert_eq!(invalid.error.as_deref(), Some("invalid color: chartreuse"));

    let unsupported = messenger.send("teleport", None, None).await.unwrap();
    assert!(!unsupported.success);
    assert_eq!(
        unsupported.error.as_deref(),
        Some("unsupported action: teleport")
    );

    host.abort();
}

#[tokio::test(start_paused = true)]
async fn test_host_answers_concurrent_requests() {
    let channel = Arc::new(FrameChannel::new(16));
    let host = start_host(&channel);
    let messenger = Messenger::with_defaults(channel.clone());

    let slow = messenger.send(GENERATE_IMAGE, color_payload("#123456"), None);
    let fast = messenger.send("echo", color_payload("#abcdef"), None);
    assert_eq!(messenger.pending_count(), 2);

    let (slow, fast) = tokio::join!(slow, fast);
    assert_eq!(fast.unwrap().data.unwrap()["color"], json!("#abcdef"));
    assert_eq!(slow.unwrap().data.unwrap()["color"], json!("#123456"));
    assert_eq!(messenger.pending_count(), 0);

    host.abort();
}

#[tokio::test(start_paused = true)]
async fn test_silent_host_times_out() {
    let channel = Arc::new(FrameChannel::new(16));
    let messenger = Messenger::with_defaults(channel.clone());

    let result = messenger
        .send(GENERATE_IMAGE, color_payload("#ff6b6b"), None)
        .await;

    assert!(matches!(
        result,
        Err(MessengerError::Timeout {
            timeout_ms: 5000,
            ..
        })
    ));
}
