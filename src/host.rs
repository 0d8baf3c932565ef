//! # Frame Host
//!
//! The parent side of the exchange. A [`FrameHost`] listens for requests
//! posted by the frame, runs the handler registered for the action and posts
//! back a response echoing the request's `eventId`.
//!
//! Handler outcomes map onto the wire as follows:
//!
//! - `Ok(data)` → `{ success: true, data }`
//! - `Err(text)` → `{ success: false, error: text }`
//! - no handler → `{ success: false, error: "unsupported action: <action>" }`

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::{
    config::DemoConfig,
    event::{
        channel::{FrameChannel, ReceiveError},
        envelope::{RequestEnvelope, ResponseEnvelope},
    },
    timestamp::Timestamp,
};

pub const GENERATE_IMAGE: &str = "generate_image";

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, request: &RequestEnvelope) -> Result<Value, String>;
}

#[async_trait]
impl<F> ActionHandler for F
where
    F: Fn(&RequestEnvelope) -> Result<Value, String> + Send + Sync,
{
    async fn handle(&self, request: &RequestEnvelope) -> Result<Value, String> {
        (self)(request)
    }
}

pub struct FrameHost {
    channel: Arc<FrameChannel>,
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl FrameHost {
    pub fn new(channel: Arc<FrameChannel>) -> Self {
        Self {
            channel,
            handlers: HashMap::new(),
        }
    }

    pub fn handler(mut self, action: &str, handler: impl ActionHandler + 'static) -> Self {
        self.handlers.insert(action.to_string(), Arc::new(handler));
        self
    }

    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    /// Computes the response for one request without posting it.
    pub async fn respond(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        let id = request.event_id.clone();
        let Some(handler) = self.handlers.get(&request.action) else {
            debug!(request_id = %id, action = %request.action, "No handler for action");
            return ResponseEnvelope::failure(
                id,
                Some(format!("unsupported action: {}", request.action)),
            );
        };

        match handler.handle(request).await {
            Ok(data) => ResponseEnvelope::success(id, Some(data)),
            Err(error) => ResponseEnvelope::failure(id, Some(error)),
        }
    }

    /// Starts serving. The subscription is taken before this returns, so no
    /// request posted afterwards is missed. Each request runs in its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut receiver = self.channel.subscribe_parent();
        let host = Arc::new(self);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        let Some(request) = RequestEnvelope::from_message(&message) else {
                            trace!("Host ignoring message that is not a request");
                            continue;
                        };
                        let host = host.clone();
                        tokio::spawn(async move { host.serve(request).await });
                    }
                    Err(ReceiveError::Lagged { count }) => {
                        warn!(count, "Host lagged, requests may have been skipped");
                    }
                    Err(ReceiveError::Closed) => break,
                }
            }
        })
    }

    async fn serve(&self, request: RequestEnvelope) {
        debug!(request_id = %request.event_id, action = %request.action, "Host received request");
        let response = self.respond(&request).await;
        if let Err(e) = self.channel.post_to_frame(response.to_message()) {
            warn!(request_id = %request.event_id, "Host failed to post response: {}", e);
        }
    }
}

/// Answers `generate_image` with a placeholder image URL for the requested color.
pub struct ImageGenerator {
    config: DemoConfig,
}

impl ImageGenerator {
    pub fn new(config: DemoConfig) -> Self {
        Self { config }
    }

    pub fn image_url(&self, hex: &str) -> String {
        format!(
            "{}/{}x{}/{}/ffffff.png",
            self.config.image_base_url.trim_end_matches('/'),
            self.config.image_width,
            self.config.image_height,
            hex
        )
    }

    fn delay(&self) -> Duration {
        self.config.host_delay
    }
}

#[async_trait]
impl ActionHandler for ImageGenerator {
    async fn handle(&self, request: &RequestEnvelope) -> Result<Value, String> {
        let color = request
            .payload
            .get("color")
            .and_then(Value::as_str)
            .ok_or_else(|| "color is required".to_string())?;
        let hex = parse_hex_color(color).ok_or_else(|| format!("invalid color: {}", color))?;

        if !self.delay().is_zero() {
            tokio::time::sleep(self.delay()).await;
        }

        Ok(json!({
            "imageUrl": self.image_url(&hex),
            "color": color,
            "width": self.config.image_width,
            "height": self.config.image_height,
            "generatedAt": Timestamp::now(),
        }))
    }
}

/// `#rrggbb` or `#rgb` (leading `#` optional) to lowercase hex digits.
fn parse_hex_color(color: &str) -> Option<String> {
    let digits = color.strip_prefix('#').unwrap_or(color);
    let valid = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
    valid.then(|| digits.to_ascii_lowercase())
}
