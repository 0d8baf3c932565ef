//! # Frame Messaging
//!
//! Request/response messaging between an embedded frame and its parent window.
//! The frame posts an action request, the parent answers with a response
//! carrying the same `eventId`, and the frame's pending future settles.
//!
//! ## Components
//!
//! - **FrameChannel**: two broadcast directions standing in for `postMessage`
//! - **CorrelationRegistry**: pending requests keyed by id, with per-request timers
//! - **Messenger**: `send` plus the inbound listener feeding the registry
//! - **TypedSender**: an action bound to typed request and response data
//!
//! ## Request Flow
//!
//! ```text
//! ┌─────────┐  IFRAME_EVENT           ┌────────┐
//! │Messenger│────────────────────────▶│ Parent │
//! └────┬────┘                         └───┬────┘
//!      │                                  │
//!      │      IFRAME_EVENT_RESPONSE       │
//!      └◀─────────────────────────────────┘
//! ```
//!
//! 1. `send` generates an id, registers a pending entry and posts the request
//! 2. The inbound listener filters responses and forwards them to the registry
//! 3. The registry removes the entry and settles the caller's future
//!
//! ## Settlement
//!
//! Each pending request settles exactly once, by whichever comes first:
//!
//! ```text
//!            ┌──▶ response ──────▶ Ok(envelope)
//! pending ───┼──▶ timer fires ───▶ Err(Timeout)
//!            ├──▶ post failed ───▶ Err(SendFailed)
//!            └──▶ cancel ────────▶ Err(Cancelled)
//! ```
//!
//! A response with `success: false` still resolves `Ok`; the caller inspects
//! the envelope.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! # use std::{sync::Arc, time::Duration};
//! # use frame_messenger::{FrameChannel, Messenger};
//! # use serde_json::json;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let channel = Arc::new(FrameChannel::default());
//! let messenger = Messenger::with_defaults(channel.clone());
//!
//! let payload = json!({ "color": "#ff6b6b" }).as_object().cloned();
//! let response = messenger
//!     .send("generate_image", payload, Some(Duration::from_secs(10)))
//!     .await?;
//!
//! if response.success {
//!     println!("{:?}", response.data);
//! } else {
//!     println!("failed: {:?}", response.error);
//! }
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod envelope;
pub mod messenger;
pub mod registry;
pub mod typed;
