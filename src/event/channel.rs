//! # Frame Channel
//!
//! In-process stand-in for the `postMessage` medium between an embedded frame
//! and its parent window. Each direction is a Tokio broadcast channel so any
//! number of listeners can observe the traffic, just like window `message`
//! event listeners.
//!
//! ```text
//!            post_to_parent                subscribe_parent
//! ┌───────┐ ───────────────▶ [ to_parent ] ───────────────▶ ┌────────┐
//! │ frame │                                                 │ parent │
//! └───────┘ ◀─────────────── [ to_frame  ] ◀─────────────── └────────┘
//!            subscribe_frame                post_to_frame
//! ```
//!
//! Posting never fails for lack of listeners; it fails only once the channel
//! has been closed.

use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::{MessengerError, MessengerResult};

/// The medium the messenger transmits over and listens on.
#[cfg_attr(test, mockall::automock)]
pub trait MessageTransport: Send + Sync {
    /// Posts a message outward. An `Err` here is a synchronous transmission failure.
    fn post(&self, message: Value) -> MessengerResult<()>;

    /// Opens a subscription to inbound messages.
    fn subscribe(&self) -> MessageReceiver;
}

pub struct FrameChannel {
    to_parent: broadcast::Sender<Value>,
    to_frame: broadcast::Sender<Value>,
    capacity: usize,
    closed: AtomicBool,
    /// Keeps the broadcast channels open while nobody listens
    _internal_parent_receiver: broadcast::Receiver<Value>,
    _internal_frame_receiver: broadcast::Receiver<Value>,
}

impl FrameChannel {
    pub fn new(capacity: usize) -> Self {
        let (to_parent, parent_receiver) = broadcast::channel(capacity);
        let (to_frame, frame_receiver) = broadcast::channel(capacity);
        Self {
            to_parent,
            to_frame,
            capacity,
            closed: AtomicBool::new(false),
            _internal_parent_receiver: parent_receiver,
            _internal_frame_receiver: frame_receiver,
        }
    }

    /// Frame → parent.
    pub fn post_to_parent(&self, message: Value) -> MessengerResult<()> {
        self.send(&self.to_parent, "parent", message)
    }

    /// Parent → frame.
    pub fn post_to_frame(&self, message: Value) -> MessengerResult<()> {
        self.send(&self.to_frame, "frame", message)
    }

    /// Messages posted by the frame, as heard by the parent.
    pub fn subscribe_parent(&self) -> MessageReceiver {
        MessageReceiver::new(self.to_parent.subscribe())
    }

    /// Messages posted by the parent, as heard by the frame.
    pub fn subscribe_frame(&self) -> MessageReceiver {
        MessageReceiver::new(self.to_frame.subscribe())
    }

    /// Makes every subsequent post fail. Existing subscribers stay attached.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Frame channel closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn parent_listeners(&self) -> usize {
        // minus the internal keep-alive receiver
        self.to_parent.receiver_count().saturating_sub(1)
    }

    pub fn frame_listeners(&self) -> usize {
        self.to_frame.receiver_count().saturating_sub(1)
    }

    fn send(
        &self,
        sender: &broadcast::Sender<Value>,
        target: &str,
        message: Value,
    ) -> MessengerResult<()> {
        if self.is_closed() {
            return Err(MessengerError::send_failed(format!(
                "channel to {} is closed",
                target
            )));
        }
        trace!(target_window = target, "Posting message: {}", message);
        sender
            .send(message)
            .map_err(|e| MessengerError::send_failed(e.to_string()))?;
        Ok(())
    }
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new(64)
    }
}

/// The frame's view of the channel.
impl MessageTransport for FrameChannel {
    fn post(&self, message: Value) -> MessengerResult<()> {
        self.post_to_parent(message)
    }

    fn subscribe(&self) -> MessageReceiver {
        self.subscribe_frame()
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ReceiveError {
    #[error("Receiver lagged: {count} messages skipped")]
    Lagged { count: u64 },

    #[error("Channel closed")]
    Closed,
}

pub struct MessageReceiver {
    receiver: broadcast::Receiver<Value>,
}

impl MessageReceiver {
    pub fn new(receiver: broadcast::Receiver<Value>) -> Self {
        Self { receiver }
    }

    /// Receives the next message. A lag is reported once and the receiver
    /// continues from the oldest message still buffered; callers may simply
    /// keep receiving.
    pub async fn recv(&mut self) -> Result<Value, ReceiveError> {
        match self.receiver.recv().await {
            Ok(message) => Ok(message),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(ReceiveError::Lagged { count: n }),
            Err(broadcast::error::RecvError::Closed) => Err(ReceiveError::Closed),
        }
    }

    pub fn try_recv(&mut self) -> Option<Value> {
        self.receiver.try_recv().ok()
    }
}
