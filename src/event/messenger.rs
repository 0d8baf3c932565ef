//! # Messenger
//!
//! Public face of the request/response layer. A [`Messenger`] owns a
//! [`CorrelationRegistry`], a transport, and one inbound listener task that
//! lives exactly as long as the messenger.
//!
//! ```text
//! send() ──▶ register ──▶ post ──▶ [transport] ──▶ parent
//!                                                    │
//! PendingResponse ◀── resolve ◀── listener ◀─────────┘
//! ```
//!
//! `send` registers and posts eagerly; the returned [`PendingResponse`] only
//! waits for the outcome. Dropping the messenger cancels everything still
//! pending and detaches the listener.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use serde_json::{Map, Value};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, instrument, trace, warn};

use crate::{
    config::MessengerConfig,
    event::{
        channel::{MessageReceiver, MessageTransport, ReceiveError},
        envelope::{RequestEnvelope, RequestId, ResponseEnvelope},
        registry::{CorrelationRegistry, Reply},
    },
    MessengerError, MessengerResult,
};

/// Future returned by [`Messenger::send`].
///
/// Resolves with the response envelope (successful or not) or rejects with a
/// transport-level [`MessengerError`].
#[must_use = "the response is lost unless the future is awaited"]
pub struct PendingResponse {
    request_id: RequestId,
    receiver: oneshot::Receiver<Reply>,
}

impl PendingResponse {
    fn new(request_id: RequestId, receiver: oneshot::Receiver<Reply>) -> Self {
        Self {
            request_id,
            receiver,
        }
    }

    fn failed(request_id: RequestId, error: MessengerError) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(Err(error));
        Self::new(request_id, receiver)
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

impl Future for PendingResponse {
    type Output = MessengerResult<ResponseEnvelope>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(reply)) => Poll::Ready(reply),
            Poll::Ready(Err(_)) => Poll::Ready(Err(MessengerError::ChannelClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct Messenger<T> {
    transport: Arc<T>,
    registry: CorrelationRegistry,
    default_timeout: Duration,
    cancel_reason: String,
    listener: JoinHandle<()>,
}

impl<T: MessageTransport + 'static> Messenger<T> {
    /// Creates a messenger and subscribes its inbound listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(transport: Arc<T>, config: &MessengerConfig) -> Self {
        let registry = CorrelationRegistry::new();
        let listener = spawn_listener(transport.subscribe(), registry.clone());
        Self {
            transport,
            registry,
            default_timeout: config.default_timeout,
            cancel_reason: config.cancel_reason.clone(),
            listener,
        }
    }

    pub fn with_defaults(transport: Arc<T>) -> Self {
        Self::new(transport, &MessengerConfig::default())
    }

    /// Sends `action` to the parent and returns a future for its response.
    ///
    /// The request is registered and posted before this returns. A `None` or
    /// zero `timeout` falls back to the configured default. If posting fails
    /// the request is torn down at once and the future rejects with the
    /// transmission error.
    #[instrument(skip(self, payload))]
    pub fn send(
        &self,
        action: &str,
        payload: Option<Map<String, Value>>,
        timeout: Option<Duration>,
    ) -> PendingResponse {
        let request_id = RequestId::generate();
        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(self.default_timeout);

        let receiver = match self.registry.register(request_id.clone(), action, timeout) {
            Ok(receiver) => receiver,
            Err(e) => return PendingResponse::failed(request_id, e),
        };

        let request = RequestEnvelope::new(action, request_id.clone(), payload);
        match request
            .to_message()
            .and_then(|message| self.transport.post(message))
        {
            Ok(()) => debug!(request_id = %request_id, action, "Sent request to parent"),
            Err(e) => {
                warn!(request_id = %request_id, action, "Failed to send request: {}", e);
                self.registry.reject(&request_id, e);
            }
        }

        PendingResponse::new(request_id, receiver)
    }

    /// Feeds one inbound message through the response filter.
    ///
    /// Returns `true` when it settled a pending request.
    pub fn handle_message(&self, message: &Value) -> bool {
        dispatch(&self.registry, message)
    }

    /// Cancels one request. `false` if it already settled.
    pub fn cancel(&self, request_id: &RequestId) -> bool {
        self.registry.cancel(request_id, &self.cancel_reason)
    }

    pub fn cancel_all(&self) -> usize {
        self.registry.cancel_all(&self.cancel_reason)
    }

    pub fn is_loading(&self) -> bool {
        self.registry.is_loading()
    }

    pub fn pending_count(&self) -> usize {
        self.registry.count()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.registry.contains(request_id)
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.registry.subscribe_loading()
    }

    /// Cancels all pending requests and detaches the listener.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<T> Drop for Messenger<T> {
    fn drop(&mut self) {
        self.listener.abort();
        let cancelled = self.registry.cancel_all(&self.cancel_reason);
        debug!(cancelled, "Messenger torn down");
    }
}

fn dispatch(registry: &CorrelationRegistry, message: &Value) -> bool {
    match ResponseEnvelope::from_message(message) {
        Some(envelope) => registry.resolve(envelope),
        None => {
            trace!("Ignoring inbound message that is not a response");
            false
        }
    }
}

fn spawn_listener(mut receiver: MessageReceiver, registry: CorrelationRegistry) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(message) => {
                    dispatch(&registry, &message);
                }
                Err(ReceiveError::Lagged { count }) => {
                    warn!(count, "Inbound listener lagged, responses may have been skipped");
                }
                Err(ReceiveError::Closed) => {
                    debug!("Inbound channel closed, listener stopped");
                    break;
                }
            }
        }
    })
}
