//! # Correlation Registry
//!
//! Tracks every request that has been sent but not yet settled. Each entry
//! owns the oneshot sender that completes the caller's future and the timer
//! task that expires it.
//!
//! ## Settlement
//!
//! An entry can be settled by a matching response, its timeout, a cancel or a
//! transmission failure. Whoever removes the entry from the map first settles
//! it; every later attempt finds nothing and is a no-op. Removal and delivery
//! happen in the same call, so a settled entry is never observable.
//!
//! ```text
//! register ──▶ [pending] ──┬── resolve ──────▶ Ok(envelope)
//!                          ├── timer fires ──▶ Err(Timeout)
//!                          ├── cancel ───────▶ Err(Cancelled)
//!                          └── reject ───────▶ Err(SendFailed)
//! ```
//!
//! ## Loading state
//!
//! The loading flag is `true` exactly while at least one entry is pending and
//! is published through a watch channel on every transition.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, trace, warn};

use crate::{
    event::envelope::{RequestId, ResponseEnvelope},
    MessengerError, MessengerResult,
};

/// What a caller's future eventually yields.
pub type Reply = MessengerResult<ResponseEnvelope>;

struct PendingRequest {
    action: String,
    sender: oneshot::Sender<Reply>,
    timer: JoinHandle<()>,
    created_at: Instant,
}

struct RegistryInner {
    pending: DashMap<RequestId, PendingRequest>,
    loading: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct CorrelationRegistry {
    inner: Arc<RegistryInner>,
}

impl CorrelationRegistry {
    pub fn new() -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            inner: Arc::new(RegistryInner {
                pending: DashMap::new(),
                loading,
            }),
        }
    }

    /// Registers a pending request and starts its timeout.
    ///
    /// Must be called from within a Tokio runtime. A duplicate `id` is
    /// rejected and the live entry is left untouched.
    pub fn register(
        &self,
        id: RequestId,
        action: &str,
        timeout: Duration,
    ) -> MessengerResult<oneshot::Receiver<Reply>> {
        let (sender, receiver) = oneshot::channel();

        match self.inner.pending.entry(id.clone()) {
            Entry::Occupied(_) => {
                warn!(request_id = %id, action, "Rejecting duplicate request id");
                return Err(MessengerError::DuplicateRequestId(id));
            }
            Entry::Vacant(slot) => {
                let timer = spawn_timer(
                    Arc::downgrade(&self.inner),
                    id.clone(),
                    action.to_string(),
                    timeout,
                );
                slot.insert(PendingRequest {
                    action: action.to_string(),
                    sender,
                    timer,
                    created_at: Instant::now(),
                });
            }
        }
        self.inner.refresh_loading();

        debug!(
            request_id = %id,
            action,
            timeout_ms = timeout.as_millis() as u64,
            "Registered pending request"
        );
        Ok(receiver)
    }

    /// Settles the request named by `envelope.event_id` with the envelope.
    ///
    /// Returns `false` when no such request is pending (late, duplicate or
    /// unknown response); nothing else happens in that case.
    pub fn resolve(&self, envelope: ResponseEnvelope) -> bool {
        let envelope = envelope.normalized();
        let Some(request) = self.inner.take(&envelope.event_id) else {
            trace!(request_id = %envelope.event_id, "Ignoring response for unknown request");
            return false;
        };
        request.timer.abort();

        debug!(
            request_id = %envelope.event_id,
            action = %request.action,
            success = envelope.success,
            elapsed_ms = request.created_at.elapsed().as_millis() as u64,
            "Resolved pending request"
        );
        deliver(request.sender, Ok(envelope));
        true
    }

    /// Removes one pending request and fails it with `error`.
    pub fn reject(&self, id: &RequestId, error: MessengerError) -> bool {
        let Some(request) = self.inner.take(id) else {
            return false;
        };
        request.timer.abort();

        debug!(request_id = %id, action = %request.action, "Rejected pending request: {}", error);
        deliver(request.sender, Err(error));
        true
    }

    /// Cancels a single request. Loses silently if a response or the timeout
    /// got there first.
    pub fn cancel(&self, id: &RequestId, reason: &str) -> bool {
        self.reject(id, MessengerError::cancelled(reason))
    }

    /// Cancels every pending request. Returns how many were cancelled.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let ids: Vec<RequestId> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let cancelled = ids.iter().filter(|id| self.cancel(id, reason)).count();
        if cancelled > 0 {
            debug!(cancelled, reason, "Cancelled pending requests");
        }
        cancelled
    }

    pub fn count(&self) -> usize {
        self.inner.pending.len()
    }

    pub fn is_loading(&self) -> bool {
        self.count() > 0
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.inner.pending.contains_key(id)
    }

    /// Observes loading transitions.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryInner {
    fn take(&self, id: &RequestId) -> Option<PendingRequest> {
        let (_, request) = self.pending.remove(id)?;
        self.refresh_loading();
        Some(request)
    }

    fn refresh_loading(&self) {
        // evaluated under the watch lock so concurrent refreshes settle on the latest state
        self.loading.send_if_modified(|loading| {
            let now = !self.pending.is_empty();
            let changed = *loading != now;
            *loading = now;
            changed
        });
    }

    fn expire(&self, id: &RequestId, action: &str, timeout: Duration) {
        let Some(request) = self.take(id) else {
            return;
        };
        let timeout_ms = timeout.as_millis() as u64;
        warn!(request_id = %id, action, timeout_ms, "Request timed out");
        deliver(
            request.sender,
            Err(MessengerError::Timeout {
                action: action.to_string(),
                timeout_ms,
            }),
        );
    }
}

fn spawn_timer(
    registry: Weak<RegistryInner>,
    id: RequestId,
    action: String,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if let Some(registry) = registry.upgrade() {
            registry.expire(&id, &action, timeout);
        }
    })
}

fn deliver(sender: oneshot::Sender<Reply>, reply: Reply) {
    if sender.send(reply).is_err() {
        debug!("Reply dropped: caller is no longer waiting");
    }
}
