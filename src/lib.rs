//! # frame-messenger: Request/Response over a Frame Boundary
//!
//! A page embedded in a frame sends a named *action* to its parent window and
//! awaits the correlated answer. The crate provides the correlation layer:
//! unique request identifiers, tracking of outstanding requests, matching of
//! inbound responses, per-request timeouts and an aggregate loading flag.
//!
//! ## Layers
//!
//! - Wire format ([`event::envelope`]): request and response envelopes
//! - Transport ([`event::channel`]): the [`MessageTransport`] seam and the
//!   in-process [`FrameChannel`]
//! - Correlation ([`event::registry`]): pending requests, timers, loading state
//! - Facade ([`event::messenger`], [`event::typed`]): `send` returning a future
//! - Parent side ([`host`]): action handlers answering requests
//!
//! ```text
//! Messenger::send → CorrelationRegistry::register → MessageTransport::post
//!                                                          │
//!        PendingResponse ◀── resolve ◀── listener ◀── FrameHost
//! ```
//!
//! Configuration lives in [`config`] and errors in [`error`].

pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod timestamp;

// Re-exports
pub use config::MessengerConfig;
pub use error::*;
pub use event::channel::{FrameChannel, MessageReceiver, MessageTransport};
pub use event::envelope::*;
pub use event::messenger::{Messenger, PendingResponse};
pub use event::registry::CorrelationRegistry;
pub use event::typed::TypedSender;
pub use host::{ActionHandler, FrameHost};
