//! The seam between the dispatch core and a store's wire protocol.
//!
//! [`CoreStoreClient`](crate::CoreStoreClient) never talks to a socket
//! itself. It obtains a token and hands it, together with the path and
//! content type, to a [`StoreTransport`]. Anything that can carry those
//! calls (a ZeroMQ/CoAP binding, an HTTP bridge, the in-process
//! [`MemoryStore`](crate::MemoryStore)) plugs in here.

use async_trait::async_trait;
use dbx_arbiter::Token;
use dbx_domain::ContentType;
use dbx_domain::Error;
use tokio::sync::mpsc;

/// Failure reported by a store transport.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The store refused the request (bad or expired token, unknown path).
    #[error("rejected: {0}")]
    Rejected(String),
    /// The store could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// The transport has been shut down.
    #[error("closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Store(e.to_string())
    }
}

/// How an observation delivers frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObserveMode {
    /// Frames carry written data and are parsed into records.
    #[default]
    Data,
    /// Frames are notification requests, handed over unparsed.
    Notification,
}

impl ObserveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObserveMode::Data => "data",
            ObserveMode::Notification => "notification",
        }
    }
}

/// Raw store operations. Each call carries the token authorizing it.
///
/// `observe` and `notify` return a receiver of raw frames
/// (`<ms> <path> <content-type> <payload>`). The transport closes the
/// channel when the subscription ends upstream; dropping the receiver
/// tells the transport the subscriber is gone.
#[async_trait]
pub trait StoreTransport: Send + Sync {
    async fn post(
        &self,
        token: &Token,
        path: &str,
        payload: &[u8],
        content_type: ContentType,
    ) -> Result<(), TransportError>;

    async fn get(
        &self,
        token: &Token,
        path: &str,
        content_type: ContentType,
    ) -> Result<Vec<u8>, TransportError>;

    async fn delete(
        &self,
        token: &Token,
        path: &str,
        content_type: ContentType,
    ) -> Result<(), TransportError>;

    async fn observe(
        &self,
        token: &Token,
        path: &str,
        content_type: ContentType,
        mode: ObserveMode,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Subscribe for a single frame on `path`.
    async fn notify(
        &self,
        token: &Token,
        path: &str,
        content_type: ContentType,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;
}
