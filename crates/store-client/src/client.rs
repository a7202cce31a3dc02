//! Authorize-then-perform dispatch for store operations.
//!
//! Every call asks the [`ArbiterClient`] for a token on
//! `<endpoint><path>` and hands it to the [`StoreTransport`]. When the
//! transport call fails the route's cached token is invalidated so the
//! *next* call refetches; the failing call itself is not retried.

use std::sync::Arc;
use std::time::Instant;

use dbx_arbiter::{ArbiterClient, Method, Token};
use dbx_domain::config::StoreConfig;
use dbx_domain::error::{Error, Result};
use dbx_domain::trace::TraceEvent;
use dbx_domain::{secrets, ContentType};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::frame::{parse_notify_frame, parse_observe_frame};
use crate::subscription::Subscription;
use crate::transport::{ObserveMode, StoreTransport};
use crate::types::{NotifyResponse, ObserveResponse};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Capability-gated client for one store.
///
/// Cheap to clone; clones share the arbiter client (and therefore the
/// token cache) and the transport.
#[derive(Clone)]
pub struct CoreStoreClient {
    arbiter: ArbiterClient,
    transport: Arc<dyn StoreTransport>,
    endpoint: Arc<str>,
    public_key: Arc<str>,
    channel_capacity: usize,
}

impl CoreStoreClient {
    /// The store's public key is read once here; a missing key file falls
    /// back to the development key with a warning.
    pub fn new(
        arbiter: ArbiterClient,
        transport: Arc<dyn StoreTransport>,
        cfg: &StoreConfig,
    ) -> Self {
        let public_key = secrets::read_store_public_key(&cfg.public_key_path);
        Self {
            arbiter,
            transport,
            endpoint: cfg.endpoint.trim_end_matches('/').into(),
            public_key: public_key.into(),
            channel_capacity: cfg.channel_capacity.max(1),
        }
    }

    /// Store endpoint, e.g. `tcp://driver-store:5555`.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Public key for the transport's encrypted channel.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn arbiter(&self) -> &ArbiterClient {
        &self.arbiter
    }

    pub(crate) fn transport(&self) -> &Arc<dyn StoreTransport> {
        &self.transport
    }

    pub(crate) fn href(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    // ── Single-shot operations ───────────────────────────────────────

    pub async fn write(&self, path: &str, payload: &[u8], content_type: ContentType) -> Result<()> {
        self.write_with_token_path(path, path, payload, content_type)
            .await
    }

    /// Write to `path` using a token granted for `token_path`.
    ///
    /// Used where one wildcard grant (`/ts/x/at/*`) covers many concrete
    /// paths. A failure invalidates the `token_path` entry.
    pub async fn write_with_token_path(
        &self,
        token_path: &str,
        path: &str,
        payload: &[u8],
        content_type: ContentType,
    ) -> Result<()> {
        let token = self.token(token_path, Method::Post).await?;

        let start = Instant::now();
        let result = self
            .transport
            .post(&token, path, payload, content_type)
            .await;
        record_call("POST", path, result.is_ok(), start);

        result.map_err(|e| {
            self.invalidate(token_path, Method::Post);
            Error::Store(format!("Error writing: {e}"))
        })
    }

    pub async fn read(&self, path: &str, content_type: ContentType) -> Result<Vec<u8>> {
        let token = self.token(path, Method::Get).await?;

        let start = Instant::now();
        let result = self.transport.get(&token, path, content_type).await;
        record_call("GET", path, result.is_ok(), start);

        result.map_err(|e| {
            self.invalidate(path, Method::Get);
            Error::Store(format!("Error reading: {e}"))
        })
    }

    pub async fn delete(&self, path: &str, content_type: ContentType) -> Result<()> {
        let token = self.token(path, Method::Delete).await?;

        let start = Instant::now();
        let result = self.transport.delete(&token, path, content_type).await;
        record_call("DELETE", path, result.is_ok(), start);

        result.map_err(|e| {
            self.invalidate(path, Method::Delete);
            Error::Store(format!("Error deleting: {e}"))
        })
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to every write on `path` (which may end in `/*`).
    ///
    /// Frames are delivered in the order the transport produced them.
    /// Malformed frames are logged and skipped. The subscription ends when
    /// the store closes it or it is cancelled.
    pub async fn observe(
        &self,
        path: &str,
        content_type: ContentType,
        mode: ObserveMode,
    ) -> Result<Subscription<ObserveResponse>> {
        let token = self.token(path, Method::Get).await?;
        let upstream = self
            .transport
            .observe(&token, path, content_type, mode)
            .await
            .map_err(|e| {
                self.invalidate(path, Method::Get);
                Error::Store(format!("Error observing: {e}"))
            })?;

        TraceEvent::SubscriptionOpened {
            path: path.to_owned(),
            mode: mode.as_str().to_owned(),
        }
        .emit();

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let cancel = CancellationToken::new();
        tokio::spawn(forward_observe(
            path.to_owned(),
            mode,
            upstream,
            tx,
            cancel.clone(),
        ));
        Ok(Subscription::new(rx, cancel))
    }

    /// Subscribe for exactly one frame on `path`.
    pub async fn notify(
        &self,
        path: &str,
        content_type: ContentType,
    ) -> Result<Subscription<NotifyResponse>> {
        let token = self.token(path, Method::Get).await?;
        let upstream = self
            .transport
            .notify(&token, path, content_type)
            .await
            .map_err(|e| {
                self.invalidate(path, Method::Get);
                Error::Store(format!("Error subscribing: {e}"))
            })?;

        TraceEvent::SubscriptionOpened {
            path: path.to_owned(),
            mode: "notify".to_owned(),
        }
        .emit();

        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        tokio::spawn(forward_notify(path.to_owned(), upstream, tx, cancel.clone()));
        Ok(Subscription::new(rx, cancel))
    }

    // ── Tokens ───────────────────────────────────────────────────────

    pub(crate) async fn token(&self, path: &str, method: Method) -> Result<Token> {
        self.arbiter
            .request_token(&self.href(path), method, None)
            .await
            .map_err(|e| Error::Arbiter(format!("Error getting Arbiter Token: {e}")))
    }

    pub(crate) fn invalidate(&self, path: &str, method: Method) {
        self.arbiter.invalidate_cache(&self.href(path), method, None);
    }
}

fn record_call(op: &str, path: &str, ok: bool, start: Instant) {
    TraceEvent::StoreCall {
        op: op.to_owned(),
        path: path.to_owned(),
        ok,
        duration_ms: start.elapsed().as_millis() as u64,
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Forwarding tasks
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse and republish frames until upstream closes or `cancel` fires.
/// Returning drops `upstream`, releasing the transport's subscription.
async fn forward_observe(
    path: String,
    mode: ObserveMode,
    mut upstream: mpsc::Receiver<Vec<u8>>,
    tx: mpsc::Sender<ObserveResponse>,
    cancel: CancellationToken,
) {
    let mut frames = 0u64;
    let cancelled = loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break true,
            frame = upstream.recv() => match frame {
                Some(frame) => frame,
                None => break false,
            },
        };

        let record = match mode {
            ObserveMode::Notification => ObserveResponse::raw(frame),
            ObserveMode::Data => match parse_observe_frame(&frame) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "dropping malformed frame");
                    continue;
                }
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break true,
            sent = tx.send(record) => {
                if sent.is_err() {
                    break true;
                }
            }
        }
        frames += 1;
    };

    TraceEvent::SubscriptionClosed {
        path,
        frames,
        cancelled,
    }
    .emit();
}

/// Forward the first frame and stop.
async fn forward_notify(
    path: String,
    mut upstream: mpsc::Receiver<Vec<u8>>,
    tx: mpsc::Sender<NotifyResponse>,
    cancel: CancellationToken,
) {
    let frame = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        frame = upstream.recv() => frame,
    };
    drop(upstream);

    let mut frames = 0u64;
    if let Some(frame) = frame {
        match parse_notify_frame(&frame) {
            Ok(record) => {
                if tx.send(record).await.is_ok() {
                    frames = 1;
                }
            }
            Err(e) => tracing::warn!(path = %path, error = %e, "dropping malformed notification"),
        }
    }

    TraceEvent::SubscriptionClosed {
        path,
        frames,
        cancelled: cancel.is_cancelled(),
    }
    .emit();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use dbx_arbiter::HttpArbiterTransport;

    use super::*;
    use crate::memory::MemoryStore;

    /// Arbiter in unconfigured mode: empty tokens, no network.
    fn client(store: &Arc<MemoryStore>) -> CoreStoreClient {
        let transport =
            HttpArbiterTransport::with_api_key("", None, Duration::from_secs(1)).unwrap();
        let arbiter = ArbiterClient::new(Arc::new(transport));
        CoreStoreClient::new(
            arbiter,
            store.clone(),
            &StoreConfig {
                endpoint: "tcp://store:5555/".into(),
                public_key_path: "/nonexistent/ZMQ_PUBLIC_KEY".into(),
                channel_capacity: 4,
            },
        )
    }

    #[test]
    fn missing_key_file_uses_default_key() {
        let store = Arc::new(MemoryStore::new());
        let core = client(&store);
        assert_eq!(core.public_key(), secrets::DEFAULT_STORE_PUBLIC_KEY);
        assert_eq!(core.endpoint(), "tcp://store:5555");
        assert_eq!(core.href("/kv/a"), "tcp://store:5555/kv/a");
    }

    #[tokio::test]
    async fn write_then_read() {
        let store = Arc::new(MemoryStore::new());
        let core = client(&store);
        core.write("/kv/a/b", b"hello", ContentType::Text)
            .await
            .unwrap();
        assert_eq!(
            core.read("/kv/a/b", ContentType::Text).await.unwrap(),
            b"hello"
        );
        core.delete("/kv/a/b", ContentType::Text).await.unwrap();
        assert!(core.read("/kv/a/b", ContentType::Text).await.is_err());
    }

    #[tokio::test]
    async fn malformed_frames_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let core = client(&store);
        let mut sub = core
            .observe("/kv/a/*", ContentType::Json, ObserveMode::Data)
            .await
            .unwrap();

        store.inject("/kv/a/*", b"garbage".to_vec());
        store.inject("/kv/a/*", b"7 /kv/a/k JSON {}".to_vec());

        let record = sub.recv().await.unwrap();
        assert_eq!(record.timestamp_ms, 7);
        assert_eq!(record.key, "k");
    }

    #[tokio::test]
    async fn notification_mode_delivers_raw_frames() {
        let store = Arc::new(MemoryStore::new());
        let core = client(&store);
        let mut sub = core
            .observe(
                "/notification/request/*",
                ContentType::Json,
                ObserveMode::Notification,
            )
            .await
            .unwrap();

        store.inject("/notification/request/*", b"not even a frame".to_vec());
        let record = sub.recv().await.unwrap();
        assert_eq!(record, ObserveResponse::raw(b"not even a frame".to_vec()));
    }

    #[tokio::test]
    async fn cancel_closes_subscription_and_releases_upstream() {
        let store = Arc::new(MemoryStore::new());
        let core = client(&store);
        let mut sub = core
            .observe("/ts/temp", ContentType::Json, ObserveMode::Data)
            .await
            .unwrap();
        assert_eq!(store.observer_count(), 1);

        sub.cancel();
        assert!(sub.is_cancelled());
        assert!(sub.recv().await.is_none());
        assert_eq!(store.observer_count(), 0);
    }

    #[tokio::test]
    async fn notify_delivers_one_frame_then_closes() {
        let store = Arc::new(MemoryStore::new());
        let core = client(&store);
        let mut sub = core
            .notify("/notification/response/f/1", ContentType::Json)
            .await
            .unwrap();

        core.write("/notification/response/f/1", b"first", ContentType::Json)
            .await
            .unwrap();
        core.write("/notification/response/f/1", b"second", ContentType::Json)
            .await
            .unwrap();

        let record = sub.recv().await.unwrap();
        assert_eq!(record.path, "/notification/response/f/1");
        assert_eq!(record.data, b"first");
        assert!(sub.recv().await.is_none());
    }
}
