//! In-process [`StoreTransport`] for tests and local development.
//!
//! Keeps payloads in a map keyed by path and fans every write out to the
//! observers and one-shot notify subscribers whose pattern matches. Tokens
//! are accepted without inspection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dbx_arbiter::Token;
use dbx_domain::ContentType;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::transport::{ObserveMode, StoreTransport, TransportError};

const SUBSCRIBER_BUFFER: usize = 64;

struct Subscriber {
    pattern: String,
    tx: mpsc::Sender<Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    data: HashMap<String, Vec<u8>>,
    observers: Vec<Subscriber>,
    notifiers: Vec<Subscriber>,
}

/// Loopback store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    reject_writes: AtomicBool,
    posts: AtomicUsize,
    gets: AtomicUsize,
    deletes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `post` fail with [`TransportError::Rejected`].
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Seed a value without notifying anyone.
    pub fn insert(&self, path: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.inner.lock().data.insert(path.into(), payload.into());
    }

    /// Current value at `path`.
    pub fn value(&self, path: &str) -> Option<Vec<u8>> {
        self.inner.lock().data.get(path).cloned()
    }

    /// Push a raw frame to observers of `path` as if the store produced it.
    pub fn inject(&self, path: &str, frame: Vec<u8>) {
        let inner = self.inner.lock();
        for sub in inner.observers.iter().filter(|s| matches(&s.pattern, path)) {
            if sub.tx.try_send(frame.clone()).is_err() {
                tracing::debug!(pattern = %sub.pattern, "injected frame not delivered");
            }
        }
    }

    /// Observers whose receiver is still alive.
    pub fn observer_count(&self) -> usize {
        self.inner
            .lock()
            .observers
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Senders due a frame for a write on `path`. Matching notify
    /// subscribers are removed; closed subscribers are pruned.
    fn take_recipients(&self, path: &str) -> Vec<mpsc::Sender<Vec<u8>>> {
        let mut inner = self.inner.lock();
        inner.observers.retain(|s| !s.tx.is_closed());
        inner.notifiers.retain(|s| !s.tx.is_closed());

        let mut recipients: Vec<_> = inner
            .observers
            .iter()
            .filter(|s| matches(&s.pattern, path))
            .map(|s| s.tx.clone())
            .collect();

        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.notifiers)
            .into_iter()
            .partition(|s| matches(&s.pattern, path));
        inner.notifiers = waiting;
        recipients.extend(due.into_iter().map(|s| s.tx));
        recipients
    }

    fn subscribe(&self, path: &str, one_shot: bool) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let sub = Subscriber {
            pattern: path.to_owned(),
            tx,
        };
        let mut inner = self.inner.lock();
        if one_shot {
            inner.notifiers.push(sub);
        } else {
            inner.observers.push(sub);
        }
        rx
    }
}

/// Exact match, or a trailing `/*` wildcard covering everything below.
fn matches(pattern: &str, path: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) if prefix.ends_with('/') => path.starts_with(prefix),
        _ => pattern == path,
    }
}

fn frame(path: &str, content_type: ContentType, payload: &[u8]) -> Vec<u8> {
    let now = chrono::Utc::now().timestamp_millis();
    let mut frame = format!("{now} {path} {content_type} ").into_bytes();
    frame.extend_from_slice(payload);
    frame
}

#[async_trait]
impl StoreTransport for MemoryStore {
    async fn post(
        &self,
        _token: &Token,
        path: &str,
        payload: &[u8],
        content_type: ContentType,
    ) -> Result<(), TransportError> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected(format!("write to {path} refused")));
        }

        self.inner
            .lock()
            .data
            .insert(path.to_owned(), payload.to_vec());

        let frame = frame(path, content_type, payload);
        for tx in self.take_recipients(path) {
            // A subscriber that went away mid-delivery is not an error.
            let _ = tx.send(frame.clone()).await;
        }
        Ok(())
    }

    async fn get(
        &self,
        _token: &Token,
        path: &str,
        _content_type: ContentType,
    ) -> Result<Vec<u8>, TransportError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.value(path)
            .ok_or_else(|| TransportError::Other(format!("no value at {path}")))
    }

    /// Removes `path` and everything below it.
    async fn delete(
        &self,
        _token: &Token,
        path: &str,
        _content_type: ContentType,
    ) -> Result<(), TransportError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let below = format!("{}/", path.trim_end_matches('/'));
        self.inner
            .lock()
            .data
            .retain(|k, _| k != path && !k.starts_with(&below));
        Ok(())
    }

    async fn observe(
        &self,
        _token: &Token,
        path: &str,
        _content_type: ContentType,
        _mode: ObserveMode,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        Ok(self.subscribe(path, false))
    }

    async fn notify(
        &self,
        _token: &Token,
        path: &str,
        _content_type: ContentType,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        Ok(self.subscribe(path, true))
    }
}
