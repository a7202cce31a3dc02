//! In-memory token cache.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::route::RouteKey;

/// Opaque capability token as returned by the arbiter.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(Arc<[u8]>);

impl Token {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Token {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().into())
    }
}

// Never print credentials.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

/// Thread-safe map from route to granted token.
///
/// A single `parking_lot::Mutex` guards the map. It is only ever held for
/// the map operation itself, never across a network call. There is no
/// eviction: entries leave only through [`TokenCache::delete`].
#[derive(Debug, Default)]
pub struct TokenCache {
    inner: Mutex<HashMap<RouteKey, Token>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &RouteKey) -> Option<Token> {
        self.inner.lock().get(key).cloned()
    }

    /// Insert or overwrite.
    pub fn set(&self, key: RouteKey, token: Token) {
        self.inner.lock().insert(key, token);
    }

    /// Remove an entry. Returns whether one was present; absence is not an error.
    pub fn delete(&self, key: &RouteKey) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
