//! The seam between [`ArbiterClient`](crate::ArbiterClient) and the wire.

use async_trait::async_trait;
use dbx_domain::error::Result;
use serde::Serialize;

use crate::route::Method;

/// One request to the arbiter.
#[derive(Debug, Clone)]
pub struct ArbiterRequest {
    pub method: Method,
    /// Endpoint path such as `/token` or `/cat`.
    pub path: String,
    /// JSON body, when the endpoint takes one.
    pub body: Option<Vec<u8>>,
}

impl ArbiterRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self> {
        Ok(Self {
            method: Method::Post,
            path: path.into(),
            body: Some(serde_json::to_vec(body)?),
        })
    }

    /// `"POST /token"` style label for logs.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Raw arbiter answer: status code plus body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArbiterResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ArbiterResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Anything that can carry an [`ArbiterRequest`] to the arbiter.
///
/// Implementations return `Err` only for transport failures (connection
/// refused, timeout). Any HTTP-level status, including errors, comes back
/// as an `ArbiterResponse` so the client can apply its own policy.
#[async_trait]
pub trait ArbiterTransport: Send + Sync {
    async fn send(&self, request: ArbiterRequest) -> Result<ArbiterResponse>;
}
