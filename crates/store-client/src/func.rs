//! Request/response function calls over store notifications.
//!
//! A provider registers a named handler; callers invoke it by writing to
//! `/notification/request/<name>/<job>` after subscribing for the single
//! answer on `/notification/response/<name>/<job>`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dbx_domain::error::{Error, Result};
use dbx_domain::{ContentType, DataSourceMetadata, StoreType};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use crate::client::CoreStoreClient;
use crate::frame::parse_notify_frame;
use crate::subscription::Subscription;
use crate::transport::ObserveMode;
use crate::types::ObserveResponse;

const REQUEST_PREFIX: &str = "/notification/request/";
const RESPONSE_PREFIX: &str = "/notification/response/";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome code carried in every [`FuncResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum FuncStatus {
    Ok,
    FailedToGetToken,
    InvalidPayload,
    Error,
}

impl From<FuncStatus> for i32 {
    fn from(status: FuncStatus) -> Self {
        match status {
            FuncStatus::Ok => 0,
            FuncStatus::FailedToGetToken => 97,
            FuncStatus::InvalidPayload => 98,
            FuncStatus::Error => 99,
        }
    }
}

/// Codes this client does not know are treated as errors.
impl From<i32> for FuncStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => FuncStatus::Ok,
            97 => FuncStatus::FailedToGetToken,
            98 => FuncStatus::InvalidPayload,
            _ => FuncStatus::Error,
        }
    }
}

/// Answer to a function call. On the wire:
/// `{"Status": <code>, "Response": "<base64>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncResponse {
    #[serde(rename = "Status")]
    pub status: FuncStatus,
    #[serde(
        rename = "Response",
        default,
        serialize_with = "b64_encode",
        deserialize_with = "b64_decode"
    )]
    pub response: Vec<u8>,
}

impl FuncResponse {
    pub fn ok(response: Vec<u8>) -> Self {
        Self {
            status: FuncStatus::Ok,
            response,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(FuncStatus::Error, message)
    }

    fn with_status(status: FuncStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            response: message.into().into_bytes(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FuncStatus::Ok
    }
}

fn b64_encode<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&STANDARD.encode(bytes))
}

/// `null` decodes as empty.
fn b64_decode<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<u8>, D::Error> {
    match Option::<String>::deserialize(d)? {
        Some(s) => STANDARD.decode(s).map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handlers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `Err` carries the message returned to the caller.
pub type FuncResult = std::result::Result<Vec<u8>, String>;

/// Implement this (or pass an async closure) to serve a function.
#[async_trait]
pub trait FuncHandler: Send + Sync + 'static {
    async fn call(&self, content_type: ContentType, payload: Vec<u8>) -> FuncResult;
}

#[async_trait]
impl<F, Fut> FuncHandler for F
where
    F: Fn(ContentType, Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FuncResult> + Send + 'static,
{
    async fn call(&self, content_type: ContentType, payload: Vec<u8>) -> FuncResult {
        (self)(content_type, payload).await
    }
}

type Handlers = Arc<Mutex<HashMap<String, Arc<dyn FuncHandler>>>>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Func
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Registers function handlers and calls functions served elsewhere.
#[derive(Clone)]
pub struct Func {
    core: CoreStoreClient,
    handlers: Handlers,
    /// Set once the request listener is running.
    listener: Arc<tokio::sync::Mutex<Option<CancellationToken>>>,
}

impl Func {
    pub fn new(core: CoreStoreClient) -> Self {
        Self {
            core,
            handlers: Arc::default(),
            listener: Arc::default(),
        }
    }

    /// Serve `name`.
    ///
    /// Advertises a `func` data source in the catalogue and, on first use,
    /// starts listening on `/notification/request/*`.
    pub async fn register<H: FuncHandler>(
        &self,
        vendor: &str,
        name: &str,
        content_type: ContentType,
        handler: H,
    ) -> Result<()> {
        if self.handlers.lock().contains_key(name) {
            return Err(Error::Function(format!("{name} is already registered")));
        }

        let metadata = DataSourceMetadata {
            description: "A function".into(),
            content_type: content_type.as_str().to_owned(),
            vendor: vendor.to_owned(),
            data_source_type: format!("{vendor}:func:{name}"),
            data_source_id: name.to_owned(),
            store_type: StoreType::Func,
            is_actuator: false,
            is_func: true,
            unit: String::new(),
            location: String::new(),
        };
        self.core
            .register_datasource(&metadata)
            .await
            .map_err(|e| Error::Function(format!("unable to register {name}: {e}")))?;

        {
            let mut handlers = self.handlers.lock();
            if handlers.contains_key(name) {
                return Err(Error::Function(format!("{name} is already registered")));
            }
            handlers.insert(name.to_owned(), Arc::new(handler));
        }

        if let Err(e) = self.ensure_listener().await {
            self.handlers.lock().remove(name);
            return Err(e);
        }
        Ok(())
    }

    /// Names currently served by this instance.
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Stop serving requests. Registered handlers stay registered.
    pub async fn shutdown(&self) {
        if let Some(cancel) = self.listener.lock().await.take() {
            cancel.cancel();
        }
    }

    async fn ensure_listener(&self) -> Result<()> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }

        let requests = self
            .core
            .observe(
                &format!("{REQUEST_PREFIX}*"),
                ContentType::Json,
                ObserveMode::Notification,
            )
            .await?;
        tracing::debug!("listening for function requests");

        *listener = Some(requests.cancellation_token());
        tokio::spawn(serve_requests(
            self.core.clone(),
            self.handlers.clone(),
            requests,
        ));
        Ok(())
    }

    /// Call `name` and wait for its answer.
    ///
    /// Failures along the way come back as responses with a non-`Ok`
    /// status rather than as errors.
    pub async fn call(&self, name: &str, payload: &[u8], content_type: ContentType) -> FuncResponse {
        let job = uuid::Uuid::new_v4();
        let response_path = format!("{RESPONSE_PREFIX}{name}/{job}");
        let request_path = format!("{REQUEST_PREFIX}{name}/{job}");

        let mut answer = match self.core.notify(&response_path, content_type).await {
            Ok(sub) => sub,
            Err(e @ Error::Arbiter(_)) => {
                return FuncResponse::with_status(FuncStatus::FailedToGetToken, e.to_string())
            }
            Err(e) => {
                return FuncResponse::error(format!(
                    "failed to set up notification on {response_path}: {e}"
                ))
            }
        };

        if let Err(e) = self.core.write(&request_path, payload, content_type).await {
            let status = match e {
                Error::Arbiter(_) => FuncStatus::FailedToGetToken,
                _ => FuncStatus::Error,
            };
            return FuncResponse::with_status(status, format!("failed to call {name}: {e}"));
        }

        match answer.recv().await {
            Some(resp) => serde_json::from_slice(&resp.data).unwrap_or_else(|e| {
                FuncResponse::with_status(
                    FuncStatus::InvalidPayload,
                    format!("failed to decode response from {name}: {e}"),
                )
            }),
            None => FuncResponse::error(format!("no response from {name}")),
        }
    }

    /// [`call`](Self::call), giving up after `timeout`.
    pub async fn call_with_timeout(
        &self,
        name: &str,
        payload: &[u8],
        content_type: ContentType,
        timeout: Duration,
    ) -> FuncResponse {
        match tokio::time::timeout(timeout, self.call(name, payload, content_type)).await {
            Ok(resp) => resp,
            Err(_) => FuncResponse::error(format!("{name} timed out after {timeout:?}")),
        }
    }
}

// ── Request listener ─────────────────────────────────────────────────

async fn serve_requests(
    core: CoreStoreClient,
    handlers: Handlers,
    mut requests: Subscription<ObserveResponse>,
) {
    while let Some(raw) = requests.recv().await {
        let request = match parse_notify_frame(&raw.data) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "malformed function request");
                continue;
            }
        };

        let Some(name) = request.path.split('/').nth(3).map(str::to_owned) else {
            tracing::warn!(path = %request.path, "function request without a name");
            continue;
        };
        let handler = handlers.lock().get(&name).cloned();
        let Some(handler) = handler else {
            tracing::warn!(function = %name, "request for unregistered function");
            continue;
        };

        let core = core.clone();
        tokio::spawn(async move {
            let response_path = request.path.replacen(REQUEST_PREFIX, RESPONSE_PREFIX, 1);
            let response = match handler.call(request.content_type, request.data).await {
                Ok(data) => FuncResponse::ok(data),
                Err(message) => FuncResponse::error(message),
            };

            let body = match serde_json::to_vec(&response) {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!(function = %name, error = %e, "failed to encode response");
                    return;
                }
            };
            if let Err(e) = core
                .write(&response_path, &body, request.content_type)
                .await
            {
                tracing::error!(path = %response_path, error = %e, "failed to send function response");
            }
        });
    }
    tracing::debug!("function request listener stopped");
}
