//! HTTP implementation of [`ArbiterTransport`].
//!
//! `HttpArbiterTransport` wraps a `reqwest::Client` and adds the component's
//! credential to every call. Arbiter calls are never retried here: a failed
//! token fetch surfaces to the caller, who decides what to do next.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dbx_domain::config::ArbiterConfig;
use dbx_domain::error::{Error, Result};
use dbx_domain::secrets;
use dbx_domain::trace::TraceEvent;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Certificate, Client};

use crate::route::Method;
use crate::transport::{ArbiterRequest, ArbiterResponse, ArbiterTransport};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An HTTP(S) connection to the arbiter.
///
/// Created once per process. The underlying `reqwest::Client` keeps a
/// connection pool.
///
/// When either the arbiter URL or the credential is missing the transport
/// runs in *unconfigured* mode: nothing goes on the wire and every request
/// is answered with status 200 and an empty body. Stores started without
/// an arbiter accept empty tokens, which is how components run outside a
/// full deployment.
#[derive(Debug)]
pub struct HttpArbiterTransport {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    warned_unconfigured: AtomicBool,
}

impl HttpArbiterTransport {
    /// Build from config, reading the credential and root CA once.
    pub fn new(cfg: &ArbiterConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let mut builder = Client::builder().timeout(timeout);

        if let Some(pem) = secrets::read_root_ca(&cfg.root_ca_path) {
            match Certificate::from_pem(&pem) {
                Ok(cert) => builder = builder.add_root_certificate(cert),
                Err(e) => tracing::warn!(
                    path = %cfg.root_ca_path.display(),
                    error = %e,
                    "failed to parse root certificate"
                ),
            }
        }

        let http = builder.build().map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.url.trim_end_matches('/').to_owned(),
            api_key: secrets::read_arbiter_key(&cfg.token_path),
            timeout,
            warned_unconfigured: AtomicBool::new(false),
        })
    }

    /// Build with an explicit (already encoded) credential.
    pub fn with_api_key(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        let base_url: String = base_url.into();

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.filter(|key| !key.is_empty()),
            timeout,
            warned_unconfigured: AtomicBool::new(false),
        })
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether requests actually reach an arbiter.
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && self.api_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ArbiterTransport for HttpArbiterTransport {
    async fn send(&self, request: ArbiterRequest) -> Result<ArbiterResponse> {
        let Some(api_key) = self.api_key.as_deref().filter(|_| !self.base_url.is_empty()) else {
            if !self.warned_unconfigured.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    endpoint = %request.endpoint(),
                    "arbiter not configured, answering with empty tokens"
                );
            }
            return Ok(ArbiterResponse::ok(Vec::new()));
        };

        let url = self.url(&request.path);
        let rb = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Delete => self.http.delete(&url),
        };
        let mut rb = rb
            .header("X-Api-Key", api_key)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = request.body {
            rb = rb.body(body);
        }

        let endpoint = format!("{} {}", request.method, request.path);
        let start = Instant::now();
        let result = rb.send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                TraceEvent::ArbiterCall {
                    endpoint,
                    status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                    duration_ms,
                }
                .emit();
                return Err(from_reqwest(e));
            }
        };

        let status = resp.status().as_u16();
        TraceEvent::ArbiterCall {
            endpoint,
            status,
            duration_ms,
        }
        .emit();

        let body = resp.bytes().await.map_err(from_reqwest)?;
        Ok(ArbiterResponse {
            status,
            body: body.to_vec(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
