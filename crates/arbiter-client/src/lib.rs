//! `dbx-arbiter` — token-caching client for the Databox arbiter.
//!
//! Every store operation must present a capability token minted by the
//! arbiter for one route: (target host, path, method, optional caveat).
//! [`ArbiterClient`] fetches those tokens on demand, keeps them in a
//! [`TokenCache`] until a downstream rejection forces an invalidation, and
//! exposes the arbiter's catalogue and container-management endpoints.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use dbx_arbiter::{ArbiterClient, Method};
//! use dbx_domain::config::ArbiterConfig;
//!
//! # async fn example() -> dbx_domain::Result<()> {
//! let arbiter = ArbiterClient::from_config(&ArbiterConfig::default())?;
//! let token = arbiter
//!     .request_token("tcp://driver-store:5555/ts/temperature", Method::Post, None)
//!     .await?;
//! println!("token is {} bytes", token.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Cache policy
//!
//! Tokens carry a server-enforced validity the client never inspects. An
//! entry lives until [`ArbiterClient::invalidate_cache`] is called (the
//! store client does so after any failed operation) or the process exits.
//! Delegated tokens and failed requests are never cached.

pub mod cache;
pub mod client;
pub mod http;
pub mod route;
pub mod transport;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use cache::{Token, TokenCache};
pub use client::ArbiterClient;
pub use http::{from_reqwest, HttpArbiterTransport};
pub use route::{parse_href, store_url_from_href, Method, ParsedRoute, RouteKey};
pub use transport::{ArbiterRequest, ArbiterResponse, ArbiterTransport};
pub use types::{ComponentType, ContainerInfo, ContainerPermissions, Route, TokenRequest};
