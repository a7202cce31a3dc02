//! `dbx-store` — capability-gated store client.
//!
//! [`CoreStoreClient`] pairs an [`ArbiterClient`](dbx_arbiter::ArbiterClient)
//! with a [`StoreTransport`]: each operation first obtains a token for its
//! route, then performs the call. Typed wrappers ([`KvStore`],
//! [`TimeSeries`]) build the paths, [`Func`] layers request/response calls
//! over notifications, and [`MemoryStore`] is an in-process transport for
//! tests and local runs.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use dbx_arbiter::ArbiterClient;
//! use dbx_domain::config::Config;
//! use dbx_domain::ContentType;
//! use dbx_store::{CoreStoreClient, KvStore, MemoryStore};
//!
//! # async fn example() -> dbx_domain::Result<()> {
//! let cfg = Config::load("dbx.toml")?;
//! let arbiter = ArbiterClient::from_config(&cfg.arbiter)?;
//! let core = CoreStoreClient::new(arbiter, Arc::new(MemoryStore::new()), &cfg.store);
//!
//! let kv = KvStore::new(core, ContentType::Json);
//! kv.write("lights", "hall", br#"{"on": true}"#).await?;
//! let mut changes = kv.observe("lights").await?;
//! while let Some(change) = changes.recv().await {
//!     println!("{} changed", change.key);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalogue;
pub mod client;
pub mod frame;
pub mod func;
pub mod kv;
pub mod memory;
pub mod subscription;
pub mod transport;
pub mod ts;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use catalogue::hypercat_to_datasource;
pub use client::CoreStoreClient;
pub use frame::{parse_notify_frame, parse_observe_frame, FrameError};
pub use func::{Func, FuncHandler, FuncResponse, FuncResult, FuncStatus};
pub use kv::KvStore;
pub use memory::MemoryStore;
pub use subscription::Subscription;
pub use transport::{ObserveMode, StoreTransport, TransportError};
pub use ts::{Aggregation, Filter, FilterKind, QueryOptions, TimeSeries};
pub use types::{NotifyResponse, ObserveResponse};
