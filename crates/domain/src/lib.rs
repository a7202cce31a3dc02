//! `dbx-domain` — shared types for the Databox store client crates.
//!
//! Holds the pieces every other crate agrees on: the shared [`error::Error`],
//! the TOML [`config::Config`], structured [`trace::TraceEvent`]s, secret and
//! key loading, content/store type tags, and the Hypercat catalogue types.

pub mod config;
pub mod datasource;
pub mod error;
pub mod hypercat;
pub mod secrets;
pub mod trace;

pub use datasource::{ContentType, DataSourceMetadata, StoreType};
pub use error::{Error, Result};
pub use hypercat::{HypercatItem, HypercatRoot, RelVal, RelValue};
