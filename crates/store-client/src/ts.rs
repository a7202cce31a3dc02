//! Time-series store wrappers.
//!
//! Structured (`/ts/…`) and blob (`/ts/blob/…`) stores share one wrapper,
//! [`TimeSeries`], differing only in path prefix and content type.
//! Aggregation and filtering are understood by structured stores only;
//! blob stores ignore [`QueryOptions`].

use std::fmt;

use dbx_domain::error::Result;
use dbx_domain::ContentType;
use serde::Deserialize;

use crate::client::CoreStoreClient;
use crate::subscription::Subscription;
use crate::transport::ObserveMode;
use crate::types::ObserveResponse;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Query options
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Aggregation applied by the store to a numeric query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Count,
    Min,
    Max,
    Mean,
    Median,
    StandardDeviation,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Mean => "mean",
            Aggregation::Median => "median",
            Aggregation::StandardDeviation => "sd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Equals,
    Contains,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Equals => "equals",
            FilterKind::Contains => "contains",
        }
    }
}

/// Match on a tag of each stored JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub tag: String,
    pub kind: FilterKind,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub aggregation: Option<Aggregation>,
    pub filter: Option<Filter>,
}

impl QueryOptions {
    pub fn aggregate(aggregation: Aggregation) -> Self {
        Self {
            aggregation: Some(aggregation),
            filter: None,
        }
    }

    pub fn with_filter(mut self, tag: &str, kind: FilterKind, value: &str) -> Self {
        self.filter = Some(Filter {
            tag: tag.to_owned(),
            kind,
            value: value.to_owned(),
        });
        self
    }
}

/// Renders the path suffix: `[/filter/<tag>/<kind>/<value>][/<aggregation>]`.
/// A filter with an empty tag or value is left out.
impl fmt::Display for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(filter) = self
            .filter
            .as_ref()
            .filter(|fl| !fl.tag.is_empty() && !fl.value.is_empty())
        {
            write!(
                f,
                "/filter/{}/{}/{}",
                filter.tag,
                filter.kind.as_str(),
                filter.value
            )?;
        }
        if let Some(aggregation) = self.aggregation {
            write!(f, "/{}", aggregation.as_str())?;
        }
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wrapper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const STRUCTURED_PREFIX: &str = "/ts";
const BLOB_PREFIX: &str = "/ts/blob";

#[derive(Deserialize)]
struct Length {
    length: usize,
}

/// Time-series view of a store.
#[derive(Clone)]
pub struct TimeSeries {
    core: CoreStoreClient,
    prefix: &'static str,
    content_type: ContentType,
}

impl TimeSeries {
    /// Structured JSON time series (`/ts/<id>`).
    pub fn structured(core: CoreStoreClient) -> Self {
        Self {
            core,
            prefix: STRUCTURED_PREFIX,
            content_type: ContentType::Json,
        }
    }

    /// Opaque blob time series (`/ts/blob/<id>`).
    ///
    /// Query options are ignored. Observed records carry the series id in
    /// `data_source_id`, as for structured series.
    pub fn blob(core: CoreStoreClient, content_type: ContentType) -> Self {
        Self {
            core,
            prefix: BLOB_PREFIX,
            content_type,
        }
    }

    pub fn prefix(&self) -> &str {
        self.prefix
    }

    fn is_blob(&self) -> bool {
        self.prefix == BLOB_PREFIX
    }

    fn path(&self, data_source_id: &str) -> String {
        format!("{}/{data_source_id}", self.prefix)
    }

    fn query_path(&self, data_source_id: &str, query: &str, opts: &QueryOptions) -> String {
        if self.is_blob() {
            format!("{}/{query}", self.path(data_source_id))
        } else {
            format!("{}/{query}{opts}", self.path(data_source_id))
        }
    }

    /// Append a value stamped by the store.
    pub async fn write(&self, data_source_id: &str, payload: &[u8]) -> Result<()> {
        self.core
            .write(&self.path(data_source_id), payload, self.content_type)
            .await
    }

    /// Append a value at an explicit timestamp (ms).
    ///
    /// One token for `<id>/at/*` covers every timestamp.
    pub async fn write_at(&self, data_source_id: &str, timestamp_ms: i64, payload: &[u8]) -> Result<()> {
        let base = self.path(data_source_id);
        self.core
            .write_with_token_path(
                &format!("{base}/at/*"),
                &format!("{base}/at/{timestamp_ms}"),
                payload,
                self.content_type,
            )
            .await
    }

    pub async fn latest(&self, data_source_id: &str) -> Result<Vec<u8>> {
        self.read(format!("{}/latest", self.path(data_source_id)))
            .await
    }

    pub async fn earliest(&self, data_source_id: &str) -> Result<Vec<u8>> {
        self.read(format!("{}/earliest", self.path(data_source_id)))
            .await
    }

    pub async fn last_n(&self, data_source_id: &str, n: usize, opts: &QueryOptions) -> Result<Vec<u8>> {
        self.read(self.query_path(data_source_id, &format!("last/{n}"), opts))
            .await
    }

    pub async fn first_n(&self, data_source_id: &str, n: usize, opts: &QueryOptions) -> Result<Vec<u8>> {
        self.read(self.query_path(data_source_id, &format!("first/{n}"), opts))
            .await
    }

    /// Values written at or after `since_ms`.
    pub async fn since(&self, data_source_id: &str, since_ms: i64, opts: &QueryOptions) -> Result<Vec<u8>> {
        self.read(self.query_path(data_source_id, &format!("since/{since_ms}"), opts))
            .await
    }

    /// Values written between `from_ms` and `to_ms`.
    pub async fn range(
        &self,
        data_source_id: &str,
        from_ms: i64,
        to_ms: i64,
        opts: &QueryOptions,
    ) -> Result<Vec<u8>> {
        self.read(self.query_path(
            data_source_id,
            &format!("range/{from_ms}/{to_ms}"),
            opts,
        ))
        .await
    }

    /// Number of stored values.
    pub async fn length(&self, data_source_id: &str) -> Result<usize> {
        let body = self
            .core
            .read(
                &format!("{}/length", self.path(data_source_id)),
                ContentType::Json,
            )
            .await?;
        let length: Length = serde_json::from_slice(&body)?;
        Ok(length.length)
    }

    /// Watch new values written to `data_source_id`.
    pub async fn observe(&self, data_source_id: &str) -> Result<Subscription<ObserveResponse>> {
        self.core
            .observe(&self.path(data_source_id), self.content_type, ObserveMode::Data)
            .await
    }

    async fn read(&self, path: String) -> Result<Vec<u8>> {
        self.core.read(&path, self.content_type).await
    }
}
