//! Content-type and store-type tags plus the data source description
//! components register in their store's catalogue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Payload encoding understood by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    #[serde(alias = "json")]
    Json,
    #[serde(alias = "text")]
    Text,
    #[serde(alias = "binary")]
    Binary,
}

impl ContentType {
    /// Wire tag as sent to the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "JSON",
            ContentType::Text => "TEXT",
            ContentType::Binary => "BINARY",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    /// Case-insensitive: stores echo the tag back in lower case.
    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("json") {
            Ok(ContentType::Json)
        } else if s.eq_ignore_ascii_case("text") {
            Ok(ContentType::Text)
        } else if s.eq_ignore_ascii_case("binary") {
            Ok(ContentType::Binary)
        } else {
            Err(Error::Other(format!("unknown content type: {s}")))
        }
    }
}

/// Kind of store backing a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreType {
    #[serde(rename = "kv")]
    Kv,
    #[serde(rename = "ts")]
    Ts,
    #[serde(rename = "ts/blob")]
    TsBlob,
    #[serde(rename = "func")]
    Func,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Kv => "kv",
            StoreType::Ts => "ts",
            StoreType::TsBlob => "ts/blob",
            StoreType::Func => "func",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "kv" => Ok(StoreType::Kv),
            "ts" => Ok(StoreType::Ts),
            "ts/blob" => Ok(StoreType::TsBlob),
            "func" => Ok(StoreType::Func),
            other => Err(Error::Other(format!("unknown store type: {other}"))),
        }
    }
}

/// Description of a registrable data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceMetadata {
    pub description: String,
    /// MIME-style content type advertised in the catalogue.
    pub content_type: String,
    pub vendor: String,
    pub data_source_type: String,
    pub data_source_id: String,
    pub store_type: StoreType,
    #[serde(default)]
    pub is_actuator: bool,
    #[serde(default)]
    pub is_func: bool,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub location: String,
}
