//! Hypercat catalogue documents.
//!
//! Both the arbiter (`GET /cat`) and every store (`/cat`) serve a
//! catalogue. Items carry `rel`/`val` pairs; values are strings except the
//! boolean flags, which older components also write as `"true"` strings.

use serde::{Deserialize, Serialize};

use crate::datasource::{DataSourceMetadata, StoreType};
use crate::error::{Error, Result};

pub const REL_DESCRIPTION: &str = "urn:X-hypercat:rels:hasDescription:en";
pub const REL_CONTENT_TYPE: &str = "urn:X-hypercat:rels:isContentType";
pub const REL_VENDOR: &str = "urn:X-databox:rels:hasVendor";
pub const REL_TYPE: &str = "urn:X-databox:rels:hasType";
pub const REL_DATASOURCE_ID: &str = "urn:X-databox:rels:hasDatasourceid";
pub const REL_STORE_TYPE: &str = "urn:X-databox:rels:hasStoreType";
pub const REL_IS_ACTUATOR: &str = "urn:X-databox:rels:isActuator";
pub const REL_IS_FUNC: &str = "urn:X-databox:rels:isFunc";
pub const REL_LOCATION: &str = "urn:X-databox:rels:hasLocation";
pub const REL_UNIT: &str = "urn:X-databox:rels:hasUnit";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypercatRoot {
    #[serde(rename = "catalogue-metadata", default)]
    pub catalogue_metadata: Vec<RelVal>,
    #[serde(default)]
    pub items: Vec<HypercatItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypercatItem {
    #[serde(rename = "item-metadata", default)]
    pub item_metadata: Vec<RelVal>,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelVal {
    pub rel: String,
    pub val: RelValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelValue {
    Bool(bool),
    Text(String),
}

impl RelValue {
    /// Boolean reading that also accepts `"true"` in any case.
    pub fn is_true(&self) -> bool {
        match self {
            RelValue::Bool(b) => *b,
            RelValue::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RelValue::Text(s) => Some(s),
            RelValue::Bool(_) => None,
        }
    }
}

impl RelVal {
    pub fn text(rel: &str, val: impl Into<String>) -> Self {
        Self {
            rel: rel.to_owned(),
            val: RelValue::Text(val.into()),
        }
    }

    pub fn flag(rel: &str, val: bool) -> Self {
        Self {
            rel: rel.to_owned(),
            val: RelValue::Bool(val),
        }
    }
}

impl HypercatItem {
    /// First value recorded under `rel`.
    pub fn value(&self, rel: &str) -> Option<&RelValue> {
        self.item_metadata
            .iter()
            .find(|pair| pair.rel == rel)
            .map(|pair| &pair.val)
    }

    pub fn is_actuator(&self) -> bool {
        self.value(REL_IS_ACTUATOR).is_some_and(RelValue::is_true)
    }

    pub fn is_func(&self) -> bool {
        self.value(REL_IS_FUNC).is_some_and(RelValue::is_true)
    }
}

impl HypercatRoot {
    /// Items whose href starts with `prefix`.
    pub fn items_under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a HypercatItem> {
        self.items.iter().filter(move |item| item.href.starts_with(prefix))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metadata <-> catalogue item
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

impl DataSourceMetadata {
    /// Build the catalogue item registered for this data source on the
    /// store reachable at `endpoint`.
    pub fn to_hypercat(&self, endpoint: &str) -> Result<HypercatItem> {
        let missing: Vec<&str> = [
            ("description", self.description.is_empty()),
            ("content_type", self.content_type.is_empty()),
            ("vendor", self.vendor.is_empty()),
            ("data_source_type", self.data_source_type.is_empty()),
            ("data_source_id", self.data_source_id.is_empty()),
        ]
        .into_iter()
        .filter_map(|(name, empty)| empty.then_some(name))
        .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required metadata: {}",
                missing.join(", ")
            )));
        }

        let mut meta = vec![
            RelVal::text(REL_DESCRIPTION, &self.description),
            RelVal::text(REL_CONTENT_TYPE, &self.content_type),
            RelVal::text(REL_VENDOR, &self.vendor),
            RelVal::text(REL_TYPE, &self.data_source_type),
            RelVal::text(REL_DATASOURCE_ID, &self.data_source_id),
            RelVal::text(REL_STORE_TYPE, self.store_type.as_str()),
        ];
        if self.is_actuator {
            meta.push(RelVal::flag(REL_IS_ACTUATOR, true));
        }
        if self.is_func {
            meta.push(RelVal::flag(REL_IS_FUNC, true));
        }
        if !self.location.is_empty() {
            meta.push(RelVal::text(REL_LOCATION, &self.location));
        }
        if !self.unit.is_empty() {
            meta.push(RelVal::text(REL_UNIT, &self.unit));
        }

        let endpoint = endpoint.trim_end_matches('/');
        let href = if self.is_func {
            format!("{endpoint}/notification/request/{}", self.data_source_id)
        } else {
            format!("{endpoint}/{}/{}", self.store_type, self.data_source_id)
        };

        Ok(HypercatItem {
            item_metadata: meta,
            href,
        })
    }

    /// Recover the metadata from a catalogue item.
    ///
    /// Items written by older components may lack a known store type;
    /// those are treated as `ts/blob`.
    pub fn from_hypercat(item: &HypercatItem) -> Self {
        let text = |rel: &str| {
            item.value(rel)
                .and_then(RelValue::as_str)
                .unwrap_or_default()
                .to_owned()
        };

        let raw_store_type = text(REL_STORE_TYPE);
        let store_type = raw_store_type.parse().unwrap_or_else(|_| {
            tracing::warn!(
                href = %item.href,
                store_type = %raw_store_type,
                "unknown store type in catalogue item, assuming ts/blob"
            );
            StoreType::TsBlob
        });

        Self {
            description: text(REL_DESCRIPTION),
            content_type: text(REL_CONTENT_TYPE),
            vendor: text(REL_VENDOR),
            data_source_type: text(REL_TYPE),
            data_source_id: text(REL_DATASOURCE_ID),
            store_type,
            is_actuator: item.is_actuator(),
            is_func: item.is_func(),
            unit: text(REL_UNIT),
            location: text(REL_LOCATION),
        }
    }
}
