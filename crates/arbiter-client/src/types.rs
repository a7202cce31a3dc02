//! Request bodies accepted by the arbiter.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::route::Method;

/// POST /token — request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub target: String,
    pub path: String,
    pub method: Method,
    #[serde(default)]
    pub caveats: Vec<String>,
    /// Component allowed to present a delegated token on our behalf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Kind of component registered with the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    App,
    Driver,
    Store,
}

/// POST /cm/upsert-container-info — request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
}

/// A single authorizable route, as the container manager describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub target: String,
    pub path: String,
    pub method: Method,
}

/// POST /cm/grant-container-permissions (and revoke) — request body.
///
/// The arbiter expects `null` rather than `[]` when there are no caveats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPermissions {
    pub name: String,
    pub route: Route,
    #[serde(
        default,
        serialize_with = "empty_as_null",
        deserialize_with = "null_as_empty"
    )]
    pub caveats: Vec<String>,
}

fn empty_as_null<S: Serializer>(caveats: &[String], s: S) -> Result<S::Ok, S::Error> {
    if caveats.is_empty() {
        s.serialize_none()
    } else {
        caveats.serialize(s)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}
