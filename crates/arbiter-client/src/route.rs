//! Route parsing and cache keys.

use std::fmt;

use dbx_domain::error::{Error, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Operation a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pieces of a route URL the arbiter cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoute {
    /// Host name only; this is the `target` sent to the arbiter.
    pub host: String,
    /// Host plus port when the URL has one.
    pub authority: String,
    pub path: String,
}

/// Split a route URL such as `tcp://store:5555/kv/sensor/*`.
pub fn parse_href(href: &str) -> Result<ParsedRoute> {
    let url = Url::parse(href).map_err(|e| Error::InvalidRoute(format!("{href}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidRoute(format!("{href}: no host")))?
        .to_owned();
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.clone(),
    };
    Ok(ParsedRoute {
        host,
        authority,
        path: raw_path(href).unwrap_or_else(|| url.path()).to_owned(),
    })
}

/// Path exactly as written in `href`, without percent-encoding.
///
/// The store checks tokens against the path it is handed, so the arbiter
/// must see the same spelling.
fn raw_path(href: &str) -> Option<&str> {
    let (_, rest) = href.split_once("://")?;
    let start = rest.find('/')?;
    let path = &rest[start..];
    let end = path.find(['?', '#']).unwrap_or(path.len());
    Some(&path[..end])
}

/// Base store URL (`scheme://authority`) of a data source href.
pub fn store_url_from_href(href: &str) -> Result<String> {
    let url = Url::parse(href).map_err(|e| Error::InvalidRoute(format!("{href}: {e}")))?;
    let route = parse_href(href)?;
    Ok(format!("{}://{}", url.scheme(), route.authority))
}

/// Identity of a cached grant.
///
/// Target and path are upper-cased so that two spellings of the same
/// route share an entry. The caveat is empty when none was requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    pub target: String,
    pub path: String,
    pub method: Method,
    pub caveat: String,
}

impl RouteKey {
    pub fn new(route: &ParsedRoute, method: Method, caveat: Option<&str>) -> Self {
        Self {
            target: route.authority.to_uppercase(),
            path: route.path.to_uppercase(),
            method,
            caveat: caveat.unwrap_or_default().to_owned(),
        }
    }

    pub fn from_href(href: &str, method: Method, caveat: Option<&str>) -> Result<Self> {
        Ok(Self::new(&parse_href(href)?, method, caveat))
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{}", self.method, self.target, self.path)?;
        if !self.caveat.is_empty() {
            write!(f, " [{}]", self.caveat)?;
        }
        Ok(())
    }
}
