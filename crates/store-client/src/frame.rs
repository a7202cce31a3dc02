//! Subscription frame decoding.
//!
//! A frame is `<ms> <path> <content-type> <payload>`. Only the first three
//! spaces delimit fields; the payload is everything after the third and is
//! returned byte-for-byte, embedded spaces included.
//!
//! The data source id and key are taken from fixed path positions:
//! `/<kind>/<id>/<key>`, or `/ts/blob/<id>/<key>` for blob time series.

use std::str::FromStr;

use dbx_domain::{ContentType, Error};

use crate::types::{NotifyResponse, ObserveResponse};

const FIELD_COUNT: usize = 4;

const BLOB_PREFIX: &str = "/ts/blob/";

/// A frame that cannot be decoded.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("expected {expected} space-separated fields, found {found}")]
    MissingField { expected: usize, found: usize },
    #[error("bad timestamp: {0:?}")]
    BadTimestamp(String),
    #[error("bad path: {0:?}")]
    BadPath(String),
    #[error("unknown content type: {0:?}")]
    UnknownContentType(String),
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e.to_string())
    }
}

struct Fields<'a> {
    timestamp_ms: i64,
    path: &'a str,
    content_type: &'a str,
    payload: &'a [u8],
}

fn split_fields(frame: &[u8]) -> Result<Fields<'_>, FrameError> {
    let parts: Vec<&[u8]> = frame.splitn(FIELD_COUNT, |b| *b == b' ').collect();
    if parts.len() < FIELD_COUNT {
        return Err(FrameError::MissingField {
            expected: FIELD_COUNT,
            found: parts.len(),
        });
    }

    let ts = String::from_utf8_lossy(parts[0]);
    let timestamp_ms = ts
        .parse::<i64>()
        .map_err(|_| FrameError::BadTimestamp(ts.into_owned()))?;
    let path = std::str::from_utf8(parts[1])
        .map_err(|_| FrameError::BadPath(String::from_utf8_lossy(parts[1]).into_owned()))?;
    let content_type = std::str::from_utf8(parts[2]).map_err(|_| {
        FrameError::UnknownContentType(String::from_utf8_lossy(parts[2]).into_owned())
    })?;

    Ok(Fields {
        timestamp_ms,
        path,
        content_type,
        payload: parts[3],
    })
}

/// `(data_source_id, key)` from `/<kind>/<id>[/<key>...]`.
fn path_ids(path: &str) -> Result<(String, String), FrameError> {
    let segments: Vec<&str> = path.split('/').collect();
    let first = if path.starts_with(BLOB_PREFIX) { 3 } else { 2 };
    match segments.get(first) {
        Some(id) if !id.is_empty() => {
            let key = segments.get(first + 1).copied().unwrap_or_default();
            Ok(((*id).to_owned(), key.to_owned()))
        }
        _ => Err(FrameError::BadPath(path.to_owned())),
    }
}

/// Decode an observe frame. The content type field is not interpreted.
pub fn parse_observe_frame(frame: &[u8]) -> Result<ObserveResponse, FrameError> {
    let fields = split_fields(frame)?;
    let (data_source_id, key) = path_ids(fields.path)?;
    Ok(ObserveResponse {
        timestamp_ms: fields.timestamp_ms,
        data_source_id,
        key,
        data: fields.payload.to_vec(),
    })
}

/// Decode a notify frame, keeping the full path.
pub fn parse_notify_frame(frame: &[u8]) -> Result<NotifyResponse, FrameError> {
    let fields = split_fields(frame)?;
    if fields.path.is_empty() {
        return Err(FrameError::BadPath(String::new()));
    }
    let content_type = ContentType::from_str(fields.content_type)
        .map_err(|_| FrameError::UnknownContentType(fields.content_type.to_owned()))?;
    Ok(NotifyResponse {
        timestamp_ms: fields.timestamp_ms,
        path: fields.path.to_owned(),
        content_type,
        data: fields.payload.to_vec(),
    })
}
