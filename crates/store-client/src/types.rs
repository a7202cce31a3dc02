//! Records delivered by subscriptions.

use dbx_domain::ContentType;

/// One frame from an observe subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveResponse {
    /// Milliseconds since the Unix epoch, as stamped by the store.
    pub timestamp_ms: i64,
    pub data_source_id: String,
    /// Empty when the path has no key segment.
    pub key: String,
    pub data: Vec<u8>,
}

impl ObserveResponse {
    /// Wrap an unparsed frame (notification-mode observations).
    pub fn raw(data: Vec<u8>) -> Self {
        Self {
            timestamp_ms: 0,
            data_source_id: String::new(),
            key: String::new(),
            data,
        }
    }

    /// Timestamp as a UTC datetime, if it is in range.
    pub fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp_ms)
    }
}

/// The single frame delivered by a notify subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyResponse {
    pub timestamp_ms: i64,
    /// Full source path, e.g. `/notification/response/lookup/<job>`.
    pub path: String,
    pub content_type: ContentType,
    pub data: Vec<u8>,
}
