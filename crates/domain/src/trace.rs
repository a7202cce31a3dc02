use serde::Serialize;

/// Structured trace events emitted across all Databox client crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TokenFetched {
        route: String,
        method: String,
        delegated: bool,
    },
    TokenInvalidated {
        route: String,
        method: String,
    },
    ArbiterCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    StoreCall {
        op: String,
        path: String,
        ok: bool,
        duration_ms: u64,
    },
    SubscriptionOpened {
        path: String,
        mode: String,
    },
    SubscriptionClosed {
        path: String,
        frames: u64,
        cancelled: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "dbx_event");
    }
}
