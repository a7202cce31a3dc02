use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core store connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Request endpoint of the store this component talks to.
    #[serde(default = "d_endpoint")]
    pub endpoint: String,
    /// File holding the store transport's public key.
    #[serde(default = "d_public_key_path")]
    pub public_key_path: PathBuf,
    /// Buffer size of observe / notify channels handed to callers.
    #[serde(default = "d_64")]
    pub channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: d_endpoint(),
            public_key_path: d_public_key_path(),
            channel_capacity: 64,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_endpoint() -> String {
    "tcp://127.0.0.1:5555".into()
}
fn d_public_key_path() -> PathBuf {
    PathBuf::from("/run/secrets/ZMQ_PUBLIC_KEY")
}
fn d_64() -> usize {
    64
}
