use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Arbiter connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Base URL of the arbiter (token issuing) service.
    #[serde(default = "d_arbiter_url")]
    pub url: String,
    /// File holding this component's arbiter credential.
    #[serde(default = "d_token_path")]
    pub token_path: PathBuf,
    /// PEM root certificate used to verify the arbiter's TLS certificate.
    #[serde(default = "d_root_ca_path")]
    pub root_ca_path: PathBuf,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            url: d_arbiter_url(),
            token_path: d_token_path(),
            root_ca_path: d_root_ca_path(),
            timeout_ms: 10_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_arbiter_url() -> String {
    "https://arbiter:8080".into()
}
fn d_token_path() -> PathBuf {
    PathBuf::from("/run/secrets/ARBITER_TOKEN")
}
fn d_root_ca_path() -> PathBuf {
    PathBuf::from("/run/secrets/DATABOX_ROOT_CA")
}
fn d_10000() -> u64 {
    10_000
}
