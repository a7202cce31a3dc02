//! Credential and key loading.
//!
//! The container manager mounts secrets as files. Each is read once at
//! client construction. A missing file never aborts construction: the
//! caller gets a documented fallback and a warning in the log, which keeps
//! the clients usable for local development and tests.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Development key used when the store's public key file is absent.
pub const DEFAULT_STORE_PUBLIC_KEY: &str = "vl6wu0A@XP?}Or/&BR#LSxn>A+}L)p44/W[wXL3<";

/// Read the arbiter credential and return it base64-encoded, ready for the
/// `X-Api-Key` header. `None` when the file cannot be read or is empty.
pub fn read_arbiter_key(path: &Path) -> Option<String> {
    match std::fs::read(path) {
        Ok(raw) if raw.is_empty() => {
            tracing::warn!(
                path = %path.display(),
                "arbiter token file is empty, arbiter requests run unauthenticated"
            );
            None
        }
        Ok(raw) => Some(STANDARD.encode(raw)),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read arbiter token, arbiter requests run unauthenticated"
            );
            None
        }
    }
}

/// Read the store transport's public key, or the development default.
pub fn read_store_public_key(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(key) => key.trim_end().to_owned(),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read store public key, using default value"
            );
            DEFAULT_STORE_PUBLIC_KEY.to_owned()
        }
    }
}

/// Read the PEM root certificate. `None` means certificates are not pinned.
pub fn read_root_ca(path: &Path) -> Option<Vec<u8>> {
    match std::fs::read(path) {
        Ok(pem) => Some(pem),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read root certificate, certs will not be pinned"
            );
            None
        }
    }
}
