//! Webhook signing secret derivation.
//!
//! The gateway and the remote listener share a signing secret that is never
//! transmitted: both sides derive it from the instance identifier and the
//! instance encryption key. Derivation is a pure function, recomputed on
//! every run.

use sha2::{Digest, Sha256};

/// Length of the derived secret in hex characters.
const SECRET_LEN: usize = 32;

/// Derive the shared webhook signing secret from the instance identifier
/// and encryption key.
///
/// Computes SHA-256 over `instance_id + encryption_key` and keeps the first
/// 32 hex characters of the digest. Deterministic and side-effect free.
/// Empty inputs are permitted and produce a degenerate but well-defined
/// secret; production callers are expected to supply non-empty values.
pub fn derive_secret(instance_id: &str, encryption_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(instance_id.as_bytes());
    hasher.update(encryption_key.as_bytes());
    let digest = hasher.finalize();

    let mut secret = hex::encode(digest);
    secret.truncate(SECRET_LEN);
    secret
}
