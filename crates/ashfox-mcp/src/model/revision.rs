//! Revision tokens derived from the normalized state.
//!
//! A revision is the truncated SHA-256 of the canonical JSON form of the
//! state, with bookkeeping fields stripped so only semantic changes move it.

use sha2::{Digest, Sha256};

use super::project::ProjectState;
use crate::export::json::canonical_string;

/// Hex SHA-256 of arbitrary bytes.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compute the revision of a normalized state.
#[must_use]
pub fn compute_revision(state: &ProjectState) -> String {
    let mut value = serde_json::to_value(state).unwrap_or_default();
    if let Some(map) = value.as_object_mut() {
        // the dirty flag tracks unsaved-changes bookkeeping, not semantics
        map.remove("dirty");
    }
    let canonical = canonical_string(&value);
    sha256_hex(canonical.as_bytes())[..16].to_string()
}
