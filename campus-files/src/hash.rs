use sha2::{Digest, Sha256};

/// Stable identity digest, rendered as lowercase hex. The ids derived from
/// it only have to be stable across restarts and collision-free across one
/// user's file set, so a single fixed algorithm without versioning is fine.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
