//! National ID handling: hashing for the dedup index and masking for logs.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a national ID, used as the indexed dedup key.
pub fn hash_national_id(national_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(national_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Mask a national ID for logs, keeping at most its last two characters.
///
/// IDs of four characters or fewer are masked entirely.
pub fn mask_national_id(national_id: &str) -> String {
    let len = national_id.chars().count();
    if len <= 4 {
        return "*".repeat(len.max(1));
    }

    let tail: String = national_id.chars().skip(len - 2).collect();
    format!("{}{tail}", "*".repeat(len - 2))
}
