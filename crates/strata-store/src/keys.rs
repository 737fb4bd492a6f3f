//! Key layout shared by every provider.
//!
//! ```text
//! version_control_info.json         refs, identity counters, stashed working copies
//! versions/commits/<commit hex>     commit records (JSON)
//! samples/<value hex>               framed sample values
//! ```

use strata_types::ObjectId;

/// Dataset-level version metadata. Written last by every persisting step.
pub const VERSION_INFO: &str = "version_control_info.json";

pub const COMMITS_PREFIX: &str = "versions/commits/";

pub const SAMPLES_PREFIX: &str = "samples/";

pub fn commit(id: &ObjectId) -> String {
    format!("{COMMITS_PREFIX}{}", id.to_hex())
}

pub fn sample(id: &ObjectId) -> String {
    format!("{SAMPLES_PREFIX}{}", id.to_hex())
}

/// Parse the commit id out of a key under [`COMMITS_PREFIX`].
pub fn commit_id_from_key(key: &str) -> Option<ObjectId> {
    key.strip_prefix(COMMITS_PREFIX)
        .and_then(|hex| ObjectId::from_hex(hex).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_key_roundtrip() {
        let id = ObjectId::from_bytes(b"c");
        let key = commit(&id);
        assert!(key.starts_with(COMMITS_PREFIX));
        assert_eq!(commit_id_from_key(&key), Some(id));
        assert_eq!(commit_id_from_key(&sample(&id)), None);
    }
}
