use crate::error::TypeError;
use crate::object::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a commit record and a sample with identical bytes never
/// share an id.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for commit records.
    pub const COMMIT: Self = Self {
        domain: "strata-commit-v1",
    };
    /// Hasher for encoded sample values.
    pub const SAMPLE: Self = Self {
        domain: "strata-sample-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash a serializable value as JSON with domain separation.
    pub fn hash_json<T: serde::Serialize>(&self, value: &T) -> Result<ObjectId, TypeError> {
        let data =
            serde_json::to_vec(value).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(self.hash(&data))
    }

    /// Verify that data produces the expected id.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = ContentHasher::SAMPLE.hash(b"pixels");
        let b = ContentHasher::SAMPLE.hash(b"pixels");
        assert_eq!(a, b);
    }

    #[test]
    fn domains_are_separated() {
        let data = b"same content";
        assert_ne!(
            ContentHasher::COMMIT.hash(data),
            ContentHasher::SAMPLE.hash(data)
        );
        assert_ne!(ContentHasher::SAMPLE.hash(data), ObjectId::from_bytes(data));
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::SAMPLE.hash(b"original");
        assert!(ContentHasher::SAMPLE.verify(b"original", &id));
        assert!(!ContentHasher::SAMPLE.verify(b"tampered", &id));
    }

    #[test]
    fn hash_json_is_stable() {
        let value = serde_json::json!({"message": "first", "parents": []});
        let a = ContentHasher::COMMIT.hash_json(&value).unwrap();
        let b = ContentHasher::COMMIT.hash_json(&value).unwrap();
        assert_eq!(a, b);
        assert_eq!(ContentHasher::COMMIT.domain(), "strata-commit-v1");
    }
}
