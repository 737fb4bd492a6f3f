use std::sync::Arc;

use strata_types::{Array, Compression, ContentHasher, ObjectId};
use tracing::{debug, warn};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use crate::traits::StorageProvider;

/// Content-addressed sample values on top of a provider.
///
/// A value's id is the domain-separated hash of its framed encoding, so
/// identical samples share one stored copy.
#[derive(Clone)]
pub struct SampleStore {
    provider: Arc<dyn StorageProvider>,
    verify_on_read: bool,
}

impl SampleStore {
    pub fn new(provider: Arc<dyn StorageProvider>, verify_on_read: bool) -> Self {
        Self {
            provider,
            verify_on_read,
        }
    }

    /// Encode and store a sample, returning its value id. Idempotent.
    pub fn put(&self, array: &Array, compression: Compression) -> StoreResult<ObjectId> {
        let encoded = codec::encode_sample(array, compression)?;
        let id = ContentHasher::SAMPLE.hash(&encoded);
        let key = keys::sample(&id);
        if !self.provider.exists(&key)? {
            self.provider.set(&key, &encoded)?;
            debug!(value = %id.short_hex(), bytes = encoded.len(), "stored sample");
        }
        Ok(id)
    }

    /// Load and decode a sample.
    ///
    /// Frame and CRC are always checked. With `verify_on_read` the bytes are
    /// also re-hashed against `id`.
    pub fn get(&self, id: &ObjectId) -> StoreResult<Array> {
        let key = keys::sample(id);
        let bytes = self
            .provider
            .get(&key)?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if self.verify_on_read {
            let computed = ContentHasher::SAMPLE.hash(&bytes);
            if computed != *id {
                warn!(value = %id.short_hex(), "sample hash mismatch");
                return Err(StoreError::HashMismatch { id: *id, computed });
            }
        }
        codec::decode_sample(&bytes).map_err(|e| {
            warn!(value = %id.short_hex(), error = %e, "sample failed integrity check");
            StoreError::Codec(e)
        })
    }

    pub fn contains(&self, id: &ObjectId) -> StoreResult<bool> {
        self.provider.exists(&keys::sample(id))
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("verify_on_read", &self.verify_on_read)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use crate::memory::MemoryProvider;

    fn store(verify: bool) -> (Arc<MemoryProvider>, SampleStore) {
        let provider = Arc::new(MemoryProvider::new());
        let samples = SampleStore::new(provider.clone(), verify);
        (provider, samples)
    }

    #[test]
    fn put_get_roundtrip() {
        let (_p, samples) = store(true);
        let value = Array::from_i64s(&[1, 2, 3]);
        let id = samples.put(&value, Compression::Zstd).unwrap();
        assert!(samples.contains(&id).unwrap());
        assert_eq!(samples.get(&id).unwrap(), value);
    }

    #[test]
    fn identical_values_dedup() {
        let (provider, samples) = store(true);
        let a = samples.put(&Array::scalar_i64(4), Compression::None).unwrap();
        let b = samples.put(&Array::scalar_i64(4), Compression::None).unwrap();
        assert_eq!(a, b);
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn missing_value_is_not_found() {
        let (_p, samples) = store(true);
        assert!(matches!(
            samples.get(&ObjectId::from_bytes(b"nope")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn tampered_bytes_fail_hash_check() {
        let (provider, samples) = store(true);
        let id = samples.put(&Array::scalar_i64(1), Compression::None).unwrap();
        let key = keys::sample(&id);
        let mut bytes = provider.get(&key).unwrap().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        provider.set(&key, &bytes).unwrap();
        assert!(matches!(samples.get(&id), Err(StoreError::HashMismatch { .. })));
    }

    #[test]
    fn corruption_surfaces_as_codec_error_without_hash_check() {
        let (provider, samples) = store(false);
        let id = samples.put(&Array::scalar_i64(1), Compression::None).unwrap();
        let key = keys::sample(&id);
        let mut bytes = provider.get(&key).unwrap().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        provider.set(&key, &bytes).unwrap();
        assert!(matches!(
            samples.get(&id),
            Err(StoreError::Codec(CodecError::Corrupt { .. }))
        ));
    }
}
