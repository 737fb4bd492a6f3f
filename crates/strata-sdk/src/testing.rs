//! Storage doubles shared by the crate's tests.

use std::sync::atomic::{AtomicBool, Ordering};

use strata_store::{keys, MemoryProvider, StorageProvider, StoreResult};

/// Provider whose `version_info` writes fail once armed.
#[derive(Default)]
pub(crate) struct FlakyProvider {
    pub inner: MemoryProvider,
    armed: AtomicBool,
}

impl FlakyProvider {
    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }

    /// Every stored key with its bytes, in key order.
    pub fn contents(&self) -> Vec<(String, Option<Vec<u8>>)> {
        self.inner
            .keys("")
            .unwrap()
            .into_iter()
            .map(|key| {
                let value = self.inner.get(&key).unwrap();
                (key, value)
            })
            .collect()
    }
}

impl StorageProvider for FlakyProvider {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        if self.armed.load(Ordering::SeqCst) && key == keys::VERSION_INFO {
            return Err(std::io::Error::other("disk full").into());
        }
        self.inner.set(key, value)
    }
    fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key)
    }
    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key)
    }
    fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.inner.keys(prefix)
    }
    fn clear(&self) -> StoreResult<()> {
        self.inner.clear()
    }
}
