use crate::error::StoreResult;

/// Flat key-value storage backing a dataset.
///
/// Keys are `/`-separated relative paths (see [`crate::keys`]). Providers
/// never interpret values.
pub trait StorageProvider: Send + Sync {
    /// Read the value under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Delete `key`. Returns `true` if it existed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Sorted keys starting with `prefix`.
    fn keys(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Remove every key.
    fn clear(&self) -> StoreResult<()>;

    /// Write several keys. The default calls `set` for each one in order;
    /// use [`crate::WriteBatch`] when a failure must be rolled back.
    fn set_many(&self, entries: &[(String, Vec<u8>)]) -> StoreResult<()> {
        entries.iter().try_for_each(|(k, v)| self.set(k, v))
    }
}
