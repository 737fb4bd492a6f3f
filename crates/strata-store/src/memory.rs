use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::StoreResult;
use crate::traits::StorageProvider;

/// In-memory, HashMap-based provider.
///
/// Intended for tests and embedding. Values are cloned on read and write.
pub struct MemoryProvider {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageProvider for MemoryProvider {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.entries.read().expect("lock poisoned");
        let mut keys: Vec<String> = map
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> StoreResult<()> {
        self.entries.write().expect("lock poisoned").clear();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_roundtrip() {
        let provider = MemoryProvider::new();
        provider.set("a/b", b"value").unwrap();
        assert_eq!(provider.get("a/b").unwrap(), Some(b"value".to_vec()));
        assert_eq!(provider.get("missing").unwrap(), None);
    }

    #[test]
    fn set_overwrites() {
        let provider = MemoryProvider::new();
        provider.set("k", b"one").unwrap();
        provider.set("k", b"two").unwrap();
        assert_eq!(provider.get("k").unwrap(), Some(b"two".to_vec()));
        assert_eq!(provider.len(), 1);
        assert_eq!(provider.total_bytes(), 3);
    }

    #[test]
    fn exists_and_delete() {
        let provider = MemoryProvider::new();
        provider.set("k", b"v").unwrap();
        assert!(provider.exists("k").unwrap());
        assert!(provider.delete("k").unwrap());
        assert!(!provider.delete("k").unwrap());
        assert!(!provider.exists("k").unwrap());
    }

    #[test]
    fn keys_filter_by_prefix_sorted() {
        let provider = MemoryProvider::new();
        for key in ["versions/b", "samples/x", "versions/a"] {
            provider.set(key, b"").unwrap();
        }
        assert_eq!(
            provider.keys("versions/").unwrap(),
            vec!["versions/a".to_string(), "versions/b".to_string()]
        );
        assert_eq!(provider.keys("").unwrap().len(), 3);
    }

    #[test]
    fn clear_removes_everything() {
        let provider = MemoryProvider::new();
        provider.set("a", b"1").unwrap();
        provider.set("b", b"2").unwrap();
        provider.clear().unwrap();
        assert!(provider.is_empty());
    }

    #[test]
    fn set_many_writes_in_order() {
        let provider = MemoryProvider::new();
        provider
            .set_many(&[("k".into(), b"1".to_vec()), ("k".into(), b"2".to_vec())])
            .unwrap();
        assert_eq!(provider.get("k").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn debug_shows_count() {
        let provider = MemoryProvider::new();
        provider.set("k", b"v").unwrap();
        assert!(format!("{provider:?}").contains("key_count: 1"));
    }
}
