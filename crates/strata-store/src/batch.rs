use tracing::warn;

use crate::error::StoreResult;
use crate::traits::StorageProvider;

/// An ordered set of writes applied all-or-nothing.
///
/// Before each key is written its previous value is captured. If any write
/// fails, every key already written is restored (or deleted if it did not
/// exist), leaving the provider as it was.
#[derive(Debug, Default)]
pub struct WriteBatch {
    writes: Vec<(String, Vec<u8>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a write. Later writes to the same key win.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) -> &mut Self {
        self.writes.push((key.into(), value));
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Apply every queued write in order.
    pub fn commit(self, provider: &dyn StorageProvider) -> StoreResult<()> {
        let mut undo: Vec<(String, Option<Vec<u8>>)> = Vec::with_capacity(self.writes.len());
        for (key, value) in &self.writes {
            let step = provider
                .get(key)
                .and_then(|previous| {
                    undo.push((key.clone(), previous));
                    provider.set(key, value)
                });
            if let Err(e) = step {
                warn!(key = %key, error = %e, written = undo.len(), "batch write failed, rolling back");
                rollback(provider, undo);
                return Err(e);
            }
        }
        Ok(())
    }
}

fn rollback(provider: &dyn StorageProvider, undo: Vec<(String, Option<Vec<u8>>)>) {
    for (key, previous) in undo.into_iter().rev() {
        let restored = match previous {
            Some(bytes) => provider.set(&key, &bytes),
            None => provider.delete(&key).map(|_| ()),
        };
        if let Err(e) = restored {
            warn!(key = %key, error = %e, "rollback of key failed");
        }
    }
}
