//! In-memory reference store.
//!
//! [`InMemoryRefStore`] keeps branches in a `BTreeMap` behind a `RwLock`.
//! Datasets hold one and persist it through [`RefTable`].

use std::collections::BTreeMap;
use std::sync::RwLock;

use strata_types::ObjectId;
use tracing::debug;

use crate::error::{RefError, Result};
use crate::names::validate_branch_name;
use crate::traits::RefStore;
use crate::types::{Head, RefTable};

/// An in-memory implementation of [`RefStore`].
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    branches: RwLock<BTreeMap<String, ObjectId>>,
    head: RwLock<Option<Head>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> RefError {
    RefError::Serialization(format!("lock poisoned: {e}"))
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a persisted table.
    pub fn from_table(table: RefTable) -> Result<Self> {
        for name in table.branches.keys() {
            validate_branch_name(name)?;
        }
        if let Head::Branch(name) = &table.head {
            if !table.branches.contains_key(name) {
                return Err(RefError::NotFound { name: name.clone() });
            }
        }
        Ok(Self {
            branches: RwLock::new(table.branches),
            head: RwLock::new(Some(table.head)),
        })
    }

    /// Replace the whole state with `table`.
    pub fn restore(&self, table: RefTable) -> Result<()> {
        let RefTable { head, branches } = table;
        *self.branches.write().map_err(poisoned)? = branches;
        *self.head.write().map_err(poisoned)? = Some(head);
        Ok(())
    }
}

impl RefStore for InMemoryRefStore {
    fn branch(&self, name: &str) -> Result<Option<ObjectId>> {
        let branches = self.branches.read().map_err(poisoned)?;
        Ok(branches.get(name).copied())
    }

    fn create_branch(&self, name: &str, commit: ObjectId) -> Result<()> {
        validate_branch_name(name)?;
        let mut branches = self.branches.write().map_err(poisoned)?;
        if branches.contains_key(name) {
            return Err(RefError::AlreadyExists {
                name: name.to_string(),
            });
        }
        branches.insert(name.to_string(), commit);
        debug!(branch = name, commit = %commit.short_hex(), "created branch");
        Ok(())
    }

    fn update_branch(&self, name: &str, commit: ObjectId) -> Result<()> {
        let mut branches = self.branches.write().map_err(poisoned)?;
        let tip = branches.get_mut(name).ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })?;
        *tip = commit;
        debug!(branch = name, commit = %commit.short_hex(), "moved branch");
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<bool> {
        if let Some(Head::Branch(current)) = self.head()? {
            if current == name {
                return Err(RefError::DeleteCurrentBranch {
                    name: name.to_string(),
                });
            }
        }
        let mut branches = self.branches.write().map_err(poisoned)?;
        Ok(branches.remove(name).is_some())
    }

    fn branches(&self) -> Result<Vec<(String, ObjectId)>> {
        let branches = self.branches.read().map_err(poisoned)?;
        Ok(branches.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    fn head(&self) -> Result<Option<Head>> {
        let head = self.head.read().map_err(poisoned)?;
        Ok(head.clone())
    }

    fn set_head(&self, head: Head) -> Result<()> {
        if let Head::Branch(name) = &head {
            if self.branch(name)?.is_none() {
                return Err(RefError::NotFound { name: name.clone() });
            }
        }
        *self.head.write().map_err(poisoned)? = Some(head);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(b: u8) -> ObjectId {
        ObjectId::from_hash([b; 32])
    }

    fn store_with_main() -> InMemoryRefStore {
        let store = InMemoryRefStore::new();
        store.create_branch("main", oid(1)).unwrap();
        store.set_head(Head::Branch("main".into())).unwrap();
        store
    }

    #[test]
    fn create_and_read_branch() {
        let store = store_with_main();
        assert_eq!(store.branch("main").unwrap(), Some(oid(1)));
        assert_eq!(store.branch("missing").unwrap(), None);
        assert_eq!(store.resolve_branch("main").unwrap(), oid(1));
        assert!(matches!(
            store.resolve_branch("missing"),
            Err(RefError::NotFound { .. })
        ));
    }

    #[test]
    fn duplicate_branch_rejected() {
        let store = store_with_main();
        assert!(matches!(
            store.create_branch("main", oid(2)),
            Err(RefError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn invalid_name_rejected() {
        let store = InMemoryRefStore::new();
        assert!(matches!(
            store.create_branch("bad..name", oid(1)),
            Err(RefError::InvalidBranchName { .. })
        ));
    }

    #[test]
    fn update_moves_tip() {
        let store = store_with_main();
        store.update_branch("main", oid(2)).unwrap();
        assert_eq!(store.head_commit().unwrap(), oid(2));
        assert!(matches!(
            store.update_branch("nope", oid(2)),
            Err(RefError::NotFound { .. })
        ));
    }

    #[test]
    fn head_states() {
        let store = store_with_main();
        assert_eq!(store.current_branch().unwrap(), "main");

        store.set_head(Head::Detached(oid(9))).unwrap();
        assert!(matches!(store.current_branch(), Err(RefError::DetachedHead)));
        assert_eq!(store.head_commit().unwrap(), oid(9));

        assert!(matches!(
            store.set_head(Head::Branch("ghost".into())),
            Err(RefError::NotFound { .. })
        ));
        assert!(InMemoryRefStore::new().head_commit().is_err());
    }

    #[test]
    fn cannot_delete_current_branch() {
        let store = store_with_main();
        store.create_branch("alt", oid(1)).unwrap();
        assert!(matches!(
            store.delete_branch("main"),
            Err(RefError::DeleteCurrentBranch { .. })
        ));
        assert!(store.delete_branch("alt").unwrap());
        assert!(!store.delete_branch("alt").unwrap());
    }

    #[test]
    fn branch_info_flags_current() {
        let store = store_with_main();
        store.create_branch("feature/x", oid(3)).unwrap();
        let info = store.branch_info().unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].name, "feature/x");
        assert!(!info[0].is_current);
        assert!(info[1].is_current);
    }

    #[test]
    fn table_roundtrip() {
        let store = store_with_main();
        store.create_branch("alt", oid(4)).unwrap();
        let table = store.to_table().unwrap();

        let json = serde_json::to_string(&table).unwrap();
        let parsed: RefTable = serde_json::from_str(&json).unwrap();
        let rebuilt = InMemoryRefStore::from_table(parsed).unwrap();
        assert_eq!(rebuilt.to_table().unwrap(), table);
    }

    #[test]
    fn from_table_rejects_dangling_head() {
        let table = RefTable {
            head: Head::Branch("main".into()),
            branches: BTreeMap::new(),
        };
        assert!(InMemoryRefStore::from_table(table).is_err());
    }

    #[test]
    fn restore_replaces_state() {
        let store = store_with_main();
        let before = store.to_table().unwrap();
        store.create_branch("tmp", oid(5)).unwrap();
        store.set_head(Head::Branch("tmp".into())).unwrap();
        store.restore(before.clone()).unwrap();
        assert_eq!(store.to_table().unwrap(), before);
    }
}
