//! What a dataset writes to its provider, and how it reads it back.
//!
//! Commit records go under [`keys::COMMITS_PREFIX`]; the refs, identity
//! counters and uncommitted work of every branch go in one JSON document at
//! [`keys::VERSION_INFO`], always written last.

use std::collections::BTreeMap;
use std::error::Error;

use serde::{Deserialize, Serialize};
use strata_dag::{CommitGraph, CommitRecord, GraphError};
use strata_merge::{AppliedMerge, MergeCommitter};
use strata_refs::{InMemoryRefStore, RefStore, RefTable};
use strata_store::{keys, StorageProvider, WriteBatch};
use strata_types::{Change, IdentityTracker, ObjectId};
use tracing::{debug, info, warn};

use crate::error::{DatasetError, DatasetResult};

/// Uncommitted changes of one branch, relative to the commit they sit on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingCopy {
    pub base: ObjectId,
    pub pending: Vec<Change>,
}

/// Dataset-level version metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub refs: RefTable,
    pub identity: IdentityTracker,
    /// Branches with uncommitted changes.
    #[serde(default)]
    pub working: BTreeMap<String, WorkingCopy>,
}

impl VersionInfo {
    pub fn to_json(&self) -> DatasetResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| DatasetError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> DatasetResult<Self> {
        serde_json::from_slice(data).map_err(|e| DatasetError::Serialization(e.to_string()))
    }

    pub fn load(provider: &dyn StorageProvider) -> DatasetResult<Option<Self>> {
        provider
            .get(keys::VERSION_INFO)?
            .map(|bytes| Self::from_json(&bytes))
            .transpose()
    }
}

/// Write the records of `commits` and then `info`, all or nothing.
pub(crate) fn save(
    provider: &dyn StorageProvider,
    graph: &CommitGraph,
    commits: &[ObjectId],
    info: &VersionInfo,
) -> DatasetResult<()> {
    let mut batch = WriteBatch::new();
    for id in commits {
        let commit = graph.get(id).ok_or(GraphError::CommitNotFound(*id))?;
        batch.put(keys::commit(id), commit.record.to_json()?);
    }
    batch.put(keys::VERSION_INFO, info.to_json()?);
    let writes = batch.len();
    batch.commit(provider)?;
    debug!(commits = commits.len(), writes, "saved version info");
    Ok(())
}

/// Rebuild the commit graph from every stored record.
///
/// Records are stored by id, not in order, so parents are linked before
/// children by repeated passes. Each record's recomputed id must match the
/// key it was stored under.
pub(crate) fn load_graph(provider: &dyn StorageProvider) -> DatasetResult<CommitGraph> {
    let mut pending = Vec::new();
    for key in provider.keys(keys::COMMITS_PREFIX)? {
        let id = keys::commit_id_from_key(&key)
            .ok_or_else(|| GraphError::Corrupt(format!("unexpected key {key}")))?;
        let bytes = provider
            .get(&key)?
            .ok_or_else(|| GraphError::Corrupt(format!("record vanished: {key}")))?;
        let record = CommitRecord::from_json(&bytes)?;
        let computed = record.compute_id()?;
        if computed != id {
            warn!(key = %key, computed = %computed.short_hex(), "commit record hash mismatch");
            return Err(GraphError::Corrupt(format!(
                "record {key} hashes to {}",
                computed.to_hex()
            ))
            .into());
        }
        pending.push(record);
    }

    let mut graph = CommitGraph::new();
    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for record in pending {
            if record.parents.iter().all(|p| graph.contains(p)) {
                graph.insert_record(record)?;
            } else {
                deferred.push(record);
            }
        }
        if deferred.len() == before {
            return Err(GraphError::Corrupt(format!(
                "{} commit records reference missing parents",
                deferred.len()
            ))
            .into());
        }
        pending = deferred;
    }
    graph.validate()?;
    info!(commits = graph.len(), "loaded commit graph");
    Ok(graph)
}

/// Persists a merge: moves the current branch (and the target branch, for
/// an auto-commit), then writes the new records and version info. Refs are
/// restored if the write fails.
pub(crate) struct MergePersister<'a> {
    pub provider: &'a dyn StorageProvider,
    pub refs: &'a InMemoryRefStore,
    pub identity: &'a IdentityTracker,
    /// Working copies of other branches after the merge.
    pub stashed: BTreeMap<String, WorkingCopy>,
    pub branch: &'a str,
    pub target_branch: Option<&'a str>,
}

impl MergePersister<'_> {
    fn write(&self, graph: &CommitGraph, applied: &AppliedMerge<'_>) -> DatasetResult<()> {
        self.refs.update_branch(self.branch, applied.merge_commit)?;
        let mut commits = Vec::with_capacity(2);
        if let Some(auto) = applied.auto_commit {
            if let Some(target) = self.target_branch {
                self.refs.update_branch(target, auto)?;
            }
            commits.push(auto);
        }
        commits.push(applied.merge_commit);

        let info = VersionInfo {
            refs: self.refs.to_table()?,
            identity: self.identity.clone(),
            working: self.stashed.clone(),
        };
        save(self.provider, graph, &commits, &info)
    }
}

impl MergeCommitter for MergePersister<'_> {
    fn commit(
        &mut self,
        graph: &CommitGraph,
        applied: &AppliedMerge<'_>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let before = self.refs.to_table().map_err(DatasetError::from)?;
        if let Err(e) = self.write(graph, applied) {
            if let Err(undo) = self.refs.restore(before) {
                warn!(error = %undo, "failed to restore refs after merge");
            }
            return Err(Box::new(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_refs::Head;
    use strata_store::MemoryProvider;

    fn info(head: ObjectId) -> VersionInfo {
        VersionInfo {
            refs: RefTable {
                head: Head::Branch("main".into()),
                branches: [("main".to_string(), head)].into_iter().collect(),
            },
            identity: IdentityTracker::new(),
            working: BTreeMap::new(),
        }
    }

    #[test]
    fn save_and_load_graph() {
        let provider = MemoryProvider::new();
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();
        let child = graph.create_commit(&[root], "second", vec![]).unwrap();
        save(&provider, &graph, &[child, root], &info(child)).unwrap();

        let loaded = load_graph(&provider).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&child).unwrap().parents(), &[root]);
        assert_eq!(VersionInfo::load(&provider).unwrap(), Some(info(child)));
    }

    #[test]
    fn tampered_record_is_rejected() {
        let provider = MemoryProvider::new();
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();
        save(&provider, &graph, &[root], &info(root)).unwrap();

        let mut record = graph.get(&root).unwrap().record.clone();
        record.message = "rewritten".into();
        provider
            .set(&keys::commit(&root), &record.to_json().unwrap())
            .unwrap();
        assert!(matches!(
            load_graph(&provider),
            Err(DatasetError::Graph(GraphError::Corrupt(_)))
        ));
    }

    #[test]
    fn missing_parent_is_rejected() {
        let provider = MemoryProvider::new();
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();
        let child = graph.create_commit(&[root], "child", vec![]).unwrap();
        save(&provider, &graph, &[child], &info(child)).unwrap();
        assert!(load_graph(&provider).is_err());
    }

    #[test]
    fn missing_version_info_loads_as_none() {
        assert_eq!(VersionInfo::load(&MemoryProvider::new()).unwrap(), None);
    }
}
