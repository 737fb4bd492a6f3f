//! Commit records and sealed commits.

use serde::{Deserialize, Serialize};

use strata_types::{Change, ContentHasher, ObjectId, Snapshot};

use crate::error::{GraphError, GraphResult};

/// The hashed, persisted content of a commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// First parent is the one `changes` are relative to. Merges carry the
    /// merged-in commit second.
    pub parents: Vec<ObjectId>,
    pub message: String,
    /// Graph size when the commit was sealed. Keeps otherwise identical
    /// records (same parent, same message, no changes) distinct.
    pub seq: u64,
    pub changes: Vec<Change>,
}

impl CommitRecord {
    /// Domain-separated hash of the JSON encoding.
    pub fn compute_id(&self) -> GraphResult<ObjectId> {
        ContentHasher::COMMIT
            .hash_json(self)
            .map_err(|e| GraphError::Serialization(e.to_string()))
    }

    pub fn to_json(&self) -> GraphResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    pub fn from_json(data: &[u8]) -> GraphResult<Self> {
        serde_json::from_slice(data).map_err(|e| GraphError::Serialization(e.to_string()))
    }
}

/// A commit linked into the graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub id: ObjectId,
    /// 0 for roots, otherwise one more than the deepest parent.
    pub generation: u64,
    pub record: CommitRecord,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.record.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.record.parents.len() > 1
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.record.parents
    }

    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.record.parents.first()
    }

    pub fn message(&self) -> &str {
        &self.record.message
    }

    pub fn changes(&self) -> &[Change] {
        &self.record.changes
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "{} gen={} changes={} \"{}\"",
            self.id.short_hex(),
            self.generation,
            self.record.changes.len(),
            self.record.message,
        )
    }
}

/// A validated, hashed commit that has not been inserted yet.
#[derive(Clone, Debug)]
pub struct SealedCommit {
    pub(crate) commit: Commit,
    pub(crate) snapshot: Snapshot,
}

impl SealedCommit {
    pub fn id(&self) -> ObjectId {
        self.commit.id
    }

    pub fn commit(&self) -> &Commit {
        &self.commit
    }

    /// The tensor state the commit will have once inserted.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}
