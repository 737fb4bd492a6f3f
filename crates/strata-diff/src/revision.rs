use std::sync::Arc;

use strata_dag::CommitGraph;
use strata_types::{Change, ObjectId, Snapshot};

use crate::error::{DiffError, DiffResult};

/// A point to diff against: a sealed commit, optionally with uncommitted
/// changes layered on top.
#[derive(Clone, Debug)]
pub struct Revision {
    commit: ObjectId,
    snapshot: Arc<Snapshot>,
    pending: Vec<Change>,
}

impl Revision {
    /// The commit exactly as sealed.
    pub fn sealed(graph: &CommitGraph, commit: ObjectId) -> DiffResult<Self> {
        Ok(Self {
            commit,
            snapshot: graph.snapshot(&commit)?,
            pending: Vec::new(),
        })
    }

    /// The commit with `pending` replayed on top.
    pub fn with_pending(
        graph: &CommitGraph,
        commit: ObjectId,
        pending: Vec<Change>,
    ) -> DiffResult<Self> {
        let base = graph.snapshot(&commit)?;
        if pending.is_empty() {
            return Ok(Self {
                commit,
                snapshot: base,
                pending,
            });
        }
        let mut snapshot = (*base).clone();
        snapshot
            .apply_all(&pending)
            .map_err(DiffError::InvalidOverlay)?;
        Ok(Self {
            commit,
            snapshot: Arc::new(snapshot),
            pending,
        })
    }

    /// Assemble from a snapshot the caller already keeps in sync with
    /// `commit` + `pending`.
    pub fn from_parts(commit: ObjectId, snapshot: Arc<Snapshot>, pending: Vec<Change>) -> Self {
        Self {
            commit,
            snapshot,
            pending,
        }
    }

    pub fn commit(&self) -> ObjectId {
        self.commit
    }

    /// State including pending changes.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn snapshot_arc(&self) -> Arc<Snapshot> {
        self.snapshot.clone()
    }

    pub fn pending(&self) -> &[Change] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{TensorId, TensorMeta};

    #[test]
    fn overlay_replays_pending() {
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();

        let sealed = Revision::sealed(&graph, root).unwrap();
        assert!(sealed.snapshot().is_empty());
        assert!(!sealed.has_pending());

        let pending = vec![Change::CreateTensor {
            tensor: TensorId(0),
            name: "labels".into(),
            meta: TensorMeta::default(),
        }];
        let rev = Revision::with_pending(&graph, root, pending).unwrap();
        assert_eq!(rev.commit(), root);
        assert!(rev.snapshot().by_name("labels").is_some());
        assert_eq!(rev.pending().len(), 1);
        // The cached commit snapshot is untouched.
        assert!(graph.snapshot(&root).unwrap().is_empty());
    }

    #[test]
    fn invalid_overlay_is_rejected() {
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();
        let pending = vec![Change::DeleteTensor { tensor: TensorId(3) }];
        assert!(matches!(
            Revision::with_pending(&graph, root, pending),
            Err(DiffError::InvalidOverlay(_))
        ));
    }
}
