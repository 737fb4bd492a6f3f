//! The commit graph and its traversal algorithms.
//!
//! [`CommitGraph`] stores commits in a [`HashMap`] and keeps a forward-edge
//! index (`children`) plus the list of roots. Snapshots are materialized on
//! demand by replaying the first-parent chain and cached per commit.
//!
//! # Invariants
//!
//! - The graph is acyclic: a commit can only be inserted after its parents.
//! - Every parent reference resolves to an existing commit.
//! - Every commit's changes replay cleanly onto its first parent's snapshot.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use tracing::debug;

use strata_types::{Change, ObjectId, Snapshot};

use crate::commit::{Commit, CommitRecord, SealedCommit};
use crate::error::{GraphError, GraphResult};

/// Directed acyclic graph of dataset commits.
#[derive(Debug, Default)]
pub struct CommitGraph {
    commits: HashMap<ObjectId, Commit>,
    /// Forward-edge index: parent -> children.
    children: HashMap<ObjectId, Vec<ObjectId>>,
    roots: Vec<ObjectId>,
    snapshots: RwLock<HashMap<ObjectId, Arc<Snapshot>>>,
}

impl Clone for CommitGraph {
    fn clone(&self) -> Self {
        Self {
            commits: self.commits.clone(),
            children: self.children.clone(),
            roots: self.roots.clone(),
            snapshots: RwLock::new(self.snapshots.read().expect("lock poisoned").clone()),
        }
    }
}

impl CommitGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of commits.
    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.commits.contains_key(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&Commit> {
        self.commits.get(id)
    }

    fn require(&self, id: &ObjectId) -> GraphResult<&Commit> {
        self.commits.get(id).ok_or(GraphError::CommitNotFound(*id))
    }

    /// Commits without parents.
    pub fn roots(&self) -> Vec<&Commit> {
        self.roots
            .iter()
            .filter_map(|id| self.commits.get(id))
            .collect()
    }

    /// Direct children of a commit.
    pub fn children(&self, id: &ObjectId) -> &[ObjectId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    // ---------------------------------------------------------------
    // Sealing
    // ---------------------------------------------------------------

    /// Validate and hash a commit without inserting it.
    ///
    /// `changes` must replay onto the first parent's snapshot (or the empty
    /// snapshot for a root). A revived tensor must be live in one of the
    /// other parents.
    pub fn prepare(
        &self,
        parents: &[ObjectId],
        message: impl Into<String>,
        changes: Vec<Change>,
    ) -> GraphResult<SealedCommit> {
        if parents.len() > 2 {
            return Err(GraphError::InvalidParents(format!(
                "expected at most 2 parents, got {}",
                parents.len()
            )));
        }
        if parents.len() == 2 && parents[0] == parents[1] {
            return Err(GraphError::InvalidParents("parents must be distinct".into()));
        }
        let mut generation = 0;
        for parent in parents {
            generation = generation.max(self.require(parent)?.generation + 1);
        }

        let mut snapshot = match parents.first() {
            Some(first) => (*self.snapshot(first)?).clone(),
            None => Snapshot::new(),
        };
        snapshot
            .apply_all(&changes)
            .map_err(|source| GraphError::InvalidChanges { source })?;

        // Revived and aliased ids must come from a merged-in parent.
        for change in &changes {
            let tensor = match change {
                Change::ReviveTensor { state } => state.id,
                Change::AliasTensor { alias, .. } => *alias,
                _ => continue,
            };
            let mut reachable = false;
            for other in parents.iter().skip(1) {
                if self.snapshot(other)?.knows(tensor) {
                    reachable = true;
                }
            }
            if !reachable {
                return Err(GraphError::UnreachableTensor { tensor });
            }
        }

        let record = CommitRecord {
            parents: parents.to_vec(),
            message: message.into(),
            seq: self.commits.len() as u64,
            changes,
        };
        let id = record.compute_id()?;
        if self.commits.contains_key(&id) {
            return Err(GraphError::DuplicateCommit(id));
        }

        Ok(SealedCommit {
            commit: Commit {
                id,
                generation,
                record,
            },
            snapshot,
        })
    }

    /// Link a sealed commit into the graph.
    pub fn insert(&mut self, sealed: SealedCommit) -> GraphResult<ObjectId> {
        let SealedCommit { commit, snapshot } = sealed;
        let id = commit.id;
        self.link(commit)?;
        self.snapshots
            .write()
            .expect("lock poisoned")
            .insert(id, Arc::new(snapshot));
        Ok(id)
    }

    /// Seal and insert in one step.
    pub fn create_commit(
        &mut self,
        parents: &[ObjectId],
        message: impl Into<String>,
        changes: Vec<Change>,
    ) -> GraphResult<ObjectId> {
        let sealed = self.prepare(parents, message, changes)?;
        self.insert(sealed)
    }

    /// Insert a persisted record, recomputing its id.
    ///
    /// The snapshot is not replayed here; `snapshot` or `validate` will
    /// surface a record whose changes do not apply.
    pub fn insert_record(&mut self, record: CommitRecord) -> GraphResult<ObjectId> {
        let id = record.compute_id()?;
        let mut generation = 0;
        for parent in &record.parents {
            let parent_commit = self.commits.get(parent).ok_or(GraphError::DanglingParent {
                commit: id,
                parent: *parent,
            })?;
            generation = generation.max(parent_commit.generation + 1);
        }
        self.link(Commit {
            id,
            generation,
            record,
        })?;
        Ok(id)
    }

    fn link(&mut self, commit: Commit) -> GraphResult<()> {
        if self.commits.contains_key(&commit.id) {
            return Err(GraphError::DuplicateCommit(commit.id));
        }
        for parent in commit.parents() {
            if !self.commits.contains_key(parent) {
                return Err(GraphError::DanglingParent {
                    commit: commit.id,
                    parent: *parent,
                });
            }
        }
        for parent in commit.parents() {
            self.children.entry(*parent).or_default().push(commit.id);
        }
        if commit.is_root() {
            self.roots.push(commit.id);
        }
        debug!(
            commit = %commit.id.short_hex(),
            generation = commit.generation,
            parents = commit.parents().len(),
            "added commit"
        );
        self.commits.insert(commit.id, commit);
        Ok(())
    }

    /// Remove a commit that has no children. Used to undo an insert whose
    /// persistence failed.
    pub fn remove_leaf(&mut self, id: &ObjectId) -> GraphResult<Commit> {
        if !self.children(id).is_empty() {
            return Err(GraphError::HasChildren(*id));
        }
        let commit = self
            .commits
            .remove(id)
            .ok_or(GraphError::CommitNotFound(*id))?;
        for parent in commit.parents() {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|c| c != id);
            }
        }
        self.children.remove(id);
        self.roots.retain(|r| r != id);
        self.snapshots.write().expect("lock poisoned").remove(id);
        debug!(commit = %id.short_hex(), "removed leaf commit");
        Ok(commit)
    }

    // ---------------------------------------------------------------
    // Snapshots
    // ---------------------------------------------------------------

    /// The full tensor state at a commit.
    pub fn snapshot(&self, id: &ObjectId) -> GraphResult<Arc<Snapshot>> {
        if let Some(cached) = self.snapshots.read().expect("lock poisoned").get(id) {
            return Ok(cached.clone());
        }

        // Walk first parents back to the nearest cached snapshot or a root.
        let mut chain = Vec::new();
        let mut current = *id;
        let mut state = loop {
            if let Some(cached) = self.snapshots.read().expect("lock poisoned").get(&current) {
                break (**cached).clone();
            }
            let commit = self.require(&current)?;
            chain.push(commit);
            match commit.first_parent() {
                Some(parent) => current = *parent,
                None => break Snapshot::new(),
            }
        };

        let mut result = None;
        for commit in chain.into_iter().rev() {
            state
                .apply_all(commit.changes())
                .map_err(|source| GraphError::InvalidChanges { source })?;
            let materialized = Arc::new(state.clone());
            self.snapshots
                .write()
                .expect("lock poisoned")
                .insert(commit.id, materialized.clone());
            result = Some(materialized);
        }
        // The loop ran at least once, otherwise the cache lookup above hit.
        result.ok_or(GraphError::CommitNotFound(*id))
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// All ancestors of a commit (BFS upward), excluding the commit itself.
    pub fn ancestors(&self, id: &ObjectId) -> Vec<&Commit> {
        let Some(start) = self.commits.get(id) else {
            return Vec::new();
        };
        let mut visited = HashSet::new();
        visited.insert(*id);
        let mut queue: VecDeque<&ObjectId> = start.parents().iter().collect();
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            if !visited.insert(*current) {
                continue;
            }
            if let Some(commit) = self.commits.get(current) {
                result.push(commit);
                queue.extend(commit.parents().iter());
            }
        }
        result
    }

    /// Ancestors of a commit including the commit itself.
    pub fn ancestor_set(&self, id: &ObjectId) -> HashSet<ObjectId> {
        let mut visited = HashSet::new();
        if !self.commits.contains_key(id) {
            return visited;
        }
        let mut queue = VecDeque::new();
        visited.insert(*id);
        queue.push_back(*id);
        while let Some(current) = queue.pop_front() {
            if let Some(commit) = self.commits.get(&current) {
                for parent in commit.parents() {
                    if visited.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
        }
        visited
    }

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    pub fn is_ancestor(&self, ancestor: &ObjectId, descendant: &ObjectId) -> bool {
        self.ancestor_set(descendant).contains(ancestor)
    }

    /// Lowest common ancestor of two commits.
    ///
    /// Among the commits reachable from both, picks the one with the highest
    /// generation, breaking ties by the smaller id. `None` means the two
    /// histories share nothing and the empty snapshot is the merge base.
    pub fn lowest_common_ancestor(
        &self,
        a: &ObjectId,
        b: &ObjectId,
    ) -> GraphResult<Option<ObjectId>> {
        self.require(a)?;
        self.require(b)?;
        if a == b {
            return Ok(Some(*a));
        }
        let ancestors_a = self.ancestor_set(a);
        let ancestors_b = self.ancestor_set(b);
        let lca = ancestors_a
            .intersection(&ancestors_b)
            .filter_map(|id| self.commits.get(id))
            .max_by_key(|c| (c.generation, Reverse(c.id)))
            .map(|c| c.id);
        debug!(
            a = %a.short_hex(),
            b = %b.short_hex(),
            lca = ?lca.map(|id| id.short_hex()),
            "computed lowest common ancestor"
        );
        Ok(lca)
    }

    /// Commits reachable from `head` but not from `base`, newest first.
    ///
    /// With no base every ancestor of `head` (and `head`) is returned.
    pub fn exclusive_ancestors(
        &self,
        head: &ObjectId,
        base: Option<&ObjectId>,
    ) -> GraphResult<Vec<&Commit>> {
        self.require(head)?;
        let excluded = match base {
            Some(base) => {
                self.require(base)?;
                self.ancestor_set(base)
            }
            None => HashSet::new(),
        };
        let mut result: Vec<&Commit> = self
            .ancestor_set(head)
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .filter_map(|id| self.commits.get(&id))
            .collect();
        result.sort_by_key(|c| (Reverse(c.generation), c.id));
        Ok(result)
    }

    /// First-parent history from `id` back to its root, newest first.
    pub fn history(&self, id: &ObjectId) -> GraphResult<Vec<&Commit>> {
        let mut result = Vec::new();
        let mut current = Some(self.require(id)?);
        while let Some(commit) = current {
            result.push(commit);
            current = match commit.first_parent() {
                Some(parent) => Some(self.require(parent)?),
                None => None,
            };
        }
        Ok(result)
    }

    /// Resolve a full or abbreviated hex id.
    pub fn find_by_prefix(&self, prefix: &str) -> GraphResult<Option<ObjectId>> {
        if let Ok(id) = ObjectId::from_hex(prefix) {
            return Ok(self.commits.contains_key(&id).then_some(id));
        }
        let matches: Vec<ObjectId> = self
            .commits
            .keys()
            .filter(|id| id.matches_prefix(prefix))
            .copied()
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0])),
            count => Err(GraphError::AmbiguousPrefix {
                prefix: prefix.to_string(),
                count,
            }),
        }
    }

    // ---------------------------------------------------------------
    // Topological sort
    // ---------------------------------------------------------------

    /// All commits with parents before children.
    ///
    /// Kahn's algorithm; ready commits are taken in (generation, id) order so
    /// the output is deterministic.
    pub fn topological_order(&self) -> Vec<&Commit> {
        let mut in_degree: HashMap<ObjectId, usize> = self
            .commits
            .values()
            .map(|c| (c.id, c.parents().len()))
            .collect();

        let mut ready: Vec<&Commit> = self
            .commits
            .values()
            .filter(|c| c.parents().is_empty())
            .collect();
        let mut result = Vec::with_capacity(self.commits.len());

        while !ready.is_empty() {
            ready.sort_by_key(|c| Reverse((c.generation, c.id)));
            let Some(commit) = ready.pop() else {
                break;
            };
            result.push(commit);
            for child in self.children(&commit.id) {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        if let Some(c) = self.commits.get(child) {
                            ready.push(c);
                        }
                    }
                }
            }
        }
        result
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Check structural invariants and that every commit replays.
    pub fn validate(&self) -> GraphResult<()> {
        for commit in self.commits.values() {
            let mut expected_generation = 0;
            for parent in commit.parents() {
                let parent_commit =
                    self.commits
                        .get(parent)
                        .ok_or(GraphError::DanglingParent {
                            commit: commit.id,
                            parent: *parent,
                        })?;
                expected_generation = expected_generation.max(parent_commit.generation + 1);
            }
            if commit.generation != expected_generation {
                return Err(GraphError::Corrupt(format!(
                    "commit {} has generation {}, expected {expected_generation}",
                    commit.id.short_hex(),
                    commit.generation
                )));
            }
            if commit.record.compute_id()? != commit.id {
                return Err(GraphError::Corrupt(format!(
                    "commit {} does not hash to its id",
                    commit.id.short_hex()
                )));
            }
        }
        for root in &self.roots {
            if self.commits.get(root).is_some_and(|c| !c.is_root()) {
                return Err(GraphError::Corrupt(format!(
                    "{} listed as root but has parents",
                    root.short_hex()
                )));
            }
        }
        if self.topological_order().len() != self.commits.len() {
            return Err(GraphError::Corrupt("cycle detected".into()));
        }
        for id in self.commits.keys() {
            self.snapshot(id)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Serialization helpers
    // ---------------------------------------------------------------

    /// Records in topological order.
    pub fn records(&self) -> Vec<&CommitRecord> {
        self.topological_order()
            .into_iter()
            .map(|c| &c.record)
            .collect()
    }

    /// Serialize every commit record to bincode bytes.
    pub fn to_bytes(&self) -> GraphResult<Vec<u8>> {
        bincode::serialize(&self.records()).map_err(|e| GraphError::Serialization(e.to_string()))
    }

    /// Rebuild a graph from [`CommitGraph::to_bytes`] output.
    pub fn from_bytes(data: &[u8]) -> GraphResult<Self> {
        let records: Vec<CommitRecord> =
            bincode::deserialize(data).map_err(|e| GraphError::Serialization(e.to_string()))?;
        let mut graph = Self::new();
        for record in records {
            graph.insert_record(record)?;
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use strata_types::{SampleId, TensorId, TensorMeta};

    fn val(b: u8) -> ObjectId {
        ObjectId::from_hash([b; 32])
    }

    fn create(id: u64, name: &str) -> Change {
        Change::CreateTensor {
            tensor: TensorId(id),
            name: name.into(),
            meta: TensorMeta::default(),
        }
    }

    fn append(t: u64, s: u64) -> Change {
        Change::Append {
            tensor: TensorId(t),
            sample: SampleId(s),
            value: val(s as u8),
        }
    }

    /// root -> a -> b
    fn build_linear_graph() -> (CommitGraph, [ObjectId; 3]) {
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();
        let a = graph
            .create_commit(&[root], "labels", vec![create(0, "labels"), append(0, 0)])
            .unwrap();
        let b = graph.create_commit(&[a], "more", vec![append(0, 1)]).unwrap();
        (graph, [root, a, b])
    }

    /// root -> left, root -> right, (left, right) -> merge
    fn build_diamond_graph() -> (CommitGraph, [ObjectId; 4]) {
        let mut graph = CommitGraph::new();
        let root = graph
            .create_commit(&[], "initial commit", vec![create(0, "labels")])
            .unwrap();
        let left = graph.create_commit(&[root], "left", vec![append(0, 1)]).unwrap();
        let right = graph.create_commit(&[root], "right", vec![append(0, 2)]).unwrap();
        let merge = graph
            .create_commit(&[left, right], "merge", vec![append(0, 2)])
            .unwrap();
        (graph, [root, left, right, merge])
    }

    // ----------------------------------------------------------
    // Construction
    // ----------------------------------------------------------

    #[test]
    fn empty_graph() {
        let graph = CommitGraph::new();
        assert!(graph.is_empty());
        assert!(graph.roots().is_empty());
        assert!(graph.topological_order().is_empty());
    }

    #[test]
    fn linear_structure() {
        let (graph, [root, a, b]) = build_linear_graph();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.roots()[0].id, root);
        assert_eq!(graph.get(&b).unwrap().generation, 2);
        assert_eq!(graph.children(&root), &[a]);
    }

    #[test]
    fn identical_empty_commits_get_distinct_ids() {
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();
        let x = graph.create_commit(&[root], "commit", vec![]).unwrap();
        let y = graph.create_commit(&[root], "commit", vec![]).unwrap();
        assert_ne!(x, y);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let mut graph = CommitGraph::new();
        let result = graph.create_commit(&[val(99)], "orphan", vec![]);
        assert!(matches!(result, Err(GraphError::CommitNotFound(_))));
    }

    #[test]
    fn parent_rules() {
        let (mut graph, [root, a, b]) = build_linear_graph();
        assert!(matches!(
            graph.create_commit(&[a, a], "dup", vec![]),
            Err(GraphError::InvalidParents(_))
        ));
        assert!(matches!(
            graph.create_commit(&[root, a, b], "octopus", vec![]),
            Err(GraphError::InvalidParents(_))
        ));
    }

    #[test]
    fn changes_must_replay_onto_first_parent() {
        let (mut graph, [root, _a, b]) = build_linear_graph();
        // Tensor 0 does not exist at root.
        let result = graph.create_commit(&[root], "bad", vec![append(0, 5)]);
        assert!(matches!(result, Err(GraphError::InvalidChanges { .. })));
        // Sample 1 already exists at b.
        let result = graph.create_commit(&[b], "dup", vec![append(0, 1)]);
        assert!(matches!(result, Err(GraphError::InvalidChanges { .. })));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn revive_requires_state_from_second_parent() {
        let (mut graph, [_root, a, b]) = build_linear_graph();
        let deleted = graph
            .create_commit(&[a], "drop", vec![Change::DeleteTensor { tensor: TensorId(0) }])
            .unwrap();
        let state = graph.snapshot(&b).unwrap().get(TensorId(0)).unwrap().clone();

        let revive = vec![Change::ReviveTensor { state }];
        assert!(matches!(
            graph.create_commit(&[deleted], "revive alone", revive.clone()),
            Err(GraphError::UnreachableTensor { .. })
        ));
        let merged = graph.create_commit(&[deleted, b], "revive", revive).unwrap();
        assert_eq!(graph.snapshot(&merged).unwrap().get(TensorId(0)).unwrap().len(), 2);
    }

    #[test]
    fn alias_requires_tensor_from_second_parent() {
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "initial commit", vec![]).unwrap();
        let left = graph
            .create_commit(&[root], "left", vec![create(0, "xyz"), append(0, 0)])
            .unwrap();
        let right = graph
            .create_commit(&[root], "right", vec![create(7, "xyz"), append(7, 1)])
            .unwrap();
        let fold = vec![
            append(0, 1),
            Change::AliasTensor {
                alias: TensorId(7),
                tensor: TensorId(0),
            },
        ];

        assert!(matches!(
            graph.create_commit(&[left], "alias alone", fold.clone()),
            Err(GraphError::UnreachableTensor { tensor: TensorId(7) })
        ));
        let merged = graph.create_commit(&[left, right], "fold", fold).unwrap();
        let snapshot = graph.snapshot(&merged).unwrap();
        assert_eq!(snapshot.alias_of(TensorId(7)), Some(TensorId(0)));
        assert_eq!(snapshot.get(TensorId(0)).unwrap().len(), 2);
    }

    #[test]
    fn prepare_does_not_mutate() {
        let (graph, [_root, _a, b]) = build_linear_graph();
        let sealed = graph.prepare(&[b], "pending", vec![append(0, 7)]).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(!graph.contains(&sealed.id()));
        assert_eq!(sealed.snapshot().get(TensorId(0)).unwrap().len(), 3);
    }

    #[test]
    fn remove_leaf_only() {
        let (mut graph, [_root, a, b]) = build_linear_graph();
        assert!(matches!(graph.remove_leaf(&a), Err(GraphError::HasChildren(_))));
        graph.remove_leaf(&b).unwrap();
        assert!(!graph.contains(&b));
        assert!(graph.children(&a).is_empty());
        graph.validate().unwrap();
    }

    // ----------------------------------------------------------
    // Snapshots
    // ----------------------------------------------------------

    #[test]
    fn snapshot_replays_first_parent_chain() {
        let (graph, [root, a, b]) = build_linear_graph();
        assert!(graph.snapshot(&root).unwrap().is_empty());
        assert_eq!(graph.snapshot(&a).unwrap().by_name("labels").unwrap().len(), 1);
        assert_eq!(graph.snapshot(&b).unwrap().by_name("labels").unwrap().len(), 2);
    }

    #[test]
    fn snapshot_survives_byte_roundtrip_without_cache() {
        let (graph, [_root, _left, _right, merge]) = build_diamond_graph();
        let rebuilt = CommitGraph::from_bytes(&graph.to_bytes().unwrap()).unwrap();
        assert_eq!(rebuilt.len(), 4);
        let labels = rebuilt.snapshot(&merge).unwrap();
        let ids: Vec<SampleId> = labels.by_name("labels").unwrap().sample_ids().collect();
        assert_eq!(ids, vec![SampleId(1), SampleId(2)]);
        rebuilt.validate().unwrap();
    }

    // ----------------------------------------------------------
    // Ancestry
    // ----------------------------------------------------------

    #[test]
    fn ancestors_exclude_self() {
        let (graph, [root, a, b]) = build_linear_graph();
        assert!(graph.ancestors(&root).is_empty());
        let ids: HashSet<ObjectId> = graph.ancestors(&b).iter().map(|c| c.id).collect();
        assert_eq!(ids, HashSet::from([root, a]));
        assert!(graph.is_ancestor(&root, &b));
        assert!(graph.is_ancestor(&b, &b));
        assert!(!graph.is_ancestor(&b, &a));
    }

    #[test]
    fn lca_linear_and_diamond() {
        let (graph, [root, a, b]) = build_linear_graph();
        assert_eq!(graph.lowest_common_ancestor(&a, &b).unwrap(), Some(a));
        assert_eq!(graph.lowest_common_ancestor(&b, &b).unwrap(), Some(b));
        assert_eq!(graph.lowest_common_ancestor(&root, &b).unwrap(), Some(root));

        let (graph, [root, left, right, merge]) = build_diamond_graph();
        assert_eq!(graph.lowest_common_ancestor(&left, &right).unwrap(), Some(root));
        assert_eq!(graph.lowest_common_ancestor(&merge, &right).unwrap(), Some(right));
    }

    #[test]
    fn lca_of_disjoint_histories_is_none() {
        let mut graph = CommitGraph::new();
        let x = graph.create_commit(&[], "x", vec![]).unwrap();
        let y = graph.create_commit(&[], "y", vec![]).unwrap();
        assert_eq!(graph.lowest_common_ancestor(&x, &y).unwrap(), None);
        assert!(matches!(
            graph.lowest_common_ancestor(&x, &val(1)),
            Err(GraphError::CommitNotFound(_))
        ));
    }

    #[test]
    fn criss_cross_lca_is_deterministic() {
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], "root", vec![]).unwrap();
        let a = graph.create_commit(&[root], "a", vec![]).unwrap();
        let b = graph.create_commit(&[root], "b", vec![]).unwrap();
        let ab = graph.create_commit(&[a, b], "ab", vec![]).unwrap();
        let ba = graph.create_commit(&[b, a], "ba", vec![]).unwrap();
        let expected = a.min(b);
        assert_eq!(graph.lowest_common_ancestor(&ab, &ba).unwrap(), Some(expected));
        assert_eq!(graph.lowest_common_ancestor(&ba, &ab).unwrap(), Some(expected));
    }

    #[test]
    fn exclusive_ancestors_newest_first() {
        let (graph, [root, left, right, merge]) = build_diamond_graph();
        let ids: Vec<ObjectId> = graph
            .exclusive_ancestors(&merge, Some(&left))
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![merge, right]);

        let all = graph.exclusive_ancestors(&merge, None).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all.last().unwrap().id, root);
        assert!(graph.exclusive_ancestors(&left, Some(&merge)).unwrap().is_empty());
    }

    #[test]
    fn history_follows_first_parent() {
        let (graph, [root, left, _right, merge]) = build_diamond_graph();
        let ids: Vec<ObjectId> = graph.history(&merge).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![merge, left, root]);
    }

    #[test]
    fn find_by_prefix_resolves_short_ids() {
        let (graph, [root, a, _b]) = build_linear_graph();
        assert_eq!(graph.find_by_prefix(&root.to_hex()).unwrap(), Some(root));
        assert_eq!(graph.find_by_prefix(&a.to_hex()[..12]).unwrap(), Some(a));
        assert_eq!(graph.find_by_prefix(&val(3).to_hex()).unwrap(), None);
        assert_eq!(graph.find_by_prefix("main").unwrap(), None);
    }

    // ----------------------------------------------------------
    // Ordering & validation
    // ----------------------------------------------------------

    #[test]
    fn topological_order_diamond() {
        let (graph, [root, left, right, merge]) = build_diamond_graph();
        let order: Vec<ObjectId> = graph.topological_order().iter().map(|c| c.id).collect();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], root);
        assert_eq!(order[3], merge);
        let pos = |id: &ObjectId| order.iter().position(|o| o == id).unwrap();
        assert!(pos(&left) < pos(&merge));
        assert!(pos(&right) < pos(&merge));
    }

    #[test]
    fn valid_graph_passes_validation() {
        let (graph, _) = build_diamond_graph();
        graph.validate().unwrap();
        let cloned = graph.clone();
        cloned.validate().unwrap();
    }

    proptest! {
        /// Random histories: every commit picks one or two earlier parents.
        #[test]
        fn lca_is_symmetric_and_common(picks in prop::collection::vec((0usize..64, 0usize..64, any::<bool>()), 1..24)) {
            let mut graph = CommitGraph::new();
            let mut ids = vec![graph.create_commit(&[], "root", vec![]).unwrap()];
            for (i, (p, q, merge)) in picks.iter().enumerate() {
                let first = ids[p % ids.len()];
                let second = ids[q % ids.len()];
                let parents = if *merge && first != second { vec![first, second] } else { vec![first] };
                ids.push(graph.create_commit(&parents, format!("c{i}"), vec![]).unwrap());
            }
            for x in &ids {
                for y in &ids {
                    let lca = graph.lowest_common_ancestor(x, y).unwrap();
                    prop_assert_eq!(lca, graph.lowest_common_ancestor(y, x).unwrap());
                    let lca = lca.unwrap();
                    prop_assert!(graph.is_ancestor(&lca, x));
                    prop_assert!(graph.is_ancestor(&lca, y));
                }
            }
        }
    }
}
