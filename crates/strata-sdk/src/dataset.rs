use std::collections::BTreeMap;
use std::sync::Arc;

use strata_dag::{Commit, CommitGraph, GraphError};
use strata_diff::{Revision, TensorDiff};
use strata_refs::{BranchInfo, Head, InMemoryRefStore, RefError, RefStore, RefTable};
use strata_store::{keys, MemoryProvider, SampleStore, StorageProvider};
use strata_types::{
    Array, Change, Compression, Htype, IdentityTracker, ObjectId, SampleId, Snapshot, TensorId,
    TensorMeta, TensorState,
};
use tracing::{debug, info, warn};

use crate::config::DatasetConfig;
use crate::error::{DatasetError, DatasetResult};
use crate::persist::{self, VersionInfo, WorkingCopy};
use crate::tensor::{Tensor, TensorMut};

const INITIAL_COMMIT_MESSAGE: &str = "initial commit";
const DEFAULT_COMMIT_MESSAGE: &str = "commit";

/// The checked-out state: a commit plus uncommitted changes on top.
#[derive(Clone, Debug)]
pub(crate) struct Working {
    pub(crate) base: ObjectId,
    /// `base`'s snapshot with `pending` replayed.
    pub(crate) snapshot: Snapshot,
    pub(crate) pending: Vec<Change>,
}

impl Working {
    pub(crate) fn sealed(graph: &CommitGraph, base: ObjectId) -> DatasetResult<Self> {
        Ok(Self {
            base,
            snapshot: (*graph.snapshot(&base)?).clone(),
            pending: Vec::new(),
        })
    }

    fn restore(graph: &CommitGraph, copy: WorkingCopy) -> DatasetResult<Self> {
        let mut working = Self::sealed(graph, copy.base)?;
        working.snapshot.apply_all(&copy.pending)?;
        working.pending = copy.pending;
        Ok(working)
    }

    fn to_copy(&self) -> WorkingCopy {
        WorkingCopy {
            base: self.base,
            pending: self.pending.clone(),
        }
    }

    pub(crate) fn revision(&self) -> Revision {
        Revision::from_parts(self.base, Arc::new(self.snapshot.clone()), self.pending.clone())
    }
}

/// In-memory state captured before a persisting step.
struct Checkpoint {
    refs: RefTable,
    identity: IdentityTracker,
    stashed: BTreeMap<String, WorkingCopy>,
    working: Working,
}

/// A versioned collection of named tensors.
///
/// Every mutating method takes `&mut self`, so one dataset handle runs one
/// operation at a time. Persisting steps write commit records first and the
/// version metadata last; on failure both the provider and the in-memory
/// state are left as they were.
pub struct Dataset {
    pub(crate) config: DatasetConfig,
    pub(crate) provider: Arc<dyn StorageProvider>,
    samples: SampleStore,
    pub(crate) graph: CommitGraph,
    pub(crate) refs: InMemoryRefStore,
    pub(crate) identity: IdentityTracker,
    /// Uncommitted work of branches other than the checked-out one.
    pub(crate) stashed: BTreeMap<String, WorkingCopy>,
    pub(crate) working: Working,
}

impl Dataset {
    // ---- Lifecycle ----

    /// Create a new dataset with a root commit on the default branch.
    pub fn create(provider: Arc<dyn StorageProvider>, config: DatasetConfig) -> DatasetResult<Self> {
        config.validate()?;
        if provider.exists(keys::VERSION_INFO)? {
            return Err(DatasetError::AlreadyExists);
        }

        let mut graph = CommitGraph::new();
        let root = graph.create_commit(&[], INITIAL_COMMIT_MESSAGE, Vec::new())?;
        let refs = InMemoryRefStore::new();
        refs.create_branch(&config.default_branch, root)?;
        refs.set_head(Head::Branch(config.default_branch.clone()))?;
        let working = Working::sealed(&graph, root)?;

        let dataset = Self {
            samples: SampleStore::new(provider.clone(), config.verify_on_read),
            config,
            provider,
            graph,
            refs,
            identity: IdentityTracker::new(),
            stashed: BTreeMap::new(),
            working,
        };
        dataset.save(&[root])?;
        info!(
            branch = %dataset.config.default_branch,
            commit = %root.short_hex(),
            "created dataset"
        );
        Ok(dataset)
    }

    /// Open an existing dataset.
    pub fn open(provider: Arc<dyn StorageProvider>, config: DatasetConfig) -> DatasetResult<Self> {
        config.validate()?;
        let info = VersionInfo::load(provider.as_ref())?.ok_or(DatasetError::NotFound)?;
        let graph = persist::load_graph(provider.as_ref())?;
        let VersionInfo {
            refs: table,
            mut identity,
            working: mut stashed,
        } = info;

        for commit in table.branches.values() {
            if !graph.contains(commit) {
                return Err(GraphError::CommitNotFound(*commit).into());
            }
        }
        let refs = InMemoryRefStore::from_table(table)?;
        let head_commit = refs.head_commit()?;
        if !graph.contains(&head_commit) {
            return Err(GraphError::CommitNotFound(head_commit).into());
        }

        let current = match refs.head()? {
            Some(Head::Branch(name)) => stashed.remove(&name),
            _ => None,
        };
        let working = match current {
            Some(copy) if copy.base == head_commit => Working::restore(&graph, copy)?,
            Some(copy) => {
                return Err(GraphError::Corrupt(format!(
                    "working copy is based on {} but HEAD is at {}",
                    copy.base.short_hex(),
                    head_commit.short_hex()
                ))
                .into())
            }
            None => Working::sealed(&graph, head_commit)?,
        };
        for copy in stashed.values() {
            if !graph.contains(&copy.base) {
                return Err(GraphError::CommitNotFound(copy.base).into());
            }
        }

        for commit in graph.topological_order() {
            identity.observe(&*graph.snapshot(&commit.id)?);
        }
        identity.observe(&working.snapshot);

        info!(
            commits = graph.len(),
            head = %head_commit.short_hex(),
            pending = working.pending.len(),
            "opened dataset"
        );
        Ok(Self {
            samples: SampleStore::new(provider.clone(), config.verify_on_read),
            config,
            provider,
            graph,
            refs,
            identity,
            stashed,
            working,
        })
    }

    /// A fresh dataset backed by memory.
    pub fn in_memory() -> DatasetResult<Self> {
        Self::create(Arc::new(MemoryProvider::new()), DatasetConfig::default())
    }

    /// Persist uncommitted changes without committing them.
    pub fn flush(&self) -> DatasetResult<()> {
        self.save(&[])
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    // ---- Version control ----

    /// Seal pending changes into a commit on the current branch.
    pub fn commit(&mut self, message: Option<&str>) -> DatasetResult<ObjectId> {
        let branch = self.require_branch()?;
        let message = message.unwrap_or(DEFAULT_COMMIT_MESSAGE).to_string();
        let changes = self.working.pending.len();
        let id = self.transact(|ds, inserted| ds.seal(&branch, message, inserted))?;
        info!(branch = %branch, commit = %id.short_hex(), changes, "committed");
        Ok(id)
    }

    /// Check out a branch, or a commit by full or abbreviated id.
    ///
    /// With `create`, a new branch is made at the current commit (after
    /// committing any pending changes) and checked out. Checking out a
    /// commit detaches HEAD; the dataset is then read-only.
    pub fn checkout(&mut self, target: &str, create: bool) -> DatasetResult<ObjectId> {
        let commit = if create {
            self.checkout_new_branch(target)?
        } else if self.refs.branch(target)?.is_some() {
            self.checkout_branch(target)?
        } else {
            let commit = self.resolve(target)?;
            self.transact(|ds, _| {
                ds.stash_current()?;
                ds.refs.set_head(Head::Detached(commit))?;
                ds.working = Working::sealed(&ds.graph, commit)?;
                Ok(commit)
            })?
        };
        info!(target, commit = %commit.short_hex(), create, "checked out");
        Ok(commit)
    }

    fn checkout_branch(&mut self, name: &str) -> DatasetResult<ObjectId> {
        if self.branch()?.as_deref() == Some(name) {
            return Ok(self.working.base);
        }
        self.transact(|ds, _| {
            ds.stash_current()?;
            ds.refs.set_head(Head::Branch(name.to_string()))?;
            let tip = ds.refs.resolve_branch(name)?;
            ds.working = match ds.stashed.remove(name) {
                Some(copy) if copy.base == tip => Working::restore(&ds.graph, copy)?,
                Some(copy) => {
                    warn!(branch = name, base = %copy.base.short_hex(), "dropping stale working copy");
                    Working::sealed(&ds.graph, tip)?
                }
                None => Working::sealed(&ds.graph, tip)?,
            };
            Ok(tip)
        })
    }

    fn checkout_new_branch(&mut self, name: &str) -> DatasetResult<ObjectId> {
        strata_refs::validate_branch_name(name)?;
        if self.refs.branch(name)?.is_some() {
            return Err(DatasetError::Checkout(format!("branch {name:?} already exists")));
        }
        self.transact(|ds, inserted| {
            if ds.has_uncommitted_changes() {
                let current = ds.require_branch()?;
                ds.seal(&current, format!("auto commit before checkout to {name}"), inserted)?;
            }
            let base = ds.working.base;
            ds.refs.create_branch(name, base)?;
            ds.stash_current()?;
            ds.refs.set_head(Head::Branch(name.to_string()))?;
            Ok(base)
        })
    }

    /// Checked-out branch, or `None` when HEAD is detached.
    pub fn branch(&self) -> DatasetResult<Option<String>> {
        Ok(self.head()?.branch_name().map(str::to_string))
    }

    pub fn branches(&self) -> DatasetResult<Vec<BranchInfo>> {
        Ok(self.refs.branch_info()?)
    }

    pub fn is_detached(&self) -> DatasetResult<bool> {
        Ok(self.head()?.is_detached())
    }

    /// The commit HEAD points at.
    pub fn commit_id(&self) -> ObjectId {
        self.working.base
    }

    /// First-parent history from HEAD, newest first.
    pub fn log(&self) -> DatasetResult<Vec<&Commit>> {
        Ok(self.graph.history(&self.working.base)?)
    }

    /// Changes of the working state relative to a branch or commit.
    pub fn diff(&self, reference: &str) -> DatasetResult<TensorDiff> {
        let base = self.resolve(reference)?;
        Ok(strata_diff::diff(&self.graph, Some(&base), &self.working.revision())?)
    }

    pub fn has_uncommitted_changes(&self) -> bool {
        !self.working.pending.is_empty()
    }

    pub fn pending_changes(&self) -> &[Change] {
        &self.working.pending
    }

    // ---- Tensors ----

    /// Create a tensor with sample identity and the configured compression.
    pub fn create_tensor(&mut self, name: &str, htype: Htype) -> DatasetResult<TensorMut<'_>> {
        let meta = TensorMeta::new(htype).with_compression(self.config.default_compression);
        self.create_tensor_with_meta(name, meta)
    }

    pub fn create_tensor_with_meta(
        &mut self,
        name: &str,
        meta: TensorMeta,
    ) -> DatasetResult<TensorMut<'_>> {
        self.require_branch()?;
        if self.contains_tensor(name) {
            return Err(DatasetError::TensorExists(name.to_string()));
        }
        let tensor = self.identity.allocate_tensor();
        debug!(tensor = name, id = %tensor, htype = %meta.htype, "creating tensor");
        self.record(Change::CreateTensor {
            tensor,
            name: name.to_string(),
            meta,
        })?;
        Ok(TensorMut::new(self, tensor))
    }

    pub fn delete_tensor(&mut self, name: &str) -> DatasetResult<()> {
        let tensor = self.require_tensor(name)?;
        self.record(Change::DeleteTensor { tensor })
    }

    pub fn rename_tensor(&mut self, from: &str, to: &str) -> DatasetResult<()> {
        let tensor = self.require_tensor(from)?;
        if from == to {
            return Ok(());
        }
        if self.contains_tensor(to) {
            return Err(DatasetError::TensorExists(to.to_string()));
        }
        self.record(Change::RenameTensor {
            tensor,
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn tensor(&self, name: &str) -> DatasetResult<Tensor<'_>> {
        let state = self
            .working
            .snapshot
            .by_name(name)
            .ok_or_else(|| DatasetError::TensorNotFound(name.to_string()))?;
        Ok(Tensor::new(self, state))
    }

    pub fn tensor_mut(&mut self, name: &str) -> DatasetResult<TensorMut<'_>> {
        self.require_branch()?;
        let tensor = self.require_tensor(name)?;
        Ok(TensorMut::new(self, tensor))
    }

    pub fn contains_tensor(&self, name: &str) -> bool {
        self.working.snapshot.by_name(name).is_some()
    }

    /// Sorted names of live tensors.
    pub fn tensor_names(&self) -> Vec<String> {
        self.working
            .snapshot
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    // ---- Internals shared with tensors and merges ----

    pub(crate) fn tensor_state(&self, tensor: TensorId) -> DatasetResult<&TensorState> {
        self.working
            .snapshot
            .get(tensor)
            .ok_or_else(|| DatasetError::TensorNotFound(tensor.to_string()))
    }

    pub(crate) fn store_value(&self, value: &Array, compression: Compression) -> DatasetResult<ObjectId> {
        Ok(self.samples.put(value, compression)?)
    }

    pub(crate) fn load_value(&self, value: &ObjectId) -> DatasetResult<Array> {
        Ok(self.samples.get(value)?)
    }

    pub(crate) fn allocate_sample(&mut self) -> SampleId {
        self.identity.allocate_sample()
    }

    /// Apply a change to the working state and queue it for the next commit.
    pub(crate) fn record(&mut self, change: Change) -> DatasetResult<()> {
        self.require_branch()?;
        self.working.snapshot.apply(&change)?;
        debug!(op = change.kind(), tensor = %change.tensor(), "recorded change");
        self.working.pending.push(change);
        Ok(())
    }

    fn require_tensor(&self, name: &str) -> DatasetResult<TensorId> {
        self.working
            .snapshot
            .id_of(name)
            .ok_or_else(|| DatasetError::TensorNotFound(name.to_string()))
    }

    fn head(&self) -> DatasetResult<Head> {
        self.refs.head()?.ok_or_else(|| {
            RefError::NotFound {
                name: "HEAD".into(),
            }
            .into()
        })
    }

    pub(crate) fn require_branch(&self) -> DatasetResult<String> {
        self.branch()?.ok_or(DatasetError::DetachedHead)
    }

    /// Resolve a branch name or a full or abbreviated commit id.
    pub(crate) fn resolve(&self, reference: &str) -> DatasetResult<ObjectId> {
        if let Some(tip) = self.refs.branch(reference)? {
            return Ok(tip);
        }
        match self.graph.find_by_prefix(reference) {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(DatasetError::Checkout(format!(
                "no branch or commit named {reference:?}"
            ))),
            Err(e) => Err(DatasetError::Checkout(e.to_string())),
        }
    }

    /// Commit pending changes on `branch` and move it.
    fn seal(
        &mut self,
        branch: &str,
        message: String,
        inserted: &mut Vec<ObjectId>,
    ) -> DatasetResult<ObjectId> {
        let changes = std::mem::take(&mut self.working.pending);
        let id = self
            .graph
            .create_commit(&[self.working.base], message, changes)?;
        inserted.push(id);
        self.refs.update_branch(branch, id)?;
        self.working = Working::sealed(&self.graph, id)?;
        Ok(id)
    }

    /// Move the current branch's pending changes aside before leaving it.
    fn stash_current(&mut self) -> DatasetResult<()> {
        if let Some(branch) = self.branch()? {
            if self.has_uncommitted_changes() {
                debug!(branch = %branch, pending = self.working.pending.len(), "stashing working copy");
                self.stashed.insert(branch, self.working.to_copy());
            }
        }
        Ok(())
    }

    pub(crate) fn version_info(&self) -> DatasetResult<VersionInfo> {
        let mut working = self.stashed.clone();
        if let Some(branch) = self.branch()? {
            if self.has_uncommitted_changes() {
                working.insert(branch, self.working.to_copy());
            }
        }
        Ok(VersionInfo {
            refs: self.refs.to_table()?,
            identity: self.identity.clone(),
            working,
        })
    }

    fn save(&self, commits: &[ObjectId]) -> DatasetResult<()> {
        persist::save(self.provider.as_ref(), &self.graph, commits, &self.version_info()?)
    }

    fn checkpoint(&self) -> DatasetResult<Checkpoint> {
        Ok(Checkpoint {
            refs: self.refs.to_table()?,
            identity: self.identity.clone(),
            stashed: self.stashed.clone(),
            working: self.working.clone(),
        })
    }

    fn rollback(&mut self, checkpoint: Checkpoint, inserted: &[ObjectId]) {
        for id in inserted.iter().rev() {
            if let Err(e) = self.graph.remove_leaf(id) {
                warn!(commit = %id.short_hex(), error = %e, "failed to undo commit insert");
            }
        }
        if let Err(e) = self.refs.restore(checkpoint.refs) {
            warn!(error = %e, "failed to restore refs");
        }
        self.identity = checkpoint.identity;
        self.stashed = checkpoint.stashed;
        self.working = checkpoint.working;
    }

    /// Run `step`, then persist the commits it inserted along with the
    /// version metadata. Any failure restores the prior state.
    fn transact<T>(
        &mut self,
        step: impl FnOnce(&mut Self, &mut Vec<ObjectId>) -> DatasetResult<T>,
    ) -> DatasetResult<T> {
        let checkpoint = self.checkpoint()?;
        let mut inserted = Vec::new();
        let result = match step(self, &mut inserted) {
            Ok(value) => self.save(&inserted).map(|()| value),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!(error = %e, inserted = inserted.len(), "rolling back");
            self.rollback(checkpoint, &inserted);
        }
        result
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("head", &self.working.base)
            .field("commits", &self.graph.len())
            .field("tensors", &self.working.snapshot.len())
            .field("pending", &self.working.pending.len())
            .finish()
    }
}
