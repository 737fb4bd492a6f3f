//! The merge state machine.
//!
//! ```text
//! Idle -> ComputingLca -> Diffing -> Resolving -> Applying -> Committed
//!                  \            \           \           \
//!                   +------------+-----------+-----------+--> Failed
//! ```
//!
//! Nothing is inserted into the graph before `Applying`. If sealing or the
//! [`MergeCommitter`] fails, every commit inserted during the step is
//! removed again, leaving the graph as it was.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_dag::{CommitGraph, SealedCommit};
use strata_diff::{diff, DiffSummary, Revision};
use strata_types::{ObjectId, Snapshot};
use tracing::{debug, info, warn};

use crate::error::{MergeError, MergeResult};
use crate::plan::MergePlan;
use crate::policy::MergeOptions;
use crate::resolver::{ConflictResolver, MergeInput, Resolution};

// ---------------------------------------------------------------
// MergeState
// ---------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeState {
    Idle,
    ComputingLca,
    Diffing,
    Resolving,
    Applying,
    Committed,
    Failed,
}

impl MergeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ComputingLca => "computing_lca",
            Self::Diffing => "diffing",
            Self::Resolving => "resolving",
            Self::Applying => "applying",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------

/// One merge of `target` into `current`.
#[derive(Clone, Debug)]
pub struct MergeRequest {
    pub current: Revision,
    pub target: Revision,
    pub options: MergeOptions,
    /// Message of the merge commit.
    pub message: String,
    /// Message of the commit sealing the target's pending changes, if any.
    pub auto_commit_message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeOutcome {
    /// The target had nothing new relative to the common ancestor.
    UpToDate,
    Merged(ObjectId),
}

#[derive(Clone, Debug)]
pub struct MergeReport {
    pub outcome: MergeOutcome,
    pub lca: Option<ObjectId>,
    /// Visited states, starting at `Idle`.
    pub transitions: Vec<MergeState>,
    pub ours: DiffSummary,
    pub theirs: DiffSummary,
    /// Changes applied on top of the current side (empty when up to date).
    pub plan: MergePlan,
}

impl MergeReport {
    pub fn commit(&self) -> Option<ObjectId> {
        match self.outcome {
            MergeOutcome::Merged(id) => Some(id),
            MergeOutcome::UpToDate => None,
        }
    }
}

/// What the apply step put into the graph.
#[derive(Clone, Debug)]
pub struct AppliedMerge<'a> {
    pub merge_commit: ObjectId,
    /// Commit sealing the target's pending changes.
    pub auto_commit: Option<ObjectId>,
    /// State at the merge commit.
    pub snapshot: Arc<Snapshot>,
    pub plan: &'a MergePlan,
}

/// Persists an applied merge (commit records, branch pointers). A failure
/// makes the orchestrator undo the graph inserts.
pub trait MergeCommitter {
    fn commit(
        &mut self,
        graph: &CommitGraph,
        applied: &AppliedMerge<'_>,
    ) -> Result<(), Box<dyn Error + Send + Sync>>;
}

// ---------------------------------------------------------------
// MergeOrchestrator
// ---------------------------------------------------------------

/// Drives one merge from LCA lookup to the sealed merge commit.
pub struct MergeOrchestrator<'g> {
    graph: &'g mut CommitGraph,
    state: MergeState,
    transitions: Vec<MergeState>,
}

impl<'g> MergeOrchestrator<'g> {
    pub fn new(graph: &'g mut CommitGraph) -> Self {
        Self {
            graph,
            state: MergeState::Idle,
            transitions: vec![MergeState::Idle],
        }
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    pub fn transitions(&self) -> &[MergeState] {
        &self.transitions
    }

    /// Run the merge to a terminal state.
    pub fn run(
        &mut self,
        request: MergeRequest,
        committer: &mut dyn MergeCommitter,
    ) -> MergeResult<MergeReport> {
        if self.state != MergeState::Idle {
            return Err(MergeError::NotIdle(self.state));
        }
        match self.drive(&request, committer) {
            Ok(report) => Ok(report),
            Err(e) => {
                warn!(state = %self.state, error = %e, "merge failed");
                self.transition(MergeState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: MergeState) {
        debug!(from = %self.state, to = %next, "merge state transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn drive(
        &mut self,
        request: &MergeRequest,
        committer: &mut dyn MergeCommitter,
    ) -> MergeResult<MergeReport> {
        self.transition(MergeState::ComputingLca);
        let current = &request.current;
        let target = &request.target;
        let lca = self
            .graph
            .lowest_common_ancestor(&current.commit(), &target.commit())?;
        let auto_commit = if target.has_pending() {
            Some(self.graph.prepare(
                &[target.commit()],
                request.auto_commit_message.clone(),
                target.pending().to_vec(),
            )?)
        } else {
            None
        };

        self.transition(MergeState::Diffing);
        let ours = diff(&*self.graph, lca.as_ref(), current)?;
        let theirs = diff(&*self.graph, lca.as_ref(), target)?;
        if theirs.is_empty() {
            info!(lca = ?lca.map(|id| id.short_hex()), "already up to date");
            self.transition(MergeState::Committed);
            return Ok(MergeReport {
                outcome: MergeOutcome::UpToDate,
                lca,
                transitions: self.transitions.clone(),
                ours: ours.summary(),
                theirs: theirs.summary(),
                plan: MergePlan::default(),
            });
        }

        self.transition(MergeState::Resolving);
        let base = match &lca {
            Some(id) => self.graph.snapshot(id)?,
            None => Arc::new(Snapshot::new()),
        };
        let input = MergeInput {
            base: &base,
            current: current.snapshot(),
            target: target.snapshot(),
            ours: &ours,
            theirs: &theirs,
        };
        let plan = match ConflictResolver::new(request.options).resolve(&input)? {
            Resolution::Clean(plan) => plan,
            Resolution::Conflicted(conflicts) => return Err(MergeError::Conflict(conflicts)),
        };

        self.transition(MergeState::Applying);
        let mut inserted = Vec::new();
        let merged = self.apply(request, auto_commit, &plan, committer, &mut inserted);
        let merge_commit = match merged {
            Ok(id) => id,
            Err(e) => {
                for id in inserted.iter().rev() {
                    if let Err(undo) = self.graph.remove_leaf(id) {
                        warn!(commit = %id.short_hex(), error = %undo, "failed to undo merge insert");
                    }
                }
                return Err(e);
            }
        };

        self.transition(MergeState::Committed);
        info!(
            commit = %merge_commit.short_hex(),
            changes = plan.len(),
            resolved = plan.resolved.len(),
            "merge committed"
        );
        Ok(MergeReport {
            outcome: MergeOutcome::Merged(merge_commit),
            lca,
            transitions: self.transitions.clone(),
            ours: ours.summary(),
            theirs: theirs.summary(),
            plan,
        })
    }

    /// Insert the auto-commit and merge commit, then hand them to the
    /// committer. `inserted` lists what must be undone on failure.
    fn apply(
        &mut self,
        request: &MergeRequest,
        auto_commit: Option<SealedCommit>,
        plan: &MergePlan,
        committer: &mut dyn MergeCommitter,
        inserted: &mut Vec<ObjectId>,
    ) -> MergeResult<ObjectId> {
        let auto_commit = match auto_commit {
            Some(sealed) => {
                let id = self.graph.insert(sealed)?;
                inserted.push(id);
                Some(id)
            }
            None => None,
        };
        let target_parent = auto_commit.unwrap_or_else(|| request.target.commit());

        let mut changes = request.current.pending().to_vec();
        changes.extend(plan.changes.iter().cloned());
        let merge_commit = self.graph.create_commit(
            &[request.current.commit(), target_parent],
            request.message.clone(),
            changes,
        )?;
        inserted.push(merge_commit);

        let applied = AppliedMerge {
            merge_commit,
            auto_commit,
            snapshot: self.graph.snapshot(&merge_commit)?,
            plan,
        };
        committer
            .commit(&*self.graph, &applied)
            .map_err(MergeError::Persist)?;
        Ok(merge_commit)
    }
}
