//! Conflict classification and merge planning.
//!
//! The resolver works purely on snapshots and diffs. It never touches the
//! commit graph; its output is either a [`MergePlan`] that replays onto the
//! current snapshot, or the list of conflicts the policy could not settle.

use std::collections::HashMap;

use strata_diff::{DiffRecord, TensorDiff, TensorStatus};
use strata_types::{Change, Snapshot, TensorId, TensorState};
use tracing::debug;

use crate::alias::Folded;
use crate::conflict::{Conflict, ConflictKind};
use crate::error::{MergeError, MergeResult};
use crate::plan::MergePlan;
use crate::policy::{ConflictResolution, MergeOptions, Side};

/// Everything the resolver looks at.
#[derive(Clone, Copy, Debug)]
pub struct MergeInput<'a> {
    /// State at the lowest common ancestor (empty when there is none).
    pub base: &'a Snapshot,
    pub current: &'a Snapshot,
    pub target: &'a Snapshot,
    /// `base -> current`.
    pub ours: &'a TensorDiff,
    /// `base -> target`.
    pub theirs: &'a TensorDiff,
}

/// Result of resolving a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Clean(MergePlan),
    /// Conflicts the active policy cannot settle.
    Conflicted(Vec<Conflict>),
}

/// Classifies disagreements between two diffs and plans the merged state.
#[derive(Clone, Debug, Default)]
pub struct ConflictResolver {
    options: MergeOptions,
}

impl ConflictResolver {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Plan the merge of `input.target` into `input.current`.
    ///
    /// Tensors folded together by an earlier merge are first brought under
    /// the current side's id. Fatal checks run next and are immune to the
    /// policy: metadata mismatches between independently created tensors,
    /// then content changes on tensors without sample identity. Value,
    /// rename and name conflicts are settled by the policy or reported.
    pub fn resolve(&self, input: &MergeInput<'_>) -> MergeResult<Resolution> {
        let folded = Folded::new(input);
        match folded.rewrite(input) {
            Some(canonical) => self.resolve_canonical(&canonical.input(input.current), &folded),
            None => self.resolve_canonical(input, &folded),
        }
    }

    fn resolve_canonical(&self, input: &MergeInput<'_>, folded: &Folded) -> MergeResult<Resolution> {
        let folds = check_types(input)?;
        check_identity(input)?;

        let mut plan = PlanBuilder::new(input.current.clone(), self.options.resolution);

        // Content and deletions first, then renames, then tensors that
        // appear on the current side (revivals and creations) so their
        // names are checked against the final naming.
        for record in input.theirs.iter() {
            match record.status {
                TensorStatus::Retained if input.current.contains(record.tensor) => {
                    merge_content(&mut plan, input, record)?;
                }
                TensorStatus::Deleted => self.merge_deletion(&mut plan, input, record)?,
                _ => {}
            }
        }
        for record in input.theirs.iter() {
            if record.status == TensorStatus::Retained && input.current.contains(record.tensor) {
                merge_rename(&mut plan, input, record)?;
            }
        }
        for record in input.theirs.iter() {
            match record.status {
                TensorStatus::Retained if !input.current.contains(record.tensor) => {
                    merge_revival(&mut plan, input, record)?;
                }
                TensorStatus::Created if !input.current.contains(record.tensor) => {
                    merge_creation(&mut plan, input, record, &folds)?;
                }
                _ => {}
            }
        }
        let mut aliases: Vec<(TensorId, TensorId)> = folds.into_iter().collect();
        aliases.sort_unstable();
        aliases.extend_from_slice(folded.carried());
        for (alias, tensor) in aliases {
            plan.alias(alias, tensor)?;
        }

        let resolution = plan.finish();
        match &resolution {
            Resolution::Clean(plan) => debug!(
                changes = plan.len(),
                resolved = plan.resolved.len(),
                policy = %self.options.resolution,
                "merge resolved"
            ),
            Resolution::Conflicted(conflicts) => debug!(
                conflicts = conflicts.len(),
                policy = %self.options.resolution,
                "merge has unresolved conflicts"
            ),
        }
        Ok(resolution)
    }

    fn merge_deletion(
        &self,
        plan: &mut PlanBuilder,
        input: &MergeInput<'_>,
        record: &DiffRecord,
    ) -> MergeResult<()> {
        if !input.current.contains(record.tensor) {
            return Ok(());
        }
        let untouched = input.ours.get(record.tensor).map_or(true, |r| !r.is_change());
        if untouched && self.options.delete_removed_tensors {
            plan.emit(Change::DeleteTensor {
                tensor: record.tensor,
            })?;
        } else {
            debug!(tensor = record.name(), untouched, "keeping tensor deleted on target");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------
// Fatal checks
// ---------------------------------------------------------------

/// Independently created tensors sharing a name must agree on metadata.
/// Returns the target tensors to fold into their current-side namesakes.
fn check_types(input: &MergeInput<'_>) -> MergeResult<HashMap<TensorId, TensorId>> {
    let mut folds = HashMap::new();
    for record in input.theirs.created() {
        if input.current.contains(record.tensor) {
            continue;
        }
        let (Some(target), Some(holder)) = (
            input.target.get(record.tensor),
            input.current.by_name(record.name()),
        ) else {
            continue;
        };
        let independent = input.ours.get(holder.id).is_some_and(|r| r.is_created());
        if !independent {
            continue;
        }
        if let Some((field, ours, theirs)) = holder.meta.mismatch(&target.meta) {
            return Err(MergeError::Mismatch {
                tensor: holder.name.clone(),
                field,
                ours,
                theirs,
            });
        }
        folds.insert(record.tensor, holder.id);
    }
    Ok(folds)
}

/// Target-side content changes are patched in by sample identity, which a
/// tensor without identity does not have.
fn check_identity(input: &MergeInput<'_>) -> MergeResult<()> {
    let sides = [(input.ours, input.current), (input.theirs, input.target)];
    for (diff, snapshot) in sides {
        for record in diff.modified() {
            let with_identity = snapshot
                .get(record.tensor)
                .map_or(true, |t| t.meta.with_identity);
            if !with_identity {
                return Err(MergeError::NotSupported {
                    tensor: record.name().to_string(),
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------
// Per-tensor planning
// ---------------------------------------------------------------

fn merge_content(plan: &mut PlanBuilder, input: &MergeInput<'_>, record: &DiffRecord) -> MergeResult<()> {
    let tensor = record.tensor;
    let (Some(current), Some(target)) = (input.current.get(tensor), input.target.get(tensor)) else {
        return Ok(());
    };
    let theirs = &record.samples;
    let ours_cleared = input.ours.get(tensor).is_some_and(|r| r.samples.cleared);

    match (ours_cleared, theirs.cleared) {
        (false, true) => {
            // The target's content replaces ours wholesale.
            for sample in current.sample_ids() {
                plan.emit(Change::Remove { tensor, sample })?;
            }
            for slot in &target.samples {
                plan.emit(Change::Append {
                    tensor,
                    sample: slot.id,
                    value: slot.value,
                })?;
            }
        }
        (true, false) => {}
        (true, true) => {
            for slot in theirs.added.iter().filter(|s| current.get(s.id).is_none()) {
                plan.emit(Change::Append {
                    tensor,
                    sample: slot.id,
                    value: slot.value,
                })?;
            }
        }
        (false, false) => {
            for &sample in &theirs.removed {
                if current.get(sample).is_some() {
                    plan.emit(Change::Remove { tensor, sample })?;
                }
            }
            for slot in &theirs.updated {
                // Removed on our side: removal wins.
                let Some(current_index) = current.position(slot.id) else {
                    continue;
                };
                let ours = current.samples[current_index].value;
                if ours == slot.value {
                    continue;
                }
                let base_value = input
                    .base
                    .get(tensor)
                    .and_then(|b| b.get(slot.id))
                    .map(|s| s.value);
                let take_theirs = if base_value == Some(ours) {
                    true
                } else {
                    let Some(target_index) = target.position(slot.id) else {
                        continue;
                    };
                    let conflict = Conflict {
                        tensor,
                        name: current.name.clone(),
                        kind: ConflictKind::Value {
                            sample: slot.id,
                            ours,
                            theirs: slot.value,
                            current_index,
                            target_index,
                        },
                    };
                    plan.settle(conflict) == Some(Side::Theirs)
                };
                if take_theirs {
                    plan.emit(Change::Update {
                        tensor,
                        sample: slot.id,
                        value: slot.value,
                    })?;
                }
            }
            for slot in theirs.added.iter().filter(|s| current.get(s.id).is_none()) {
                plan.emit(Change::Append {
                    tensor,
                    sample: slot.id,
                    value: slot.value,
                })?;
            }
        }
    }
    Ok(())
}

fn merge_rename(plan: &mut PlanBuilder, input: &MergeInput<'_>, record: &DiffRecord) -> MergeResult<()> {
    let Some((_, to)) = record.renamed() else {
        return Ok(());
    };
    let Some(current) = input.current.get(record.tensor) else {
        return Ok(());
    };
    if current.name == to {
        return Ok(());
    }
    let ours_renamed = input
        .ours
        .get(record.tensor)
        .is_some_and(|r| r.renamed().is_some());
    if ours_renamed {
        let conflict = Conflict {
            tensor: record.tensor,
            name: current.name.clone(),
            kind: ConflictKind::Rename {
                ours: current.name.clone(),
                theirs: to.to_string(),
            },
        };
        if plan.settle(conflict) != Some(Side::Theirs) {
            return Ok(());
        }
    }
    if let Some(conflict) = plan.collision(record.tensor, &current.name, to) {
        plan.settle(conflict);
        return Ok(());
    }
    plan.emit(Change::RenameTensor {
        tensor: record.tensor,
        from: current.name.clone(),
        to: to.to_string(),
    })
}

/// Deleted on our side, still live on theirs.
fn merge_revival(plan: &mut PlanBuilder, input: &MergeInput<'_>, record: &DiffRecord) -> MergeResult<()> {
    if !record.content_modified() {
        debug!(tensor = record.name(), "tensor stays deleted");
        return Ok(());
    }
    let Some(state) = input.target.get(record.tensor) else {
        return Ok(());
    };
    if let Some(conflict) = plan.collision(state.id, &state.name, &state.name) {
        plan.settle(conflict);
        return Ok(());
    }
    debug!(tensor = %state.name, samples = state.len(), "reviving tensor");
    plan.emit(Change::ReviveTensor {
        state: state.clone(),
    })
}

fn merge_creation(
    plan: &mut PlanBuilder,
    input: &MergeInput<'_>,
    record: &DiffRecord,
    folds: &HashMap<TensorId, TensorId>,
) -> MergeResult<()> {
    let Some(state) = input.target.get(record.tensor) else {
        return Ok(());
    };
    if let Some(&holder) = folds.get(&record.tensor) {
        debug!(tensor = %state.name, samples = state.len(), "folding independently created tensor");
        return append_all(plan, holder, state);
    }
    if let Some(conflict) = plan.collision(state.id, &state.name, &state.name) {
        plan.settle(conflict);
        return Ok(());
    }
    plan.emit(Change::CreateTensor {
        tensor: state.id,
        name: state.name.clone(),
        meta: state.meta.clone(),
    })?;
    append_all(plan, state.id, state)
}

fn append_all(plan: &mut PlanBuilder, tensor: TensorId, source: &TensorState) -> MergeResult<()> {
    for slot in &source.samples {
        plan.emit(Change::Append {
            tensor,
            sample: slot.id,
            value: slot.value,
        })?;
    }
    Ok(())
}

// ---------------------------------------------------------------
// PlanBuilder
// ---------------------------------------------------------------

/// Accumulates changes while replaying them onto a copy of the current
/// snapshot, so later decisions see earlier ones.
struct PlanBuilder {
    merged: Snapshot,
    resolution: ConflictResolution,
    changes: Vec<Change>,
    resolved: Vec<Conflict>,
    unresolved: Vec<Conflict>,
}

impl PlanBuilder {
    fn new(current: Snapshot, resolution: ConflictResolution) -> Self {
        Self {
            merged: current,
            resolution,
            changes: Vec::new(),
            resolved: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    fn emit(&mut self, change: Change) -> MergeResult<()> {
        self.merged
            .apply(&change)
            .map_err(|source| MergeError::InvalidPlan { source })?;
        self.changes.push(change);
        Ok(())
    }

    /// Settle a conflict under the policy. Returns the winning side, or
    /// `None` if the conflict stays unresolved.
    fn settle(&mut self, conflict: Conflict) -> Option<Side> {
        match self.resolution.side() {
            Some(side) if conflict.resolvable_by(side) => {
                debug!(conflict = %conflict, side = ?side, "settled conflict");
                self.resolved.push(conflict);
                Some(side)
            }
            _ => {
                self.unresolved.push(conflict);
                None
            }
        }
    }

    /// Record `alias` as folded into `tensor` unless the merged state
    /// already knows it or no longer holds `tensor`.
    fn alias(&mut self, alias: TensorId, tensor: TensorId) -> MergeResult<()> {
        if self.merged.knows(alias) || !self.merged.contains(tensor) {
            return Ok(());
        }
        self.emit(Change::AliasTensor { alias, tensor })
    }

    /// A conflict if `to` is held by a different live tensor.
    fn collision(&self, tensor: TensorId, name: &str, to: &str) -> Option<Conflict> {
        let holder = self.merged.by_name(to)?;
        (holder.id != tensor).then(|| Conflict {
            tensor,
            name: name.to_string(),
            kind: ConflictKind::NameCollision {
                name: to.to_string(),
                holder: holder.id,
            },
        })
    }

    fn finish(self) -> Resolution {
        if self.unresolved.is_empty() {
            Resolution::Clean(MergePlan {
                changes: self.changes,
                resolved: self.resolved,
            })
        } else {
            Resolution::Conflicted(self.unresolved)
        }
    }
}
