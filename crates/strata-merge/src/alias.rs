//! Tensors folded together by earlier merges.
//!
//! Two branches that independently create a tensor under the same name get
//! two tensor ids. The first merge between them folds the target's tensor
//! into ours and records an alias. Later merges between the two lines of
//! history must treat every id in such a class as one tensor, so the base
//! and target are rewritten into one id per class before they are compared.

use std::collections::{BTreeMap, BTreeSet};

use strata_diff::{diff_with_cleared, TensorDiff};
use strata_types::{Snapshot, TensorId};
use tracing::debug;

use crate::resolver::MergeInput;

/// Canonical id for every aliased tensor id of a merge.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Folded {
    /// Non-canonical id -> canonical id.
    canonical: BTreeMap<TensorId, TensorId>,
    /// `(alias, tensor)` pairs the merged state should record.
    carried: Vec<(TensorId, TensorId)>,
}

/// Base and target rewritten into canonical ids, with diffs recomputed.
pub(crate) struct Canonical {
    pub base: Snapshot,
    pub target: Snapshot,
    pub ours: TensorDiff,
    pub theirs: TensorDiff,
}

impl Canonical {
    pub fn input<'a>(&'a self, current: &'a Snapshot) -> MergeInput<'a> {
        MergeInput {
            base: &self.base,
            current,
            target: &self.target,
            ours: &self.ours,
            theirs: &self.theirs,
        }
    }
}

impl Folded {
    pub fn new(input: &MergeInput<'_>) -> Self {
        let mut folded = Self::default();
        for class in classes(&[input.base, input.current, input.target]) {
            let Some(rep) = representative(&class, input) else {
                debug!(class = ?class, "aliased tensors live side by side; not folding");
                continue;
            };
            for id in class.into_iter().filter(|id| *id != rep) {
                folded.canonical.insert(id, rep);
                if input.target.knows(id) {
                    folded.carried.push((id, rep));
                }
            }
        }
        folded
    }

    pub fn get(&self, id: TensorId) -> TensorId {
        self.canonical.get(&id).copied().unwrap_or(id)
    }

    pub fn carried(&self) -> &[(TensorId, TensorId)] {
        &self.carried
    }

    /// `None` when no live tensor of base or target needs a new id.
    pub fn rewrite(&self, input: &MergeInput<'_>) -> Option<Canonical> {
        let moves = |s: &Snapshot| s.tensors().any(|t| self.canonical.contains_key(&t.id));
        if !moves(input.base) && !moves(input.target) {
            return None;
        }
        let base = input.base.renumbered(|id| self.get(id));
        let target = input.target.renumbered(|id| self.get(id));
        let cleared = |diff: &TensorDiff| -> Vec<TensorId> {
            diff.iter()
                .filter(|r| r.samples.cleared)
                .map(|r| self.get(r.tensor))
                .collect()
        };
        let ours = diff_with_cleared(&base, input.current, cleared(input.ours));
        let theirs = diff_with_cleared(&base, &target, cleared(input.theirs));
        debug!(renamed = self.canonical.len(), "rewrote folded tensor ids");
        Some(Canonical {
            base,
            target,
            ours,
            theirs,
        })
    }
}

/// Connected groups of ids linked by any snapshot's aliases.
fn classes(snapshots: &[&Snapshot]) -> Vec<BTreeSet<TensorId>> {
    let mut links: BTreeMap<TensorId, BTreeSet<TensorId>> = BTreeMap::new();
    for snapshot in snapshots {
        for (alias, tensor) in snapshot.aliases() {
            links.entry(alias).or_default().insert(tensor);
            links.entry(tensor).or_default().insert(alias);
        }
    }

    let mut seen = BTreeSet::new();
    let mut classes = Vec::new();
    for &start in links.keys() {
        if seen.contains(&start) {
            continue;
        }
        let mut class = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if class.insert(id) {
                stack.extend(links.get(&id).into_iter().flatten().copied());
            }
        }
        seen.extend(class.iter().copied());
        classes.push(class);
    }
    classes
}

/// The id live on the current side, else on the target, else the oldest.
/// `None` if some snapshot holds two members live at once.
fn representative(class: &BTreeSet<TensorId>, input: &MergeInput<'_>) -> Option<TensorId> {
    let live = |s: &Snapshot| class.iter().copied().filter(|id| s.contains(*id)).collect::<Vec<_>>();
    let (base, current, target) = (live(input.base), live(input.current), live(input.target));
    if base.len() > 1 || current.len() > 1 || target.len() > 1 {
        return None;
    }
    current
        .first()
        .or(target.first())
        .or(class.first())
        .copied()
}
