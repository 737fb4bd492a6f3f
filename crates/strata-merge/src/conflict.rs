use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::{ObjectId, SampleId, TensorId};

use crate::policy::Side;

/// A disagreement between the two sides of a merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub tensor: TensorId,
    /// The tensor's name on the current side (or on the target side for a
    /// tensor the current side does not have).
    pub name: String,
    pub kind: ConflictKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    /// The same sample was updated to different values on both sides.
    Value {
        sample: SampleId,
        ours: ObjectId,
        theirs: ObjectId,
        current_index: usize,
        target_index: usize,
    },
    /// The same tensor was renamed differently on both sides.
    Rename { ours: String, theirs: String },
    /// A target-side tensor would take a name held by another tensor on the
    /// current side.
    NameCollision { name: String, holder: TensorId },
}

impl Conflict {
    /// Whether settling for `side` is possible. A name collision can only
    /// be settled by keeping the current side's naming.
    pub fn resolvable_by(&self, side: Side) -> bool {
        match self.kind {
            ConflictKind::NameCollision { .. } => side == Side::Ours,
            _ => true,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConflictKind::Value {
                sample,
                current_index,
                target_index,
                ..
            } => write!(
                f,
                "tensor {:?}: sample {sample} updated on both sides (current index {current_index}, target index {target_index})",
                self.name
            ),
            ConflictKind::Rename { ours, theirs } => write!(
                f,
                "tensor {:?}: renamed to {ours:?} on current and to {theirs:?} on target",
                self.name
            ),
            ConflictKind::NameCollision { name, holder } => write!(
                f,
                "tensor {:?}: name {name:?} is already used by tensor {holder} on current",
                self.name
            ),
        }
    }
}
