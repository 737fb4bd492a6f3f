use serde::{Deserialize, Serialize};
use strata_types::Change;

use crate::conflict::Conflict;

/// The changes a merge applies on top of the current side, plus the
/// conflicts the active policy settled along the way.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePlan {
    pub changes: Vec<Change>,
    pub resolved: Vec<Conflict>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Number of changes that touch sample content.
    pub fn sample_changes(&self) -> usize {
        self.changes.iter().filter(|c| c.touches_samples()).count()
    }
}
