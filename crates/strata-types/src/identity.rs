use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Stable identity of a tensor.
///
/// Assigned once at creation and never reused. Renames keep the id, which is
/// what lets a merge correlate a tensor across branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorId(pub u64);

/// Stable identity of a sample within a tensor.
///
/// Unaffected by index shifts from removals or reordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleId(pub u64);

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Dataset-global allocator for tensor and sample identities.
///
/// The counters are shared by every branch, so two branches can never hand
/// out the same id for unrelated data.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTracker {
    next_tensor: u64,
    next_sample: u64,
}

impl IdentityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_tensor(&mut self) -> TensorId {
        let id = TensorId(self.next_tensor);
        self.next_tensor += 1;
        id
    }

    pub fn allocate_sample(&mut self) -> SampleId {
        let id = SampleId(self.next_sample);
        self.next_sample += 1;
        id
    }

    /// Advance both counters past every id present in `snapshot`.
    ///
    /// Used when loading metadata written by an older tracker so a fresh
    /// allocation can never collide with recorded history.
    pub fn observe(&mut self, snapshot: &Snapshot) {
        for state in snapshot.tensors() {
            self.next_tensor = self.next_tensor.max(state.id.0 + 1);
            for slot in &state.samples {
                self.next_sample = self.next_sample.max(slot.id.0 + 1);
            }
        }
        for (alias, _) in snapshot.aliases() {
            self.next_tensor = self.next_tensor.max(alias.0 + 1);
        }
    }

    pub fn next_tensor(&self) -> TensorId {
        TensorId(self.next_tensor)
    }

    pub fn next_sample(&self) -> SampleId {
        SampleId(self.next_sample)
    }
}
