use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strata_types::{SampleId, SampleSlot, TensorId, TensorMeta};

/// Presence of a tensor at head relative to base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TensorStatus {
    Created,
    Deleted,
    /// Live at both ends.
    Retained,
}

/// Sample-level changes of one tensor, keyed by sample identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleDiff {
    /// Samples present at head but not at base, in head order.
    pub added: Vec<SampleSlot>,
    /// Samples present at both ends with a different value (head value).
    pub updated: Vec<SampleSlot>,
    /// Samples present at base but not at head, in base order.
    pub removed: Vec<SampleId>,
    /// The tensor was cleared somewhere between base and head.
    pub cleared: bool,
}

impl SampleDiff {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Everything that happened to one tensor between base and head.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRecord {
    pub tensor: TensorId,
    pub status: TensorStatus,
    pub base_name: Option<String>,
    pub head_name: Option<String>,
    pub base_meta: Option<TensorMeta>,
    pub head_meta: Option<TensorMeta>,
    pub samples: SampleDiff,
}

impl DiffRecord {
    pub fn is_created(&self) -> bool {
        self.status == TensorStatus::Created
    }

    pub fn is_deleted(&self) -> bool {
        self.status == TensorStatus::Deleted
    }

    /// `(from, to)` if a retained tensor changed name.
    pub fn renamed(&self) -> Option<(&str, &str)> {
        match (&self.base_name, &self.head_name) {
            (Some(from), Some(to)) if from != to => Some((from.as_str(), to.as_str())),
            _ => None,
        }
    }

    pub fn meta_changed(&self) -> bool {
        match (&self.base_meta, &self.head_meta) {
            (Some(base), Some(head)) => base.mismatch(head).is_some(),
            _ => false,
        }
    }

    /// Sample content changed (including a clear).
    pub fn content_modified(&self) -> bool {
        !self.samples.is_empty()
    }

    /// Name at head, or at base for a deleted tensor.
    pub fn name(&self) -> &str {
        self.head_name
            .as_deref()
            .or(self.base_name.as_deref())
            .unwrap_or_default()
    }

    /// Whether the record describes any change at all.
    pub fn is_change(&self) -> bool {
        self.status != TensorStatus::Retained
            || self.renamed().is_some()
            || self.meta_changed()
            || self.content_modified()
    }
}

/// Per-tensor diff between two dataset states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TensorDiff {
    records: BTreeMap<TensorId, DiffRecord>,
}

impl TensorDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, record: DiffRecord) {
        self.records.insert(record.tensor, record);
    }

    pub(crate) fn get_mut(&mut self, tensor: TensorId) -> Option<&mut DiffRecord> {
        self.records.get_mut(&tensor)
    }

    pub fn get(&self, tensor: TensorId) -> Option<&DiffRecord> {
        self.records.get(&tensor)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records in tensor-identity order.
    pub fn iter(&self) -> impl Iterator<Item = &DiffRecord> {
        self.records.values()
    }

    pub fn created(&self) -> impl Iterator<Item = &DiffRecord> {
        self.iter().filter(|r| r.is_created())
    }

    pub fn deleted(&self) -> impl Iterator<Item = &DiffRecord> {
        self.iter().filter(|r| r.is_deleted())
    }

    pub fn renamed(&self) -> impl Iterator<Item = &DiffRecord> {
        self.iter().filter(|r| r.renamed().is_some())
    }

    /// Retained tensors whose samples changed.
    pub fn modified(&self) -> impl Iterator<Item = &DiffRecord> {
        self.iter()
            .filter(|r| r.status == TensorStatus::Retained && r.content_modified())
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary {
            created: self.created().count(),
            deleted: self.deleted().count(),
            renamed: self.renamed().count(),
            modified: self.modified().count(),
            ..DiffSummary::default()
        };
        for record in self.iter().filter(|r| r.status == TensorStatus::Retained) {
            summary.samples_added += record.samples.added.len();
            summary.samples_updated += record.samples.updated.len();
            summary.samples_removed += record.samples.removed.len();
        }
        summary
    }
}

impl FromIterator<DiffRecord> for TensorDiff {
    fn from_iter<I: IntoIterator<Item = DiffRecord>>(iter: I) -> Self {
        let mut diff = Self::new();
        for record in iter {
            diff.insert(record);
        }
        diff
    }
}

/// Counts describing a [`TensorDiff`], used for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub created: usize,
    pub deleted: usize,
    pub renamed: usize,
    pub modified: usize,
    pub samples_added: usize,
    pub samples_updated: usize,
    pub samples_removed: usize,
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} deleted, {} renamed, {} modified (+{} ~{} -{} samples)",
            self.created,
            self.deleted,
            self.renamed,
            self.modified,
            self.samples_added,
            self.samples_updated,
            self.samples_removed,
        )
    }
}
