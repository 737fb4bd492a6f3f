//! Diff computation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use strata_dag::CommitGraph;
use strata_types::{Change, ObjectId, SampleId, Snapshot, TensorId, TensorState};
use tracing::debug;

use crate::error::DiffResult;
use crate::record::{DiffRecord, SampleDiff, TensorDiff, TensorStatus};
use crate::revision::Revision;

/// Diff `head` against the commit `base` (`None` for the empty root).
///
/// The cleared marker comes from `Clear` changes in commits reachable from
/// head but not from base, and from head's pending changes.
pub fn diff(graph: &CommitGraph, base: Option<&ObjectId>, head: &Revision) -> DiffResult<TensorDiff> {
    let base_snapshot = match base {
        Some(id) => graph.snapshot(id)?,
        None => Arc::new(Snapshot::new()),
    };
    let mut cleared = BTreeSet::new();
    let history = graph.exclusive_ancestors(&head.commit(), base)?;
    let changes = history
        .iter()
        .flat_map(|c| c.changes().iter())
        .chain(head.pending().iter());
    for change in changes {
        if let Change::Clear { tensor, .. } = change {
            cleared.insert(*tensor);
        }
    }
    let result = diff_with_cleared(&base_snapshot, head.snapshot(), cleared);

    debug!(
        base = ?base.map(|b| b.short_hex()),
        head = %head.commit().short_hex(),
        pending = head.pending().len(),
        summary = %result.summary(),
        "computed tensor diff"
    );
    Ok(result)
}

/// [`diff_snapshots`] plus the cleared marker on each tensor in `cleared`.
///
/// A tensor cleared while empty and otherwise unchanged still gets a record.
pub fn diff_with_cleared(
    base: &Snapshot,
    head: &Snapshot,
    cleared: impl IntoIterator<Item = TensorId>,
) -> TensorDiff {
    let mut result = diff_snapshots(base, head);
    for tensor in cleared {
        mark_cleared(&mut result, tensor, base, head);
    }
    result
}

fn mark_cleared(diff: &mut TensorDiff, tensor: TensorId, base: &Snapshot, head: &Snapshot) {
    if let Some(record) = diff.get_mut(tensor) {
        if record.status == TensorStatus::Retained {
            record.samples.cleared = true;
        }
        return;
    }
    if let (Some(b), Some(h)) = (base.get(tensor), head.get(tensor)) {
        let mut record = retained_record(b, h);
        record.samples.cleared = true;
        diff.insert(record);
    }
}

/// Pure state comparison by tensor and sample identity.
pub fn diff_snapshots(base: &Snapshot, head: &Snapshot) -> TensorDiff {
    let mut result = TensorDiff::new();

    for b in base.tensors() {
        match head.get(b.id) {
            Some(h) => {
                let record = retained_record(b, h);
                if record.is_change() {
                    result.insert(record);
                }
            }
            None => result.insert(DiffRecord {
                tensor: b.id,
                status: TensorStatus::Deleted,
                base_name: Some(b.name.clone()),
                head_name: None,
                base_meta: Some(b.meta.clone()),
                head_meta: None,
                samples: SampleDiff {
                    removed: b.sample_ids().collect(),
                    ..SampleDiff::default()
                },
            }),
        }
    }

    for h in head.tensors().filter(|h| !base.contains(h.id)) {
        result.insert(DiffRecord {
            tensor: h.id,
            status: TensorStatus::Created,
            base_name: None,
            head_name: Some(h.name.clone()),
            base_meta: None,
            head_meta: Some(h.meta.clone()),
            samples: SampleDiff {
                added: h.samples.clone(),
                ..SampleDiff::default()
            },
        });
    }

    result
}

fn retained_record(base: &TensorState, head: &TensorState) -> DiffRecord {
    let base_values: HashMap<SampleId, ObjectId> =
        base.samples.iter().map(|s| (s.id, s.value)).collect();
    let head_ids: BTreeSet<SampleId> = head.sample_ids().collect();

    let mut samples = SampleDiff::default();
    for slot in &head.samples {
        match base_values.get(&slot.id) {
            None => samples.added.push(*slot),
            Some(old) if *old != slot.value => samples.updated.push(*slot),
            Some(_) => {}
        }
    }
    samples.removed = base
        .sample_ids()
        .filter(|id| !head_ids.contains(id))
        .collect();

    DiffRecord {
        tensor: base.id,
        status: TensorStatus::Retained,
        base_name: Some(base.name.clone()),
        head_name: Some(head.name.clone()),
        base_meta: Some(base.meta.clone()),
        head_meta: Some(head.meta.clone()),
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_types::{Htype, SampleSlot, TensorMeta};

    fn val(b: u8) -> ObjectId {
        ObjectId::from_hash([b; 32])
    }

    fn create(id: u64, name: &str) -> Change {
        Change::CreateTensor {
            tensor: TensorId(id),
            name: name.into(),
            meta: TensorMeta::new(Htype::ClassLabel),
        }
    }

    fn append(t: u64, s: u64, v: u8) -> Change {
        Change::Append {
            tensor: TensorId(t),
            sample: SampleId(s),
            value: val(v),
        }
    }

    fn snapshot(changes: &[Change]) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.apply_all(changes).unwrap();
        snap
    }

    fn labels_base() -> Vec<Change> {
        vec![create(0, "labels"), append(0, 0, 0), append(0, 1, 1), append(0, 2, 2)]
    }

    #[test]
    fn identical_snapshots_no_diff() {
        let snap = snapshot(&labels_base());
        assert!(diff_snapshots(&snap, &snap).is_empty());
    }

    #[test]
    fn created_and_deleted() {
        let base = snapshot(&labels_base());
        let mut changes = labels_base();
        changes.push(Change::DeleteTensor { tensor: TensorId(0) });
        changes.push(create(1, "images"));
        changes.push(append(1, 10, 9));
        let head = snapshot(&changes);

        let diff = diff_snapshots(&base, &head);
        let deleted: Vec<_> = diff.deleted().collect();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].name(), "labels");
        assert_eq!(deleted[0].samples.removed.len(), 3);

        let created: Vec<_> = diff.created().collect();
        assert_eq!(created[0].name(), "images");
        assert_eq!(
            created[0].samples.added,
            vec![SampleSlot { id: SampleId(10), value: val(9) }]
        );
    }

    #[test]
    fn sample_changes_by_identity() {
        let base = snapshot(&labels_base());
        let mut changes = labels_base();
        changes.push(Change::Remove {
            tensor: TensorId(0),
            sample: SampleId(0),
        });
        changes.push(Change::Update {
            tensor: TensorId(0),
            sample: SampleId(2),
            value: val(42),
        });
        changes.push(append(0, 3, 3));
        let head = snapshot(&changes);

        let diff = diff_snapshots(&base, &head);
        let record = diff.get(TensorId(0)).unwrap();
        assert_eq!(record.samples.removed, vec![SampleId(0)]);
        assert_eq!(record.samples.updated, vec![SampleSlot { id: SampleId(2), value: val(42) }]);
        assert_eq!(record.samples.added.len(), 1);
        assert!(!record.samples.cleared);
        // Sample 1 shifted from index 1 to index 0 without being reported.
        assert!(record.samples.updated.iter().all(|s| s.id != SampleId(1)));
        assert_eq!(diff.modified().count(), 1);
    }

    #[test]
    fn rename_only_is_recorded() {
        let base = snapshot(&labels_base());
        let mut changes = labels_base();
        changes.push(Change::RenameTensor {
            tensor: TensorId(0),
            from: "labels".into(),
            to: "targets".into(),
        });
        let diff = diff_snapshots(&base, &snapshot(&changes));
        let record = diff.get(TensorId(0)).unwrap();
        assert_eq!(record.renamed(), Some(("labels", "targets")));
        assert!(!record.content_modified());
        assert_eq!(diff.modified().count(), 0);
        assert_eq!(diff.summary().renamed, 1);
    }

    #[test]
    fn cleared_marker_from_history_and_pending() {
        let mut graph = CommitGraph::new();
        let base = graph.create_commit(&[], "base", labels_base()).unwrap();
        let cleared = graph
            .create_commit(
                &[base],
                "clear",
                vec![Change::Clear {
                    tensor: TensorId(0),
                    removed: vec![SampleId(0), SampleId(1), SampleId(2)],
                }],
            )
            .unwrap();
        let refilled = graph.create_commit(&[cleared], "refill", vec![append(0, 7, 7)]).unwrap();

        let rev = Revision::sealed(&graph, refilled).unwrap();
        let result = diff(&graph, Some(&base), &rev).unwrap();
        let record = result.get(TensorId(0)).unwrap();
        assert!(record.samples.cleared);
        assert_eq!(record.samples.removed.len(), 3);
        assert_eq!(record.samples.added.len(), 1);

        // Relative to the clear commit itself nothing is cleared any more.
        let result = diff(&graph, Some(&cleared), &rev).unwrap();
        assert!(!result.get(TensorId(0)).unwrap().samples.cleared);

        // Pending clears count too.
        let pending = vec![Change::Clear {
            tensor: TensorId(0),
            removed: vec![SampleId(7)],
        }];
        let rev = Revision::with_pending(&graph, refilled, pending).unwrap();
        let result = diff(&graph, Some(&refilled), &rev).unwrap();
        assert!(result.get(TensorId(0)).unwrap().samples.cleared);
    }

    #[test]
    fn explicit_cleared_set() {
        let empty = snapshot(&[create(0, "labels"), create(1, "images")]);
        let result = diff_with_cleared(&empty, &empty, [TensorId(0), TensorId(9)]);
        assert_eq!(result.len(), 1);
        let record = result.get(TensorId(0)).unwrap();
        assert!(record.samples.cleared);
        assert!(record.content_modified());

        // Created tensors never carry the marker.
        let result = diff_with_cleared(&Snapshot::new(), &empty, [TensorId(0)]);
        assert!(!result.get(TensorId(0)).unwrap().samples.cleared);
    }

    #[test]
    fn empty_root_base_reports_everything_created() {
        let mut graph = CommitGraph::new();
        let head = graph.create_commit(&[], "only", labels_base()).unwrap();
        let rev = Revision::sealed(&graph, head).unwrap();
        let result = diff(&graph, None, &rev).unwrap();
        assert_eq!(result.created().count(), 1);
        assert_eq!(result.summary().created, 1);
        assert!(result.summary().to_string().contains("1 created"));
    }

    #[test]
    fn record_serializes() {
        let base = snapshot(&labels_base());
        let head = snapshot(&[create(5, "new")]);
        let diff = diff_snapshots(&base, &head);
        let json = serde_json::to_string(diff.get(TensorId(5)).unwrap()).unwrap();
        assert!(json.contains("Created"));
    }
}
