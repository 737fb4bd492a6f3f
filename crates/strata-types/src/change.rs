use serde::{Deserialize, Serialize};

use crate::identity::{SampleId, TensorId};
use crate::object::ObjectId;
use crate::snapshot::TensorState;
use crate::tensor::TensorMeta;

/// One recorded mutation of a dataset.
///
/// A commit stores the ordered changes that turn its first parent's snapshot
/// into its own. Sample values are referenced by content id; the bytes live in
/// the sample store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    CreateTensor {
        tensor: TensorId,
        name: String,
        meta: TensorMeta,
    },
    DeleteTensor {
        tensor: TensorId,
    },
    /// Bring back a tensor that is absent from the snapshot, with full state.
    ReviveTensor {
        state: TensorState,
    },
    RenameTensor {
        tensor: TensorId,
        from: String,
        to: String,
    },
    Append {
        tensor: TensorId,
        sample: SampleId,
        value: ObjectId,
    },
    Update {
        tensor: TensorId,
        sample: SampleId,
        value: ObjectId,
    },
    Remove {
        tensor: TensorId,
        sample: SampleId,
    },
    /// Removal of every sample present when the tensor was cleared.
    Clear {
        tensor: TensorId,
        removed: Vec<SampleId>,
    },
    /// Record that `alias`, a tensor from another branch whose samples were
    /// folded into `tensor`, now continues as `tensor`.
    AliasTensor {
        alias: TensorId,
        tensor: TensorId,
    },
}

impl Change {
    /// The tensor this change touches.
    pub fn tensor(&self) -> TensorId {
        match self {
            Self::CreateTensor { tensor, .. }
            | Self::DeleteTensor { tensor }
            | Self::RenameTensor { tensor, .. }
            | Self::Append { tensor, .. }
            | Self::Update { tensor, .. }
            | Self::Remove { tensor, .. }
            | Self::Clear { tensor, .. }
            | Self::AliasTensor { tensor, .. } => *tensor,
            Self::ReviveTensor { state } => state.id,
        }
    }

    /// Short name of the operation, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTensor { .. } => "create_tensor",
            Self::DeleteTensor { .. } => "delete_tensor",
            Self::ReviveTensor { .. } => "revive_tensor",
            Self::RenameTensor { .. } => "rename_tensor",
            Self::Append { .. } => "append",
            Self::Update { .. } => "update",
            Self::Remove { .. } => "remove",
            Self::Clear { .. } => "clear",
            Self::AliasTensor { .. } => "alias_tensor",
        }
    }

    /// Whether this change alters sample content (as opposed to tensor
    /// structure such as names).
    pub fn touches_samples(&self) -> bool {
        matches!(
            self,
            Self::Append { .. } | Self::Update { .. } | Self::Remove { .. } | Self::Clear { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tensor_and_kind() {
        let change = Change::Append {
            tensor: TensorId(2),
            sample: SampleId(5),
            value: ObjectId::from_bytes(b"x"),
        };
        assert_eq!(change.tensor(), TensorId(2));
        assert_eq!(change.kind(), "append");
        assert!(change.touches_samples());
        assert!(!Change::DeleteTensor { tensor: TensorId(1) }.touches_samples());

        let alias = Change::AliasTensor {
            alias: TensorId(4),
            tensor: TensorId(1),
        };
        assert_eq!(alias.tensor(), TensorId(1));
        assert_eq!(alias.kind(), "alias_tensor");
        assert!(!alias.touches_samples());
    }

    #[test]
    fn serde_uses_operation_names() {
        let change = Change::Clear {
            tensor: TensorId(1),
            removed: vec![SampleId(3), SampleId(4)],
        };
        let json = serde_json::to_value(&change).unwrap();
        assert!(json.get("clear").is_some());
        let parsed: Change = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, change);
    }
}
