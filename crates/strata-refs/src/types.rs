//! Core reference types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strata_types::ObjectId;

/// The state of HEAD: a checked-out branch or a detached commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Head {
    /// HEAD follows a branch by name.
    Branch(String),
    /// HEAD is pinned to a commit; the working state is read-only.
    Detached(ObjectId),
}

impl Head {
    pub fn branch_name(&self) -> Option<&str> {
        match self {
            Head::Branch(name) => Some(name),
            Head::Detached(_) => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Head::Detached(_))
    }
}

/// Summary information about a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    /// Commit at the branch tip.
    pub head: ObjectId,
    /// Whether HEAD points at this branch.
    pub is_current: bool,
}

/// Serializable form of a ref store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefTable {
    pub head: Head,
    pub branches: BTreeMap<String, ObjectId>,
}
