use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// Which side's value wins a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// The branch being merged into.
    Ours,
    /// The branch being merged from.
    Theirs,
}

/// Policy applied to value and rename conflicts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Any conflict aborts the merge.
    #[default]
    Manual,
    Ours,
    Theirs,
}

impl ConflictResolution {
    /// The side this policy settles conflicts for, if any.
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Manual => None,
            Self::Ours => Some(Side::Ours),
            Self::Theirs => Some(Side::Theirs),
        }
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manual => "manual",
            Self::Ours => "ours",
            Self::Theirs => "theirs",
        };
        f.write_str(name)
    }
}

impl FromStr for ConflictResolution {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" | "none" => Ok(Self::Manual),
            "ours" => Ok(Self::Ours),
            "theirs" => Ok(Self::Theirs),
            other => Err(MergeError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Knobs for a single merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    pub resolution: ConflictResolution,
    /// Delete, on the current side, tensors the target deleted and the
    /// current side left untouched.
    pub delete_removed_tensors: bool,
}

impl MergeOptions {
    pub fn new(resolution: ConflictResolution) -> Self {
        Self {
            resolution,
            delete_removed_tensors: false,
        }
    }

    pub fn delete_removed_tensors(mut self, enabled: bool) -> Self {
        self.delete_removed_tensors = enabled;
        self
    }
}
