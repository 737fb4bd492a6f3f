//! The [`RefStore`] trait defining the reference storage interface.

use strata_types::ObjectId;

use crate::error::{RefError, Result};
use crate::types::{BranchInfo, Head, RefTable};

/// Storage backend for branches and HEAD.
///
/// Implementations must be thread-safe (`Send + Sync`). A branch always
/// points at an existing commit; callers validate commit ids before handing
/// them over.
pub trait RefStore: Send + Sync {
    /// Tip of a branch, or `Ok(None)` if the branch does not exist.
    fn branch(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Create a new branch. Fails if the name is invalid or taken.
    fn create_branch(&self, name: &str, commit: ObjectId) -> Result<()>;

    /// Move an existing branch.
    fn update_branch(&self, name: &str, commit: ObjectId) -> Result<()>;

    /// Delete a branch. Returns `Ok(false)` if it did not exist.
    fn delete_branch(&self, name: &str) -> Result<bool>;

    /// All branches, sorted by name.
    fn branches(&self) -> Result<Vec<(String, ObjectId)>>;

    /// Current HEAD, or `Ok(None)` if it has not been set.
    fn head(&self) -> Result<Option<Head>>;

    /// Point HEAD at a branch (which must exist) or a commit.
    fn set_head(&self, head: Head) -> Result<()>;

    /// Tip of a branch that must exist.
    fn resolve_branch(&self, name: &str) -> Result<ObjectId> {
        self.branch(name)?.ok_or_else(|| RefError::NotFound {
            name: name.to_string(),
        })
    }

    /// Name of the checked-out branch.
    fn current_branch(&self) -> Result<String> {
        match self.head()? {
            Some(Head::Branch(name)) => Ok(name),
            Some(Head::Detached(_)) => Err(RefError::DetachedHead),
            None => Err(RefError::NotFound {
                name: "HEAD".into(),
            }),
        }
    }

    /// Commit HEAD resolves to.
    fn head_commit(&self) -> Result<ObjectId> {
        match self.head()? {
            Some(Head::Branch(name)) => self.resolve_branch(&name),
            Some(Head::Detached(commit)) => Ok(commit),
            None => Err(RefError::NotFound {
                name: "HEAD".into(),
            }),
        }
    }

    /// Branch summaries with the current branch flagged.
    fn branch_info(&self) -> Result<Vec<BranchInfo>> {
        let current = self.head()?;
        Ok(self
            .branches()?
            .into_iter()
            .map(|(name, head)| BranchInfo {
                is_current: current.as_ref().and_then(Head::branch_name) == Some(name.as_str()),
                name,
                head,
            })
            .collect())
    }

    /// Snapshot of the whole ref state for persistence.
    fn to_table(&self) -> Result<RefTable> {
        let head = self.head()?.ok_or_else(|| RefError::NotFound {
            name: "HEAD".into(),
        })?;
        Ok(RefTable {
            head,
            branches: self.branches()?.into_iter().collect(),
        })
    }
}
