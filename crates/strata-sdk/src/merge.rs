use strata_diff::Revision;
use strata_merge::{
    ConflictResolution, MergeOptions, MergeOrchestrator, MergeOutcome, MergeReport, MergeRequest,
};
use strata_refs::RefStore;
use tracing::{info, warn};

use crate::dataset::{Dataset, Working};
use crate::error::{DatasetError, DatasetResult};
use crate::persist::MergePersister;

impl Dataset {
    /// Merge a branch or commit into the checked-out branch.
    ///
    /// Pending changes on the current branch are sealed into the merge
    /// commit. A target branch with pending changes first gets them sealed
    /// into an auto-commit on that branch. When the target has nothing new
    /// the merge is a no-op and no commit is made. Every failure leaves the
    /// dataset unchanged.
    pub fn merge(
        &mut self,
        target: &str,
        resolution: ConflictResolution,
        delete_removed_tensors: bool,
    ) -> DatasetResult<MergeReport> {
        let Some(branch) = self.branch()? else {
            return Err(DatasetError::Checkout(
                "cannot merge into a detached HEAD; check out a branch first".into(),
            ));
        };
        let (target_revision, target_branch) = self.target_revision(target, &branch)?;
        let request = MergeRequest {
            current: self.working.revision(),
            target: target_revision,
            options: MergeOptions::new(resolution).delete_removed_tensors(delete_removed_tensors),
            message: format!("Merge {target} into {branch}"),
            auto_commit_message: format!("auto commit before merging into {branch}"),
        };

        let mut stashed = self.stashed.clone();
        if let Some(name) = &target_branch {
            stashed.remove(name);
        }
        let report = {
            let mut persister = MergePersister {
                provider: self.provider.as_ref(),
                refs: &self.refs,
                identity: &self.identity,
                stashed: stashed.clone(),
                branch: &branch,
                target_branch: target_branch.as_deref(),
            };
            MergeOrchestrator::new(&mut self.graph).run(request, &mut persister)?
        };

        if let MergeOutcome::Merged(commit) = report.outcome {
            self.stashed = stashed;
            self.working = Working::sealed(&self.graph, commit)?;
        }
        info!(
            target,
            into = %branch,
            outcome = ?report.outcome,
            ours = %report.ours,
            theirs = %report.theirs,
            "merge finished"
        );
        Ok(report)
    }

    /// The target side of a merge, and the branch it came from.
    fn target_revision(
        &self,
        target: &str,
        current: &str,
    ) -> DatasetResult<(Revision, Option<String>)> {
        let Some(tip) = self.refs.branch(target)? else {
            let commit = self.resolve(target)?;
            return Ok((Revision::sealed(&self.graph, commit)?, None));
        };
        if target == current {
            return Ok((Revision::sealed(&self.graph, tip)?, None));
        }
        let revision = match self.stashed.get(target) {
            Some(copy) if copy.base != tip => {
                warn!(branch = target, base = %copy.base.short_hex(), "ignoring stale working copy");
                Revision::sealed(&self.graph, tip)?
            }
            Some(copy) if !self.config.auto_commit_target => {
                return Err(DatasetError::Checkout(format!(
                    "branch {target:?} has {} uncommitted changes; commit them before merging",
                    copy.pending.len()
                )));
            }
            Some(copy) => Revision::with_pending(&self.graph, tip, copy.pending.clone())?,
            None => Revision::sealed(&self.graph, tip)?,
        };
        Ok((revision, Some(target.to_string())))
    }
}
