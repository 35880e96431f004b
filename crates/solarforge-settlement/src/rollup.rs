//! Version rollup: forges every issue of a version and aggregates the
//! participants.

use solarforge_core::{IssueId, StakeholderContribution, VersionId, VersionRollup};
use std::sync::Arc;

use crate::error::ForgeError;
use crate::forge::ForgeEngine;
use crate::traits::VersionStore;

/// Accumulates per-issue forge results into a [`VersionRollup`].
#[derive(Debug, Default)]
pub struct RollupAccumulator {
    participants: Vec<StakeholderContribution>,
    issues_processed: u64,
    credits_total: u64,
    reward_total: u64,
}

impl RollupAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one forged issue.
    pub fn count_issue(&mut self, credits: u64, reward: u64) {
        self.issues_processed += 1;
        self.credits_total = self.credits_total.saturating_add(credits);
        self.reward_total = self.reward_total.saturating_add(reward);
    }

    /// Merge a contribution by user id. New users keep their arrival slot.
    pub fn merge(&mut self, contribution: &StakeholderContribution) {
        match self
            .participants
            .iter_mut()
            .find(|p| p.user_id == contribution.user_id)
        {
            Some(existing) => existing.absorb(contribution),
            None => self.participants.push(contribution.clone()),
        }
    }

    /// Sort participants by share, highest first. Ties keep merge order.
    pub fn finish(mut self) -> VersionRollup {
        self.participants
            .sort_by(|a, b| b.reward_share.cmp(&a.reward_share));
        VersionRollup {
            participants: self.participants,
            issues_processed: self.issues_processed,
            credits_total: self.credits_total,
            reward_total: self.reward_total,
        }
    }
}

/// Drives the forge engine across the issues of a version.
pub struct RollupEngine {
    forge: Arc<ForgeEngine>,
    versions: Arc<dyn VersionStore>,
}

impl RollupEngine {
    pub fn new(forge: Arc<ForgeEngine>, versions: Arc<dyn VersionStore>) -> Self {
        Self { forge, versions }
    }

    /// Forge every issue of `version_id` in patch order.
    ///
    /// Never fails: a missing version or a store error yields an empty
    /// rollup, and issues that fail to forge are left out of the totals.
    pub async fn forge_version(&self, version_id: &VersionId) -> VersionRollup {
        let version = match self.versions.get_version(version_id).await {
            Ok(Some(version)) => version,
            Ok(None) => {
                tracing::warn!(version_id = %version_id, "version not found");
                return VersionRollup::default();
            }
            Err(e) => {
                tracing::warn!(version_id = %version_id, error = %e, "version read failed");
                return VersionRollup::default();
            }
        };

        tracing::info!(
            version_id = %version_id,
            patches = version.patches.len(),
            "forging version"
        );

        let mut acc = RollupAccumulator::new();
        for patch in &version.patches {
            self.forge_patch(&patch.issue_id, &mut acc).await;
        }

        let rollup = acc.finish();
        tracing::info!(
            version_id = %version_id,
            issues_processed = rollup.issues_processed,
            credits_total = rollup.credits_total,
            reward_total = rollup.reward_total,
            participants = rollup.participants.len(),
            "version forged"
        );
        rollup
    }

    async fn forge_patch(&self, issue_id: &IssueId, acc: &mut RollupAccumulator) {
        let credits = match self.forge.stores().issues.get_issue(issue_id).await {
            Ok(Some(issue)) => issue.credits,
            Ok(None) => {
                tracing::debug!(issue_id = %issue_id, "patch issue missing, skipped");
                return;
            }
            Err(e) => {
                tracing::warn!(issue_id = %issue_id, error = %e, "patch issue read failed, skipped");
                return;
            }
        };
        if credits == 0 {
            tracing::debug!(issue_id = %issue_id, "patch issue has no sunshines, skipped");
            return;
        }
        let expected_reward = self.forge.policy().reward_for(credits);

        match self.forge.forge_issue(issue_id).await {
            Ok(receipt) if receipt.participants.is_empty() => {
                tracing::warn!(issue_id = %issue_id, "forge settled without participants, not counted");
            }
            Ok(receipt) => {
                acc.count_issue(credits, receipt.reward_total);
                for participant in &receipt.participants {
                    acc.merge(participant);
                }
            }
            Err(ForgeError::DuplicateForge) => {
                acc.count_issue(credits, expected_reward);
            }
            Err(e) => {
                tracing::warn!(issue_id = %issue_id, error = %e, "patch skipped");
            }
        }
    }
}
