//! Merge decision and merge action
//!
//! A decision collects every blocking reason (conflicts, label policy, branch
//! freeze) into a [`Verdict`]. An empty verdict means the PR is merged right
//! away. Duplicate triggers for the same state are not deduplicated here; the
//! platform treats a merge of an already merged PR as a no-op.

use scm::{PullRequestUpdate, ScmClient};
use tracing::{debug, info};

use crate::config::BotConfig;
use crate::error::ReviewResult;
use crate::events::PullRequestSnapshot;
use crate::{freeze, labels};

pub const MSG_PR_CONFLICTS: &str = "PR conflicts to the target branch.";

/// Blocking reasons for a merge, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    reasons: Vec<String>,
}

impl Verdict {
    pub fn is_mergeable(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }
}

/// What caused a merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger<'a> {
    /// `/check-pr` from `actor`; blocked attempts are explained in a comment.
    Command { actor: &'a str },
    /// The PR's labels changed; blocked attempts stay silent.
    LabelUpdate,
}

impl<'a> Trigger<'a> {
    fn actor(self) -> Option<&'a str> {
        match self {
            Trigger::Command { actor } => Some(actor),
            Trigger::LabelUpdate => None,
        }
    }
}

/// Decides and performs the merge of one pull request.
pub struct MergeHelper<'a> {
    cli: &'a dyn ScmClient,
    cfg: &'a BotConfig,
    pr: &'a PullRequestSnapshot,
}

impl<'a> MergeHelper<'a> {
    pub fn new(cli: &'a dyn ScmClient, cfg: &'a BotConfig, pr: &'a PullRequestSnapshot) -> Self {
        Self { cli, cfg, pr }
    }

    /// Every reason the PR cannot be merged by `actor` right now.
    ///
    /// Fails when a freeze document cannot be read; no partial verdict is returned.
    pub async fn decide(&self, actor: Option<&str>) -> ReviewResult<Verdict> {
        let mut reasons = Vec::new();

        if !self.pr.mergeable {
            reasons.push(MSG_PR_CONFLICTS.to_string());
        }

        reasons.extend(labels::evaluate(&self.pr.labels, self.cfg));

        let entry = freeze::resolve(
            self.cli,
            &self.pr.org,
            &self.pr.base_ref,
            &self.cfg.freeze_file,
        )
        .await?;
        if let Some(reason) = entry.and_then(|e| e.block_reason(actor)) {
            reasons.push(reason);
        }

        Ok(Verdict { reasons })
    }

    /// Merge with the configured method, clearing reviewer/tester requirements first if needed.
    pub async fn merge(&self) -> ReviewResult<()> {
        let pr = self.pr;

        if pr.need_review || pr.need_test {
            self.cli
                .update_pull_request(
                    &pr.org,
                    &pr.repo,
                    pr.number,
                    &PullRequestUpdate::clear_review_requirements(),
                )
                .await?;
        }

        self.cli
            .merge_pr(&pr.org, &pr.repo, pr.number, self.cfg.merge_method)
            .await?;

        info!(
            org = %pr.org,
            repo = %pr.repo,
            number = pr.number,
            method = %self.cfg.merge_method,
            "Merged pull request"
        );
        Ok(())
    }

    /// Decide, then merge or report why not.
    pub async fn try_merge(&self, trigger: Trigger<'_>) -> ReviewResult<()> {
        let verdict = self.decide(trigger.actor()).await?;
        if verdict.is_mergeable() {
            return self.merge().await;
        }

        let pr = self.pr;
        match trigger {
            Trigger::Command { actor } => {
                let body = format!(
                    "@{actor} , this pr is not mergeable and the reasons are below:\n{}",
                    verdict.reasons().join("\n")
                );
                self.cli
                    .create_pr_comment(&pr.org, &pr.repo, pr.number, &body)
                    .await?;
            }
            Trigger::LabelUpdate => {
                debug!(
                    org = %pr.org,
                    repo = %pr.repo,
                    number = pr.number,
                    reasons = ?verdict.reasons(),
                    "Pull request not mergeable yet"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::error::ReviewError;
    use scm::memory::MemoryScm;
    use scm::MergeMethod;
    use std::collections::BTreeSet;

    const ORG: &str = "openeuler";
    const REPO: &str = "kernel";

    const FREEZE: &str = r"
release:
  - branch: master
    community: [openeuler]
    frozen: true
    owner: [alice]
";

    fn pr(labels: &[&str]) -> PullRequestSnapshot {
        PullRequestSnapshot {
            org: ORG.to_string(),
            repo: REPO.to_string(),
            number: 9,
            author: "carol".to_string(),
            base_ref: "master".to_string(),
            open: true,
            mergeable: true,
            labels: labels.iter().map(|l| (*l).to_string()).collect::<BTreeSet<_>>(),
            ..PullRequestSnapshot::default()
        }
    }

    fn config(extra: &str) -> Configuration {
        Configuration::from_yaml(&format!(
            "config_items:\n  - repos: [openeuler]\n{extra}"
        ))
        .unwrap()
    }

    fn frozen_config() -> Configuration {
        config(
            "    freeze_file:\n      - {owner: release, repo: mgmt, branch: main, path: freeze.yaml}\n",
        )
    }

    fn frozen_scm() -> MemoryScm {
        let scm = MemoryScm::new();
        scm.set_file("release", "mgmt", "freeze.yaml", "main", FREEZE);
        scm
    }

    #[tokio::test]
    async fn test_mergeable_pr_is_merged_with_configured_method() {
        let scm = MemoryScm::new();
        let cfg = config("    merge_method: squash\n");
        let pr = pr(&["lgtm", "approved"]);
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        let verdict = helper.decide(None).await.unwrap();
        assert!(verdict.is_mergeable());

        helper.try_merge(Trigger::LabelUpdate).await.unwrap();
        let merges = scm.merges();
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].number, 9);
        assert_eq!(merges[0].method, MergeMethod::Squash);
        assert!(scm.updates().is_empty());
    }

    #[tokio::test]
    async fn test_review_requirements_cleared_before_merge() {
        let scm = MemoryScm::new();
        let cfg = config("");
        let mut pr = pr(&["lgtm", "approved"]);
        pr.need_test = true;
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        helper.merge().await.unwrap();

        assert_eq!(
            scm.updates(),
            vec![(9, PullRequestUpdate::clear_review_requirements())]
        );
        assert_eq!(scm.merges()[0].method, MergeMethod::Merge);
    }

    #[tokio::test]
    async fn test_conflict_always_reported() {
        let scm = MemoryScm::new();
        let cfg = config("");
        let mut pr = pr(&["lgtm", "approved"]);
        pr.mergeable = false;
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        let verdict = helper.decide(Some("alice")).await.unwrap();
        assert_eq!(verdict.reasons(), [MSG_PR_CONFLICTS.to_string()]);

        pr.labels.clear();
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);
        let verdict = helper.decide(Some("alice")).await.unwrap();
        assert_eq!(verdict.reasons()[0], MSG_PR_CONFLICTS);
        assert_eq!(verdict.reasons().len(), 2);
    }

    #[tokio::test]
    async fn test_frozen_branch_blocks_non_owner() {
        let scm = frozen_scm();
        let cfg = frozen_config();
        let pr = pr(&["lgtm", "approved"]);
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        let verdict = helper.decide(Some("bob")).await.unwrap();
        assert_eq!(verdict.reasons().len(), 1);
        assert!(verdict.reasons()[0].ends_with("branch owners: alice"));

        assert!(helper.decide(Some("alice")).await.unwrap().is_mergeable());
    }

    #[tokio::test]
    async fn test_frozen_branch_blocks_passive_trigger() {
        let scm = frozen_scm();
        let cfg = frozen_config();
        let pr = pr(&["lgtm", "approved"]);
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        assert!(!helper.decide(None).await.unwrap().is_mergeable());

        helper.try_merge(Trigger::LabelUpdate).await.unwrap();
        assert!(scm.merges().is_empty());
        assert!(scm.comments().is_empty());
    }

    #[tokio::test]
    async fn test_owner_command_merges_frozen_branch() {
        let scm = frozen_scm();
        let cfg = frozen_config();
        let pr = pr(&["lgtm", "approved"]);
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        helper
            .try_merge(Trigger::Command { actor: "alice" })
            .await
            .unwrap();
        assert_eq!(scm.merges().len(), 1);
    }

    #[tokio::test]
    async fn test_blocked_command_explains_reasons() {
        let scm = frozen_scm();
        let cfg = frozen_config();
        let pr = pr(&["lgtm"]);
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        helper
            .try_merge(Trigger::Command { actor: "bob" })
            .await
            .unwrap();

        assert!(scm.merges().is_empty());
        let comments = scm.comments();
        assert_eq!(comments.len(), 1);
        assert_eq!(
            comments[0].body,
            "@bob , this pr is not mergeable and the reasons are below:\n\
             PR does not have these labels: approved\n\
             The target branch of PR has been frozen and it can be merge only by branch owners: alice"
        );
    }

    #[tokio::test]
    async fn test_unreadable_freeze_file_aborts_without_merge() {
        let scm = MemoryScm::new();
        scm.fail_file("release", "mgmt", "freeze.yaml", "main");
        let cfg = frozen_config();
        let pr = pr(&["lgtm", "approved"]);
        let helper = MergeHelper::new(&scm, cfg.config_for(ORG, REPO).unwrap(), &pr);

        let err = helper
            .try_merge(Trigger::Command { actor: "alice" })
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Freeze { .. }));
        assert!(scm.merges().is_empty());
        assert!(scm.comments().is_empty());
    }
}
