//! Per-event handlers of the review bot.
//!
//! Every event runs a fixed set of independent checks. A failing check does
//! not stop the others; all failures are reported together.

use std::sync::Arc;

use scm::{RepoFileCache, ScmClient};
use tracing::{debug, error, info};

use crate::commands::{self, Command, RETEST_COMMAND};
use crate::config::{BotConfig, Configuration};
use crate::error::{MultiError, ReviewResult};
use crate::events::{NoteEvent, PrAction, PrComment, PullRequestEvent, PullRequestSnapshot};
use crate::labels::{lgtm_label_for, lgtm_labels_on_pr, APPROVED_LABEL, LGTM_LABEL};
use crate::merge::{MergeHelper, Trigger};
use crate::trust::TrustResolver;

const MSG_ADD_LGTM_BY_SELF: &str =
    "***lgtm*** can not be added in your self-own pull request. :astonished:";

fn msg_no_permission(commenter: &str, action: &str, label: &str) -> String {
    format!(
        "\n***@{commenter}*** has no permission to {action} ***{label}*** label in this pull request. :astonished:\n\
         Please contact to the collaborators in this repository."
    )
}

fn msg_clear_label(labels: &[String]) -> String {
    format!(
        "New code changes of pr are detected and remove these labels ***{}***. :flushed: ",
        labels.join(", ")
    )
}

fn msg_not_set_reviewer(author: &str) -> String {
    format!(
        "**@{author}** Thank you for submitting a PullRequest. \
         It is detected that you have not set a reviewer, please set a one."
    )
}

/// The review bot: configuration plus the platform collaborators.
pub struct Robot {
    cli: Arc<dyn ScmClient>,
    cache: Arc<dyn RepoFileCache>,
    config: Configuration,
}

impl Robot {
    pub fn new(
        cli: Arc<dyn ScmClient>,
        cache: Arc<dyn RepoFileCache>,
        config: Configuration,
    ) -> Self {
        Self { cli, cache, config }
    }

    fn trust(&self) -> TrustResolver<'_> {
        TrustResolver::new(self.cli.as_ref(), self.cache.as_ref())
    }

    /// Handle a `Merge Request Hook` delivery.
    pub async fn handle_pr_event(&self, event: &PullRequestEvent) -> ReviewResult<()> {
        let pr = event.snapshot();
        if !pr.open {
            debug!(org = %pr.org, repo = %pr.repo, number = pr.number, "Ignoring event of closed pull request");
            return Ok(());
        }

        let cfg = self.config.config_for(&pr.org, &pr.repo)?;

        let action = event.action();
        let mut merr = MultiError::new();

        if action == PrAction::ChangedSourceBranch {
            merr.add(self.clear_lgtm_labels(&pr).await);
            merr.add(self.retest(&pr).await);
        }

        if action == PrAction::Opened {
            merr.add(self.check_reviewer(&pr, cfg).await);
        }

        if action == PrAction::UpdatedLabel {
            merr.add(
                MergeHelper::new(self.cli.as_ref(), cfg, &pr)
                    .try_merge(Trigger::LabelUpdate)
                    .await,
            );
        }

        merr.into_result()
    }

    /// Handle a `Note Hook` delivery.
    pub async fn handle_note_event(&self, event: &NoteEvent) -> ReviewResult<()> {
        let Some(comment) = event.pr_comment() else {
            return Ok(());
        };

        let commands = commands::parse(&comment.body);
        if commands.is_empty() {
            return Ok(());
        }

        let pr = &comment.pr;
        let cfg = self.config.config_for(&pr.org, &pr.repo)?;
        info!(
            org = %pr.org,
            repo = %pr.repo,
            number = pr.number,
            actor = %comment.commenter,
            ?commands,
            "Handling review commands"
        );

        let mut merr = MultiError::new();
        for command in commands {
            let result = match command {
                Command::AddLgtm => self.add_lgtm(&comment, cfg).await,
                Command::RemoveLgtm => self.remove_lgtm(&comment, cfg).await,
                Command::AddApprove => self.add_approve(&comment, cfg).await,
                Command::RemoveApprove => self.remove_approve(&comment, cfg).await,
                Command::CheckPr => {
                    MergeHelper::new(self.cli.as_ref(), cfg, pr)
                        .try_merge(Trigger::Command {
                            actor: &comment.commenter,
                        })
                        .await
                }
            };
            merr.add(result);
        }

        merr.into_result()
    }

    async fn comment(&self, pr: &PullRequestSnapshot, body: &str) -> ReviewResult<()> {
        self.cli
            .create_pr_comment(&pr.org, &pr.repo, pr.number, body)
            .await?;
        Ok(())
    }

    async fn add_lgtm(&self, c: &PrComment, cfg: &BotConfig) -> ReviewResult<()> {
        let pr = &c.pr;
        if pr.is_author(&c.commenter) {
            return self.comment(pr, MSG_ADD_LGTM_BY_SELF).await;
        }

        if !self.trust().has_permission(&c.commenter, pr, cfg).await? {
            return self
                .comment(pr, &msg_no_permission(&c.commenter, "add", LGTM_LABEL))
                .await;
        }

        let label = lgtm_label_for(&c.commenter, cfg.lgtm_counts_required);
        if label != LGTM_LABEL {
            if let Err(e) = self.create_label_if_need(&pr.org, &pr.repo, &label).await {
                error!(org = %pr.org, repo = %pr.repo, label = %label, error = %e, "Failed to create repo label");
            }
        }

        self.cli
            .add_pr_label(&pr.org, &pr.repo, pr.number, &label)
            .await?;
        Ok(())
    }

    async fn remove_lgtm(&self, c: &PrComment, cfg: &BotConfig) -> ReviewResult<()> {
        let pr = &c.pr;

        if !pr.is_author(&c.commenter) {
            if !self.trust().has_permission(&c.commenter, pr, cfg).await? {
                return self
                    .comment(pr, &msg_no_permission(&c.commenter, "remove", LGTM_LABEL))
                    .await;
            }

            let label = lgtm_label_for(&c.commenter, cfg.lgtm_counts_required);
            self.cli
                .remove_pr_label(&pr.org, &pr.repo, pr.number, &label)
                .await?;
            return Ok(());
        }

        // The author may drop every lgtm label at once.
        let labels = lgtm_labels_on_pr(&pr.labels);
        if !labels.is_empty() {
            self.cli
                .remove_pr_labels(&pr.org, &pr.repo, pr.number, &labels)
                .await?;
        }
        Ok(())
    }

    async fn add_approve(&self, c: &PrComment, cfg: &BotConfig) -> ReviewResult<()> {
        let pr = &c.pr;
        if !self.trust().has_permission(&c.commenter, pr, cfg).await? {
            return self
                .comment(pr, &msg_no_permission(&c.commenter, "add", APPROVED_LABEL))
                .await;
        }

        self.cli
            .add_pr_label(&pr.org, &pr.repo, pr.number, APPROVED_LABEL)
            .await?;
        Ok(())
    }

    async fn remove_approve(&self, c: &PrComment, cfg: &BotConfig) -> ReviewResult<()> {
        let pr = &c.pr;
        if !self.trust().has_permission(&c.commenter, pr, cfg).await? {
            return self
                .comment(pr, &msg_no_permission(&c.commenter, "remove", APPROVED_LABEL))
                .await;
        }

        self.cli
            .remove_pr_label(&pr.org, &pr.repo, pr.number, APPROVED_LABEL)
            .await?;
        Ok(())
    }

    async fn create_label_if_need(&self, org: &str, repo: &str, label: &str) -> ReviewResult<()> {
        let labels = self.cli.get_repo_labels(org, repo).await?;
        if labels.iter().any(|l| l.name == label) {
            return Ok(());
        }

        self.cli.create_repo_label(org, repo, label, "").await?;
        Ok(())
    }

    async fn clear_lgtm_labels(&self, pr: &PullRequestSnapshot) -> ReviewResult<()> {
        let labels = lgtm_labels_on_pr(&pr.labels);
        if labels.is_empty() {
            return Ok(());
        }

        self.cli
            .remove_pr_labels(&pr.org, &pr.repo, pr.number, &labels)
            .await?;
        self.comment(pr, &msg_clear_label(&labels)).await
    }

    async fn retest(&self, pr: &PullRequestSnapshot) -> ReviewResult<()> {
        self.comment(pr, RETEST_COMMAND).await
    }

    async fn check_reviewer(&self, pr: &PullRequestSnapshot, cfg: &BotConfig) -> ReviewResult<()> {
        if cfg.unable_checking_reviewer_for_pr || !pr.assignees.is_empty() {
            return Ok(());
        }

        self.comment(pr, &msg_not_set_reviewer(&pr.author)).await
    }
}
