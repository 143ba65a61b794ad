//! Gitee webhook payloads and the pull request snapshot built from them.

use serde::Deserialize;
use std::collections::BTreeSet;

/// Form under which logins are compared. Logins are case-insensitive.
pub fn login_key(login: &str) -> String {
    login.to_lowercase()
}

pub fn same_login(a: &str, b: &str) -> bool {
    login_key(a) == login_key(b)
}

/// Immutable view of a pull request at decision time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestSnapshot {
    pub org: String,
    pub repo: String,
    pub number: i32,
    pub author: String,
    pub base_ref: String,
    pub open: bool,
    /// Platform-computed: `false` when the PR conflicts with its base.
    pub mergeable: bool,
    pub need_review: bool,
    pub need_test: bool,
    pub labels: BTreeSet<String>,
    pub assignees: Vec<String>,
}

impl PullRequestSnapshot {
    pub fn is_author(&self, login: &str) -> bool {
        same_login(&self.author, login)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserHook {
    #[serde(default)]
    pub login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelHook {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchHook {
    #[serde(rename = "ref", default)]
    pub ref_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryHook {
    /// Owning org.
    #[serde(default)]
    pub namespace: String,
    /// Repository name.
    #[serde(default)]
    pub path: String,
}

/// Pull request object embedded in PR and note hooks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestHook {
    pub number: i32,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub user: UserHook,
    #[serde(default)]
    pub base: BranchHook,
    #[serde(default)]
    pub mergeable: bool,
    #[serde(default)]
    pub need_review: bool,
    #[serde(default)]
    pub need_test: bool,
    #[serde(default)]
    pub labels: Vec<LabelHook>,
    #[serde(default)]
    pub assignees: Vec<UserHook>,
}

impl PullRequestHook {
    pub fn snapshot(&self, repository: &RepositoryHook) -> PullRequestSnapshot {
        PullRequestSnapshot {
            org: repository.namespace.clone(),
            repo: repository.path.clone(),
            number: self.number,
            author: self.user.login.clone(),
            base_ref: self.base.ref_name.clone(),
            open: self.state == "open",
            mergeable: self.mergeable,
            need_review: self.need_review,
            need_test: self.need_test,
            labels: self.labels.iter().map(|l| l.name.clone()).collect(),
            assignees: self.assignees.iter().map(|a| a.login.clone()).collect(),
        }
    }
}

/// What happened to a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrAction {
    Opened,
    ChangedSourceBranch,
    UpdatedLabel,
    Other,
}

/// `Merge Request Hook` delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub action_desc: String,
    pub pull_request: PullRequestHook,
    #[serde(default)]
    pub repository: RepositoryHook,
}

impl PullRequestEvent {
    pub fn action(&self) -> PrAction {
        match (self.action.as_str(), self.action_desc.as_str()) {
            ("open", _) => PrAction::Opened,
            ("update", "source_branch_changed") => PrAction::ChangedSourceBranch,
            ("update", "update_label") => PrAction::UpdatedLabel,
            _ => PrAction::Other,
        }
    }

    pub fn snapshot(&self) -> PullRequestSnapshot {
        self.pull_request.snapshot(&self.repository)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentHook {
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub user: UserHook,
}

/// `Note Hook` delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub noteable_type: String,
    #[serde(default)]
    pub comment: CommentHook,
    #[serde(default)]
    pub pull_request: Option<PullRequestHook>,
    #[serde(default)]
    pub repository: RepositoryHook,
}

/// A new comment on an open pull request.
#[derive(Debug, Clone)]
pub struct PrComment {
    pub pr: PullRequestSnapshot,
    pub commenter: String,
    pub body: String,
}

impl NoteEvent {
    /// The comment, if this delivery is a newly created comment on an open PR.
    pub fn pr_comment(&self) -> Option<PrComment> {
        if self.action != "comment" || self.noteable_type != "PullRequest" {
            return None;
        }

        let pr = self.pull_request.as_ref()?.snapshot(&self.repository);
        if !pr.open {
            return None;
        }

        Some(PrComment {
            pr,
            commenter: self.comment.user.login.clone(),
            body: self.comment.body.clone(),
        })
    }
}
