//! Code-hosting platform abstraction for the review bot.
//!
//! The decision engine never talks HTTP directly. Everything it needs from the
//! platform goes through two traits:
//!
//! - [`ScmClient`] covers permissions, file contents, PR changes, labels,
//!   comments, PR updates and merging
//! - [`RepoFileCache`] serves the per-branch OWNERS files kept by the
//!   repo-file-cache service
//!
//! [`GiteeClient`] and [`FileCacheClient`] are the production adapters. With the
//! `test-util` feature, the [`memory`] module provides in-memory fakes of both.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod error;
pub mod gitee;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use cache::FileCacheClient;
pub use error::ScmError;
pub use gitee::GiteeClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Permission role of a user on a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Admin,
    Write,
    Read,
    #[serde(other)]
    None,
}

impl Permission {
    /// `admin` and `write` both allow gating a pull request.
    #[must_use]
    pub fn can_write(self) -> bool {
        matches!(self, Permission::Admin | Permission::Write)
    }
}

/// How the platform should merge a pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
}

impl MergeMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file read from a repository. `content` is base64 as served by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// One entry of a pull request's changed-file list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
}

/// A repository label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Partial update of a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub testers_number: Option<i32>,
}

impl PullRequestUpdate {
    /// Zero the required reviewer and tester counts so the PR can be merged.
    #[must_use]
    pub fn clear_review_requirements() -> Self {
        Self {
            assignees_number: Some(0),
            testers_number: Some(0),
        }
    }
}

/// Key of a branch snapshot in the repo-file-cache service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchRef {
    pub platform: String,
    pub org: String,
    pub repo: String,
    pub branch: String,
}

impl BranchRef {
    #[must_use]
    pub fn gitee(org: &str, repo: &str, branch: &str) -> Self {
        Self {
            platform: "gitee".to_string(),
            org: org.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
        }
    }
}

/// A file served by the repo-file-cache service. `content` is base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFile {
    pub path: String,
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub content: String,
}

impl CachedFile {
    /// Directory holding this file.
    #[must_use]
    pub fn dir(&self) -> &str {
        parent_dir(&self.path)
    }
}

/// Directory part of a slash-separated repository path; `.` for top-level files.
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some(("", _)) => "/",
        Some((dir, _)) => dir,
        None => ".",
    }
}

/// Capabilities the review bot needs from a hosting platform.
#[async_trait]
pub trait ScmClient: Send + Sync {
    /// Role of `login` on `org/repo`.
    async fn get_user_permission(
        &self,
        org: &str,
        repo: &str,
        login: &str,
    ) -> Result<Permission, ScmError>;

    /// File at `path` on `git_ref`, base64-encoded.
    async fn get_path_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent, ScmError>;

    async fn get_pull_request_changes(
        &self,
        org: &str,
        repo: &str,
        number: i32,
    ) -> Result<Vec<ChangedFile>, ScmError>;

    async fn get_repo_labels(&self, org: &str, repo: &str) -> Result<Vec<Label>, ScmError>;

    async fn create_repo_label(
        &self,
        org: &str,
        repo: &str,
        label: &str,
        color: &str,
    ) -> Result<(), ScmError>;

    async fn add_pr_label(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        label: &str,
    ) -> Result<(), ScmError>;

    async fn remove_pr_label(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        label: &str,
    ) -> Result<(), ScmError>;

    async fn remove_pr_labels(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        labels: &[String],
    ) -> Result<(), ScmError>;

    async fn create_pr_comment(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        comment: &str,
    ) -> Result<(), ScmError>;

    async fn update_pull_request(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        update: &PullRequestUpdate,
    ) -> Result<(), ScmError>;

    /// Merge the pull request. Merging an already merged PR is a no-op on the platform side.
    async fn merge_pr(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        method: MergeMethod,
    ) -> Result<(), ScmError>;
}

/// Per-branch file cache holding every copy of a named file (e.g. all OWNERS files).
#[async_trait]
pub trait RepoFileCache: Send + Sync {
    async fn get_files(
        &self,
        branch: &BranchRef,
        file_name: &str,
    ) -> Result<Vec<CachedFile>, ScmError>;
}
