//! In-memory fakes of [`ScmClient`] and [`RepoFileCache`].
//!
//! Reads are served from state seeded by the test; writes are applied to that
//! state and recorded so assertions can inspect what the bot did.

use async_trait::async_trait;
use base64::Engine;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    BranchRef, CachedFile, ChangedFile, FileContent, Label, MergeMethod, Permission,
    PullRequestUpdate, RepoFileCache, ScmClient, ScmError,
};

/// A comment posted through the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedComment {
    pub org: String,
    pub repo: String,
    pub number: i32,
    pub body: String,
}

/// A merge performed through the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMerge {
    pub org: String,
    pub repo: String,
    pub number: i32,
    pub method: MergeMethod,
}

#[derive(Default)]
struct State {
    permissions: HashMap<String, Permission>,
    files: HashMap<String, String>,
    failing_files: HashSet<String>,
    changes: HashMap<String, Vec<ChangedFile>>,
    repo_labels: HashMap<String, Vec<Label>>,
    pr_labels: HashMap<String, BTreeSet<String>>,
    comments: Vec<RecordedComment>,
    updates: Vec<(i32, PullRequestUpdate)>,
    merges: Vec<RecordedMerge>,
    failing_comments: bool,
}

fn encode(raw: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(raw)
}

fn file_key(org: &str, repo: &str, path: &str, git_ref: &str) -> String {
    format!("{org}/{repo}/{path}@{git_ref}")
}

fn pr_key(org: &str, repo: &str, number: i32) -> String {
    format!("{org}/{repo}#{number}")
}

/// In-memory [`ScmClient`].
#[derive(Default)]
pub struct MemoryScm {
    state: Mutex<State>,
}

impl MemoryScm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_permission(&self, org: &str, repo: &str, login: &str, permission: Permission) {
        self.state()
            .permissions
            .insert(format!("{org}/{repo}/{login}"), permission);
    }

    /// Store `raw` (plain text) at `path` on `git_ref`. It is served base64-encoded.
    pub fn set_file(&self, org: &str, repo: &str, path: &str, git_ref: &str, raw: &str) {
        self.state()
            .files
            .insert(file_key(org, repo, path, git_ref), encode(raw));
    }

    /// Store an already encoded payload, e.g. an invalid one.
    pub fn set_encoded_file(&self, org: &str, repo: &str, path: &str, git_ref: &str, content: &str) {
        self.state()
            .files
            .insert(file_key(org, repo, path, git_ref), content.to_string());
    }

    /// Make reads of `path` on `git_ref` fail with a transport-like error.
    pub fn fail_file(&self, org: &str, repo: &str, path: &str, git_ref: &str) {
        self.state()
            .failing_files
            .insert(file_key(org, repo, path, git_ref));
    }

    pub fn set_changes(&self, org: &str, repo: &str, number: i32, files: &[&str]) {
        self.state().changes.insert(
            pr_key(org, repo, number),
            files
                .iter()
                .map(|f| ChangedFile {
                    filename: (*f).to_string(),
                })
                .collect(),
        );
    }

    pub fn add_repo_label(&self, org: &str, repo: &str, label: &str) {
        self.state()
            .repo_labels
            .entry(format!("{org}/{repo}"))
            .or_default()
            .push(Label {
                name: label.to_string(),
            });
    }

    pub fn set_pr_labels(&self, org: &str, repo: &str, number: i32, labels: &[&str]) {
        self.state().pr_labels.insert(
            pr_key(org, repo, number),
            labels.iter().map(|l| (*l).to_string()).collect(),
        );
    }

    /// Make every comment creation fail.
    pub fn fail_comments(&self) {
        self.state().failing_comments = true;
    }

    #[must_use]
    pub fn repo_labels(&self, org: &str, repo: &str) -> Vec<String> {
        self.state()
            .repo_labels
            .get(&format!("{org}/{repo}"))
            .map(|v| v.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn pr_labels(&self, org: &str, repo: &str, number: i32) -> BTreeSet<String> {
        self.state()
            .pr_labels
            .get(&pr_key(org, repo, number))
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn comments(&self) -> Vec<RecordedComment> {
        self.state().comments.clone()
    }

    #[must_use]
    pub fn updates(&self) -> Vec<(i32, PullRequestUpdate)> {
        self.state().updates.clone()
    }

    #[must_use]
    pub fn merges(&self) -> Vec<RecordedMerge> {
        self.state().merges.clone()
    }
}

#[async_trait]
impl ScmClient for MemoryScm {
    async fn get_user_permission(
        &self,
        org: &str,
        repo: &str,
        login: &str,
    ) -> Result<Permission, ScmError> {
        Ok(self
            .state()
            .permissions
            .get(&format!("{org}/{repo}/{login}"))
            .copied()
            .unwrap_or(Permission::None))
    }

    async fn get_path_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent, ScmError> {
        let key = file_key(org, repo, path, git_ref);
        let state = self.state();
        if state.failing_files.contains(&key) {
            return Err(ScmError::Other(format!("read {key}: connection reset")));
        }

        // Missing files are reported as 404, as `GiteeClient` does.
        match state.files.get(&key) {
            Some(content) => Ok(FileContent {
                path: path.to_string(),
                content: content.clone(),
            }),
            None => Err(ScmError::Api {
                method: "GET",
                url: key,
                status: 404,
                body: "404 Not Found".to_string(),
            }),
        }
    }

    async fn get_pull_request_changes(
        &self,
        org: &str,
        repo: &str,
        number: i32,
    ) -> Result<Vec<ChangedFile>, ScmError> {
        Ok(self
            .state()
            .changes
            .get(&pr_key(org, repo, number))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_repo_labels(&self, org: &str, repo: &str) -> Result<Vec<Label>, ScmError> {
        Ok(self
            .state()
            .repo_labels
            .get(&format!("{org}/{repo}"))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_repo_label(
        &self,
        org: &str,
        repo: &str,
        label: &str,
        _color: &str,
    ) -> Result<(), ScmError> {
        self.add_repo_label(org, repo, label);
        Ok(())
    }

    async fn add_pr_label(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        label: &str,
    ) -> Result<(), ScmError> {
        self.state()
            .pr_labels
            .entry(pr_key(org, repo, number))
            .or_default()
            .insert(label.to_string());
        Ok(())
    }

    async fn remove_pr_label(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        label: &str,
    ) -> Result<(), ScmError> {
        self.remove_pr_labels(org, repo, number, &[label.to_string()])
            .await
    }

    async fn remove_pr_labels(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        labels: &[String],
    ) -> Result<(), ScmError> {
        if let Some(current) = self.state().pr_labels.get_mut(&pr_key(org, repo, number)) {
            for label in labels {
                current.remove(label);
            }
        }
        Ok(())
    }

    async fn create_pr_comment(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        comment: &str,
    ) -> Result<(), ScmError> {
        let mut state = self.state();
        if state.failing_comments {
            return Err(ScmError::Other("create comment: service unavailable".to_string()));
        }

        state.comments.push(RecordedComment {
            org: org.to_string(),
            repo: repo.to_string(),
            number,
            body: comment.to_string(),
        });
        Ok(())
    }

    async fn update_pull_request(
        &self,
        _org: &str,
        _repo: &str,
        number: i32,
        update: &PullRequestUpdate,
    ) -> Result<(), ScmError> {
        self.state().updates.push((number, update.clone()));
        Ok(())
    }

    async fn merge_pr(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        method: MergeMethod,
    ) -> Result<(), ScmError> {
        self.state().merges.push(RecordedMerge {
            org: org.to_string(),
            repo: repo.to_string(),
            number,
            method,
        });
        Ok(())
    }
}

/// In-memory [`RepoFileCache`].
#[derive(Default)]
pub struct MemoryFileCache {
    files: Mutex<HashMap<(BranchRef, String), Vec<CachedFile>>>,
    failing: Mutex<bool>,
}

impl MemoryFileCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `raw` (plain text) at `path`; it is indexed by the file's base name.
    pub fn add_file(&self, branch: &BranchRef, path: &str, raw: &str) {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((branch.clone(), name))
            .or_default()
            .push(CachedFile {
                path: path.to_string(),
                sha: String::new(),
                content: encode(raw),
            });
    }

    /// Make every lookup fail.
    pub fn fail(&self) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }
}

#[async_trait]
impl RepoFileCache for MemoryFileCache {
    async fn get_files(
        &self,
        branch: &BranchRef,
        file_name: &str,
    ) -> Result<Vec<CachedFile>, ScmError> {
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(ScmError::Other("file cache unavailable".to_string()));
        }

        Ok(self
            .files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(branch.clone(), file_name.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
