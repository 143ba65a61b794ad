//! Who may issue /lgtm and /approve on a pull request.
//!
//! Trust is granted by the first of:
//! 1. `admin` or `write` permission on the repository
//! 2. being listed in the repository's root `OWNERS` file on the PR base
//! 3. when the sig owner check is enabled and every changed file lies under a
//!    sig directory: being listed in the `OWNERS` file of *every* directory
//!    the PR touches
//!
//! OWNERS files that cannot be read or decoded count as empty.

use std::collections::{BTreeSet, HashMap, HashSet};

use regex::Regex;
use scm::{parent_dir, BranchRef, RepoFileCache, ScmClient};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::error::ReviewResult;
use crate::events::{login_key, PullRequestSnapshot};
use crate::freeze::decode_content;

pub const OWNERS_FILE: &str = "OWNERS";

#[derive(Debug, Default, Deserialize)]
struct OwnersDocument {
    #[serde(default)]
    maintainers: Vec<String>,
    #[serde(default)]
    committers: Vec<String>,
}

/// Maintainers and committers of an OWNERS file, compared case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnersSet(HashSet<String>);

impl OwnersSet {
    /// Decode a base64 OWNERS payload. Undecodable content yields an empty set.
    pub fn decode(content: &str) -> Self {
        let raw = match decode_content(content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to decode OWNERS file");
                return Self::default();
            }
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }

        match serde_yaml::from_slice::<OwnersDocument>(&raw) {
            Ok(doc) => Self(
                doc.maintainers
                    .iter()
                    .chain(doc.committers.iter())
                    .map(|l| login_key(l))
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "Failed to parse OWNERS file");
                Self::default()
            }
        }
    }

    pub fn contains(&self, login: &str) -> bool {
        self.0.contains(&login_key(login))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolves whether a commenter may gate a pull request.
pub struct TrustResolver<'a> {
    cli: &'a dyn ScmClient,
    cache: &'a dyn RepoFileCache,
}

impl<'a> TrustResolver<'a> {
    pub fn new(cli: &'a dyn ScmClient, cache: &'a dyn RepoFileCache) -> Self {
        Self { cli, cache }
    }

    pub async fn has_permission(
        &self,
        commenter: &str,
        pr: &PullRequestSnapshot,
        cfg: &BotConfig,
    ) -> ReviewResult<bool> {
        let permission = self
            .cli
            .get_user_permission(&pr.org, &pr.repo, commenter)
            .await?;
        if permission.can_write() {
            debug!(commenter, ?permission, "Trusted by repository permission");
            return Ok(true);
        }

        if self.repo_owners(pr).await.contains(commenter) {
            debug!(commenter, "Trusted by root OWNERS");
            return Ok(true);
        }

        if let Some(pattern) = cfg.sig_dir_pattern() {
            return self.is_owner_of_sigs(commenter, pr, pattern).await;
        }

        Ok(false)
    }

    async fn repo_owners(&self, pr: &PullRequestSnapshot) -> OwnersSet {
        match self
            .cli
            .get_path_content(&pr.org, &pr.repo, OWNERS_FILE, &pr.base_ref)
            .await
        {
            Ok(c) => OwnersSet::decode(&c.content),
            Err(e) if e.is_not_found() => {
                debug!(org = %pr.org, repo = %pr.repo, branch = %pr.base_ref, "No root OWNERS");
                OwnersSet::default()
            }
            Err(e) => {
                warn!(
                    org = %pr.org,
                    repo = %pr.repo,
                    branch = %pr.base_ref,
                    error = %e,
                    "Failed to read root OWNERS, treating it as empty"
                );
                OwnersSet::default()
            }
        }
    }

    async fn is_owner_of_sigs(
        &self,
        commenter: &str,
        pr: &PullRequestSnapshot,
        pattern: &Regex,
    ) -> ReviewResult<bool> {
        let changes = self
            .cli
            .get_pull_request_changes(&pr.org, &pr.repo, pr.number)
            .await?;
        if changes.is_empty() {
            return Ok(false);
        }

        let mut dirs = BTreeSet::new();
        for file in &changes {
            if !pattern.is_match(&file.filename) {
                debug!(file = %file.filename, "Change outside sig directories");
                return Ok(false);
            }
            dirs.insert(parent_dir(&file.filename));
        }

        let branch = BranchRef::gitee(&pr.org, &pr.repo, &pr.base_ref);
        let files = self.cache.get_files(&branch, OWNERS_FILE).await?;
        if files.is_empty() {
            info!(
                org = %pr.org,
                repo = %pr.repo,
                branch = %pr.base_ref,
                "There is no {OWNERS_FILE} file stored in cache"
            );
        }

        let mut by_dir = HashMap::new();
        for f in &files {
            by_dir.entry(f.dir()).or_insert(f);
        }

        for dir in dirs {
            let Some(f) = by_dir.get(dir) else {
                debug!(dir, "No OWNERS for touched directory");
                return Ok(false);
            };
            if !OwnersSet::decode(&f.content).contains(commenter) {
                debug!(dir, commenter, "Not an owner of touched directory");
                return Ok(false);
            }
        }

        Ok(true)
    }
}
