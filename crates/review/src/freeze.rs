//! Branch freeze resolution
//!
//! Freeze documents live in other repositories and list, per release branch,
//! the communities (orgs) it applies to, whether it is frozen and who may
//! still merge. Documents are read in configured order and the first entry
//! matching `(org, branch)` wins.
//!
//! Any failure to read or parse a document aborts the resolution, and so does
//! a missing or empty document. A broken freeze file must never silently
//! unfreeze a branch.

use std::fmt;

use base64::Engine;
use scm::ScmClient;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{ReviewError, ReviewResult};
use crate::events::same_login;

/// Location of a freeze document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FreezeFile {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl FreezeFile {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.owner.is_empty()
            || self.repo.is_empty()
            || self.branch.is_empty()
            || self.path.is_empty()
        {
            anyhow::bail!("freeze_file {self} must set owner, repo, branch and path");
        }
        Ok(())
    }
}

impl fmt::Display for FreezeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}:{}", self.owner, self.repo, self.branch, self.path)
    }
}

/// Parsed freeze document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FreezeDocument {
    #[serde(default)]
    pub release: Vec<FreezeEntry>,
}

impl FreezeDocument {
    /// Parse a decoded document. An empty document has no entries.
    pub fn parse(raw: &[u8]) -> ReviewResult<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_slice(raw)?)
    }

    /// First entry for `branch` that applies to `org`.
    pub fn find(&self, org: &str, branch: &str) -> Option<&FreezeEntry> {
        self.release
            .iter()
            .find(|e| e.branch == branch && e.has_org(org))
    }
}

/// Freeze state of one branch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FreezeEntry {
    pub branch: String,
    #[serde(default)]
    pub community: Vec<String>,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default)]
    pub owner: Vec<String>,
}

impl FreezeEntry {
    pub fn has_org(&self, org: &str) -> bool {
        self.community.iter().any(|c| c == org)
    }

    pub fn is_owner(&self, login: &str) -> bool {
        self.owner.iter().any(|o| same_login(o, login))
    }

    /// Reason the entry blocks a merge triggered by `actor`, if it does.
    ///
    /// Without an actor (passive triggers) nobody can claim the owner
    /// exemption, so a frozen branch always blocks.
    pub fn block_reason(&self, actor: Option<&str>) -> Option<String> {
        if !self.frozen {
            return None;
        }

        match actor {
            Some(login) if self.is_owner(login) => None,
            _ => Some(format!(
                "The target branch of PR has been frozen and it can be merge only by branch owners: {}",
                self.owner.join(", ")
            )),
        }
    }
}

/// Decode a base64 payload as served by the contents API (line breaks allowed).
pub(crate) fn decode_content(content: &str) -> ReviewResult<Vec<u8>> {
    let clean: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(clean)?)
}

async fn fetch_document(cli: &dyn ScmClient, file: &FreezeFile) -> ReviewResult<FreezeDocument> {
    let c = cli
        .get_path_content(&file.owner, &file.repo, &file.path, &file.branch)
        .await?;
    let raw = decode_content(&c.content)?;
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(ReviewError::EmptyFile(c.path));
    }
    FreezeDocument::parse(&raw)
}

/// Freeze entry for `(org, branch)` from the first document that has one.
///
/// Returns `Ok(None)` when no document mentions the branch for this org.
pub async fn resolve(
    cli: &dyn ScmClient,
    org: &str,
    branch: &str,
    sources: &[FreezeFile],
) -> ReviewResult<Option<FreezeEntry>> {
    for file in sources {
        let doc = match fetch_document(cli, file).await {
            Ok(doc) => doc,
            Err(e) => {
                error!(file = %file, error = %e, "Failed to get freeze file");
                return Err(ReviewError::Freeze {
                    file: file.to_string(),
                    source: Box::new(e),
                });
            }
        };

        if let Some(entry) = doc.find(org, branch) {
            debug!(file = %file, org, branch, frozen = entry.frozen, "Found freeze entry");
            return Ok(Some(entry.clone()));
        }
    }

    Ok(None)
}
