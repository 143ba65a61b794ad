//! Client for the repo-file-cache service.
//!
//! The service keeps, per branch, every copy of a named file found in a
//! repository (for example all `OWNERS` files under `sigs/`). Lookups are
//! `GET {endpoint}/{platform}/{org}/{repo}/{branch}?name={file}&summary=false`.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{BranchRef, CachedFile, RepoFileCache, ScmError};

/// [`RepoFileCache`] backed by the repo-file-cache HTTP service.
#[derive(Debug, Clone)]
pub struct FileCacheClient {
    endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FilesInfo {
    #[serde(default)]
    files: Vec<CachedFile>,
}

impl FileCacheClient {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn files_url(&self, branch: &BranchRef) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.endpoint,
            urlencoding::encode(&branch.platform),
            urlencoding::encode(&branch.org),
            urlencoding::encode(&branch.repo),
            urlencoding::encode(&branch.branch),
        )
    }
}

#[async_trait]
impl RepoFileCache for FileCacheClient {
    async fn get_files(
        &self,
        branch: &BranchRef,
        file_name: &str,
    ) -> Result<Vec<CachedFile>, ScmError> {
        let url = self.files_url(branch);
        debug!(url = %url, file_name, "Fetching cached files");

        let response = self
            .client
            .get(&url)
            .query(&[("name", file_name), ("summary", "false")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScmError::Api {
                method: "GET",
                url,
                status: status.as_u16(),
                body,
            });
        }

        let info: FilesInfo = response.json().await.map_err(|e| ScmError::Decode {
            url: url.clone(),
            details: e.to_string(),
        })?;

        Ok(info.files)
    }
}
