//! Gitee REST (v5) adapter.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{
    ChangedFile, FileContent, Label, MergeMethod, Permission, PullRequestUpdate, ScmClient,
    ScmError,
};

/// Public Gitee API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://gitee.com/api/v5";

const USER_AGENT: &str = "review-bot/1.0";

/// [`ScmClient`] backed by the Gitee v5 API.
#[derive(Debug, Clone)]
pub struct GiteeClient {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct PermissionResponse {
    permission: Permission,
}

impl GiteeClient {
    /// Create a client for the public Gitee API.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, token)
    }

    /// Create a client for a specific API endpoint (self-hosted Gitee or a test server).
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    fn repo_url(&self, org: &str, repo: &str, rest: &str) -> String {
        format!(
            "{}/repos/{}/{}/{rest}",
            self.endpoint,
            urlencoding::encode(org),
            urlencoding::encode(repo)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .query(&[("access_token", self.token.as_str())])
    }

    async fn send(
        &self,
        method: &'static str,
        url: &str,
        request: RequestBuilder,
    ) -> Result<Response, ScmError> {
        debug!(method, url, "Calling Gitee API");

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ScmError::Api {
            method,
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ScmError> {
        let response = self
            .send("GET", url, self.request(Method::GET, url))
            .await?;

        response.json().await.map_err(|e| ScmError::Decode {
            url: url.to_string(),
            details: e.to_string(),
        })
    }
}

#[async_trait]
impl ScmClient for GiteeClient {
    async fn get_user_permission(
        &self,
        org: &str,
        repo: &str,
        login: &str,
    ) -> Result<Permission, ScmError> {
        let url = self.repo_url(
            org,
            repo,
            &format!("collaborators/{}/permission", urlencoding::encode(login)),
        );
        let resp: PermissionResponse = self.get_json(&url).await?;
        Ok(resp.permission)
    }

    async fn get_path_content(
        &self,
        org: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<FileContent, ScmError> {
        let url = self.repo_url(org, repo, &format!("contents/{path}"));
        let request = self
            .request(Method::GET, &url)
            .query(&[("ref", git_ref)]);
        let response = self.send("GET", &url, request).await?;

        // Gitee answers a missing file with `200 []` instead of a 404.
        let value: serde_json::Value = response.json().await.map_err(|e| ScmError::Decode {
            url: url.clone(),
            details: e.to_string(),
        })?;
        if value.is_array() {
            return Err(ScmError::Api {
                method: "GET",
                url,
                status: 404,
                body: value.to_string(),
            });
        }

        serde_json::from_value(value).map_err(|e| ScmError::Decode {
            url,
            details: e.to_string(),
        })
    }

    async fn get_pull_request_changes(
        &self,
        org: &str,
        repo: &str,
        number: i32,
    ) -> Result<Vec<ChangedFile>, ScmError> {
        let url = self.repo_url(org, repo, &format!("pulls/{number}/files"));
        self.get_json(&url).await
    }

    async fn get_repo_labels(&self, org: &str, repo: &str) -> Result<Vec<Label>, ScmError> {
        let url = self.repo_url(org, repo, "labels");
        self.get_json(&url).await
    }

    async fn create_repo_label(
        &self,
        org: &str,
        repo: &str,
        label: &str,
        color: &str,
    ) -> Result<(), ScmError> {
        let url = self.repo_url(org, repo, "labels");
        let request = self
            .request(Method::POST, &url)
            .json(&json!({ "name": label, "color": color }));
        self.send("POST", &url, request).await?;
        Ok(())
    }

    async fn add_pr_label(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        label: &str,
    ) -> Result<(), ScmError> {
        let url = self.repo_url(org, repo, &format!("pulls/{number}/labels"));
        let request = self.request(Method::POST, &url).json(&[label]);
        self.send("POST", &url, request).await?;
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
        if labels.is_empty() {
            return Ok(());
        }

        // Several labels are removed in one call by joining them with commas.
        let names = labels
            .iter()
            .map(|l| urlencoding::encode(l).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let url = self.repo_url(org, repo, &format!("pulls/{number}/labels/{names}"));
        self.send("DELETE", &url, self.request(Method::DELETE, &url))
            .await?;
        Ok(())
    }

    async fn create_pr_comment(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        comment: &str,
    ) -> Result<(), ScmError> {
        let url = self.repo_url(org, repo, &format!("pulls/{number}/comments"));
        let request = self
            .request(Method::POST, &url)
            .json(&json!({ "body": comment }));
        self.send("POST", &url, request).await?;
        Ok(())
    }

    async fn update_pull_request(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        update: &PullRequestUpdate,
    ) -> Result<(), ScmError> {
        let url = self.repo_url(org, repo, &format!("pulls/{number}"));
        let request = self.request(Method::PATCH, &url).json(update);
        self.send("PATCH", &url, request).await?;
        Ok(())
    }

    async fn merge_pr(
        &self,
        org: &str,
        repo: &str,
        number: i32,
        method: MergeMethod,
    ) -> Result<(), ScmError> {
        let url = self.repo_url(org, repo, &format!("pulls/{number}/merge"));
        let request = self
            .request(Method::PUT, &url)
            .json(&json!({ "merge_method": method.as_str() }));
        self.send("PUT", &url, request).await?;
        Ok(())
    }
}
