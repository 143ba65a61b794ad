//! Error types for hosting platform calls.

use thiserror::Error;

/// Errors returned by [`crate::ScmClient`] and [`crate::RepoFileCache`] implementations.
#[derive(Debug, Error)]
pub enum ScmError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with a non-success status
    #[error("{method} {url} returned {status}: {body}")]
    Api {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape
    #[error("Unexpected response from {url}: {details}")]
    Decode { url: String, details: String },

    /// Any other failure, described by its message
    #[error("{0}")]
    Other(String),
}

impl ScmError {
    /// Check whether the platform reported the resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ScmError::Api { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = ScmError::Api {
            method: "GET",
            url: "https://gitee.com/api/v5/repos/o/r/contents/OWNERS".to_string(),
            status: 404,
            body: "{}".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!ScmError::Other("boom".to_string()).is_not_found());
    }
}
