//! Error types for the review bot.

use scm::ScmError;
use thiserror::Error;

/// Errors raised while handling a review event.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// A platform read or write failed
    #[error(transparent)]
    Scm(#[from] ScmError),

    /// A base64 payload could not be decoded
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A YAML document could not be parsed
    #[error("yaml parse failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A freeze file could not be read; the merge decision is aborted
    #[error("get freeze file {file}: {source}")]
    Freeze {
        file: String,
        #[source]
        source: Box<ReviewError>,
    },

    /// A document that must have content is empty
    #[error("file {0} is empty")]
    EmptyFile(String),

    /// No configuration item covers the repository
    #[error("no config for this repo: {org}/{repo}")]
    NoConfig { org: String, repo: String },

    /// Several independent checks failed
    #[error("{}", join_errors(.0))]
    Multiple(Vec<ReviewError>),
}

fn join_errors(errors: &[ReviewError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Type alias for results of review operations
pub type ReviewResult<T> = Result<T, ReviewError>;

/// Collects failures of independent checks so one failure does not suppress the others.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<ReviewError>,
}

impl MultiError {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one check.
    pub fn add(&mut self, result: ReviewResult<()>) {
        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok` when every check passed, the error itself when only one failed.
    pub fn into_result(mut self) -> ReviewResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(ReviewError::Multiple(self.errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(msg: &str) -> ReviewResult<()> {
        Err(ReviewError::Scm(ScmError::Other(msg.to_string())))
    }

    #[test]
    fn test_empty_multi_error_is_ok() {
        let mut merr = MultiError::new();
        merr.add(Ok(()));
        assert!(merr.is_empty());
        assert!(merr.into_result().is_ok());
    }

    #[test]
    fn test_single_failure_is_returned_as_is() {
        let mut merr = MultiError::new();
        merr.add(Ok(()));
        merr.add(failure("comment failed"));

        let err = merr.into_result().unwrap_err();
        assert!(matches!(err, ReviewError::Scm(_)));
        assert_eq!(err.to_string(), "comment failed");
    }

    #[test]
    fn test_all_failures_are_kept() {
        let mut merr = MultiError::new();
        merr.add(failure("retest failed"));
        merr.add(Ok(()));
        merr.add(failure("merge failed"));
        assert_eq!(merr.len(), 2);

        let err = merr.into_result().unwrap_err();
        assert_eq!(err.to_string(), "retest failed; merge failed");
    }
}
