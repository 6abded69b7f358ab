use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by session and git-cache operations.
///
/// Parse-level problems never appear here: malformed hunks are dropped by the
/// parser and an anchor that cannot be relocated is reported as a stale
/// thread, not an error. The variants below all indicate that either the
/// local repository is missing required history or an external side effect
/// did not take place.
///
/// The enum is `Clone` so results can flow through the shared in-flight
/// futures used by the per-path single-flight cache.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ReviewError {
    #[error("no merge base found for {base_sha}..{head_sha}")]
    MergeBaseNotFound { base_sha: String, head_sha: String },

    #[error("object {sha} not found for '{path}' after fetching the pull request head")]
    BlobNotFound { sha: String, path: String },

    #[error("git operation '{operation}' failed: {message}")]
    GitOperationFailed { operation: String, message: String },

    #[error("file '{path}' is not part of the pull request")]
    FileNotInPullRequest { path: String },

    #[error("posting review comment failed: {message}")]
    CommentPostFailure { message: String },

    #[error("review action '{operation}' failed: {message}")]
    ReviewActionFailed { operation: String, message: String },

    #[error("cannot {operation}: no pending review with a stable id")]
    NoPendingReview { operation: String },
}

impl ReviewError {
    pub fn git(operation: &str, error: impl ToString) -> Self {
        ReviewError::GitOperationFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub fn review_action(operation: &str, error: impl ToString) -> Self {
        ReviewError::ReviewActionFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<ReviewError> for String {
    fn from(error: ReviewError) -> Self {
        error.to_string()
    }
}
