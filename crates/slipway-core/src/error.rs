//! Error types for the release pipeline.

use thiserror::Error;

use crate::api::ApiError;

/// Errors produced while releasing a single repository.
///
/// `RefNotFound`, `BranchCreateFailed` and `TagCreateFailed` are fatal for
/// that repository's run; `RangeQueryFailed` degrades the run to an empty
/// work-item list. Tag-dereference and work-item lookup failures are
/// recovered inside their components and never reach this enum.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// A required ref (source branch head) does not exist.
    #[error("ref not found in {repo}: {name}")]
    RefNotFound { repo: String, name: String },

    /// Creating the release branch failed (already exists, permissions, ...).
    #[error("failed to create branch {branch} in {repo}: {reason}")]
    BranchCreateFailed {
        repo: String,
        branch: String,
        reason: String,
    },

    /// Creating the annotated release tag failed.
    #[error("failed to create tag {tag} in {repo}: {reason}")]
    TagCreateFailed {
        repo: String,
        tag: String,
        reason: String,
    },

    /// The commit-range query failed after retries.
    #[error("commit range query failed for {repo}: {reason}")]
    RangeQueryFailed { repo: String, reason: String },

    /// Bubbled-up backend transport error.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ReleaseError>;
