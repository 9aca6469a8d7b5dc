//! Injectable remote backends.
//!
//! The pipeline never talks HTTP directly; it drives these traits. The
//! `slipway-remote` crate provides the REST implementation, tests provide
//! in-memory fakes.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Commit, GitRef, TagObject, WorkItem, WorkItemId};

/// Transport-level failure from a remote backend.
///
/// `NotFound` is terminal for the call that produced it; `Remote` covers
/// transient network/API failures after the backend's own retries are
/// exhausted.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("remote call failed: {0}")]
    Remote(String),
}

/// Convenience result alias for backend calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Source-control operations the pipeline needs from the remote system.
#[async_trait]
pub trait SourceControlApi: Send + Sync {
    /// List refs whose name matches `filter` (a name prefix such as
    /// `heads/release/`).
    async fn list_refs(&self, repo: &str, filter: &str) -> ApiResult<Vec<GitRef>>;

    /// Object id at the tip of `branch`, or `None` if the branch is absent.
    async fn branch_head(&self, repo: &str, branch: &str) -> ApiResult<Option<String>>;

    /// Commits reachable from `target` but not `base`, newest first.
    async fn compare_commits(&self, repo: &str, base: &str, target: &str)
        -> ApiResult<Vec<Commit>>;

    /// Reverse-chronological commit listing starting at `commit`, bounded
    /// by `max` entries.
    async fn list_commits_from(&self, repo: &str, commit: &str, max: usize)
        -> ApiResult<Vec<Commit>>;

    /// Create a new ref pointing at `object_id`. Fails if the ref exists.
    async fn create_ref(&self, repo: &str, name: &str, object_id: &str) -> ApiResult<GitRef>;

    /// Create an annotated tag object pointing at `target_object_id`.
    async fn create_annotated_tag(
        &self,
        repo: &str,
        name: &str,
        target_object_id: &str,
        message: &str,
    ) -> ApiResult<TagObject>;

    /// Fetch an annotated tag object by id.
    async fn get_annotated_tag(&self, repo: &str, object_id: &str) -> ApiResult<TagObject>;

    /// Work items linked to a commit on the server side.
    async fn commit_work_item_links(&self, repo: &str, commit_id: &str)
        -> ApiResult<Vec<WorkItemId>>;

    /// Work items linked to a pull request.
    async fn pull_request_work_item_links(
        &self,
        repo: &str,
        pull_request_id: u64,
    ) -> ApiResult<Vec<WorkItemId>>;
}

/// Work-tracking operations the pipeline needs from the remote system.
#[async_trait]
pub trait WorkTrackingApi: Send + Sync {
    /// Fetch one work-item record.
    async fn work_item(&self, id: WorkItemId) -> ApiResult<WorkItem>;

    /// Set a single field on a work item. Consumed by post-export tooling.
    async fn update_work_item_field(
        &self,
        id: WorkItemId,
        field: &str,
        value: &str,
    ) -> ApiResult<()>;
}
