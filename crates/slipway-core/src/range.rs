//! Commit-range computation between two releases.
//!
//! Branch-to-branch ranges use the remote's native two-ref comparison.
//! Tag-to-tag ranges have no native query, so the listing is fetched from
//! the new tag's commit and truncated at the old tag's commit.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::SourceControlApi;
use crate::error::{ReleaseError, Result};
use crate::model::Commit;

/// Knobs for the tag-to-tag listing query.
#[derive(Debug, Clone, Copy)]
pub struct RangeOptions {
    /// Upper bound on the commits fetched when listing from the new tag.
    /// When the old commit lies beyond this bound the whole page is
    /// returned (see [`CommitRangeComputer::between_commits`]).
    pub max_commits: usize,
}

impl Default for RangeOptions {
    fn default() -> Self {
        Self { max_commits: 500 }
    }
}

/// Computes the ordered commit sequence introduced between two releases.
pub struct CommitRangeComputer {
    scm: Arc<dyn SourceControlApi>,
    options: RangeOptions,
}

impl CommitRangeComputer {
    pub fn new(scm: Arc<dyn SourceControlApi>) -> Self {
        Self {
            scm,
            options: RangeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RangeOptions) -> Self {
        self.options = options;
        self
    }

    /// Commits reachable from `new_branch` but not `old_branch`, newest
    /// first, via the remote's native comparison.
    pub async fn between_branches(
        &self,
        repo: &str,
        old_branch: &str,
        new_branch: &str,
    ) -> Result<Vec<Commit>> {
        self.scm
            .compare_commits(repo, old_branch, new_branch)
            .await
            .map_err(|e| ReleaseError::RangeQueryFailed {
                repo: repo.to_string(),
                reason: e.to_string(),
            })
    }

    /// Commits strictly newer than `old_commit`, starting from `new_commit`,
    /// newest first.
    ///
    /// Fetches a bounded reverse-chronological listing from `new_commit` and
    /// cuts it at `old_commit`. When `old_commit` does not appear in the
    /// listing (rewritten history, or the page bound was hit first) the
    /// entire fetched page is returned and a warning is emitted.
    pub async fn between_commits(
        &self,
        repo: &str,
        old_commit: &str,
        new_commit: &str,
    ) -> Result<Vec<Commit>> {
        let listing = self
            .scm
            .list_commits_from(repo, new_commit, self.options.max_commits)
            .await
            .map_err(|e| ReleaseError::RangeQueryFailed {
                repo: repo.to_string(),
                reason: e.to_string(),
            })?;

        match listing.iter().position(|c| c.id == old_commit) {
            Some(cut) => {
                debug!(repo, commits = cut, "commit range truncated at previous release");
                Ok(listing.into_iter().take(cut).collect())
            }
            None => {
                warn!(
                    repo,
                    old_commit,
                    page_size = self.options.max_commits,
                    fetched = listing.len(),
                    "previous release commit not found in listing, returning entire page"
                );
                Ok(listing)
            }
        }
    }
}
