//! Ref resolution: branch heads, latest release version, tag dereferencing.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiError, SourceControlApi};
use crate::error::{ReleaseError, Result};
use crate::version::Version;

/// Resolves symbolic ref names against the remote history store.
pub struct RefResolver {
    scm: Arc<dyn SourceControlApi>,
}

impl RefResolver {
    pub fn new(scm: Arc<dyn SourceControlApi>) -> Self {
        Self { scm }
    }

    /// Commit id at the tip of `branch`.
    ///
    /// An absent branch is [`ReleaseError::RefNotFound`]: a release cannot
    /// be cut without a source commit, so callers treat this as fatal for
    /// the repository.
    pub async fn branch_head(&self, repo: &str, branch: &str) -> Result<String> {
        let head = match self.scm.branch_head(repo, branch).await {
            Ok(head) => head,
            Err(ApiError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        head.ok_or_else(|| ReleaseError::RefNotFound {
            repo: repo.to_string(),
            name: branch.to_string(),
        })
    }

    /// Highest version among existing `release/{major}.{minor}` branches,
    /// or `None` when the repository has never been released.
    ///
    /// Refs whose name does not parse as a release version are skipped.
    pub async fn latest_release_version(&self, repo: &str) -> Result<Option<Version>> {
        let refs = self.scm.list_refs(repo, "heads/release/").await?;
        let latest = refs
            .iter()
            .filter_map(|r| Version::from_release_branch(&r.name))
            .max();
        debug!(repo, ?latest, "resolved latest release version");
        Ok(latest)
    }

    /// Resolve a tag ref's object id to the commit it ultimately points at.
    ///
    /// Annotated tags need one dereference hop through the tag object. When
    /// that hop fails for any reason the id is returned unchanged, treating
    /// the ref as a lightweight tag; the degradation is logged, never
    /// surfaced.
    pub async fn dereference_tag(&self, repo: &str, tag_object_id: &str) -> String {
        match self.scm.get_annotated_tag(repo, tag_object_id).await {
            Ok(tag) => tag.target_object_id,
            Err(e) => {
                warn!(
                    repo,
                    tag_object_id,
                    error = %e,
                    "annotated tag lookup failed, treating as lightweight tag"
                );
                tag_object_id.to_string()
            }
        }
    }
}
