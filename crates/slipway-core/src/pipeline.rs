//! Per-repository release orchestration and batch aggregation.
//!
//! [`ReleasePipeline`] runs each repository through a strict stage sequence:
//! resolve the source commit, create the release branch and annotated tag,
//! then (when a prior release exists) compute the commit range and harvest
//! work items. Failures before the tag exists are fatal for that repository
//! only; later failures degrade to an empty work-item list. The batch never
//! aborts because one repository failed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{SourceControlApi, WorkTrackingApi};
use crate::error::{ReleaseError, Result};
use crate::extract::WorkItemExtractor;
use crate::model::{Commit, ProcessingResult, RepoOutcome, Repository, WorkItem};
use crate::range::{CommitRangeComputer, RangeOptions};
use crate::refs::RefResolver;
use crate::resolve::WorkItemResolver;
use crate::version::{next_version, Version};

/// Batch-level knobs.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Tag-to-tag listing bounds, passed through to the range computer.
    pub range: RangeOptions,
}

/// Orchestrates a release batch against injected remote backends.
pub struct ReleasePipeline {
    scm: Arc<dyn SourceControlApi>,
    refs: RefResolver,
    range: CommitRangeComputer,
    extractor: WorkItemExtractor,
    resolver: WorkItemResolver,
    cancel: Arc<AtomicBool>,
}

impl ReleasePipeline {
    pub fn new(scm: Arc<dyn SourceControlApi>, tracking: Arc<dyn WorkTrackingApi>) -> Self {
        Self::with_options(scm, tracking, BatchOptions::default())
    }

    pub fn with_options(
        scm: Arc<dyn SourceControlApi>,
        tracking: Arc<dyn WorkTrackingApi>,
        options: BatchOptions,
    ) -> Self {
        Self {
            refs: RefResolver::new(Arc::clone(&scm)),
            range: CommitRangeComputer::new(Arc::clone(&scm)).with_options(options.range),
            extractor: WorkItemExtractor::new(Arc::clone(&scm)),
            resolver: WorkItemResolver::new(tracking),
            scm,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// External cancellation signal, checked between repositories only so a
    /// created branch/tag always gets a recorded result.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Process every selected repository in input order and record one
    /// [`ProcessingResult`] each. Deselected repositories are skipped with
    /// no result recorded.
    ///
    /// When the cancel flag flips, repositories not yet started are left
    /// unrecorded and the partial result list is returned.
    pub async fn run_release_batch(&self, repositories: &[Repository]) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(repositories.len());

        for (idx, repo) in repositories.iter().enumerate() {
            if !repo.selected {
                debug!(repo = %repo.name, "repository deselected, skipping");
                continue;
            }
            if self.cancel.load(Ordering::SeqCst) {
                warn!(
                    processed = results.len(),
                    remaining = repositories.len() - idx,
                    "release batch cancelled"
                );
                break;
            }

            let result = match self.release_repository(repo).await {
                Ok((version, work_items)) => {
                    info!(
                        repo = %repo.name,
                        version = %version,
                        work_items = work_items.len(),
                        "repository released"
                    );
                    ProcessingResult::completed(&repo.name, version, work_items)
                }
                Err(e) => {
                    warn!(repo = %repo.name, error = %e, "repository release failed");
                    ProcessingResult::failed(&repo.name, e.to_string())
                }
            };
            results.push(result);
        }

        results
    }

    /// Run one repository through the stage sequence.
    ///
    /// Errors returned here are the fatal ones (source commit, branch, tag);
    /// range and work-item failures are absorbed into an empty list.
    async fn release_repository(&self, repo: &Repository) -> Result<(Version, Vec<WorkItem>)> {
        let version = next_version(&repo.current_version, repo.bump);

        // Stage 1: the release must have a source commit.
        let source_commit = self.refs.branch_head(&repo.name, &repo.source_branch).await?;

        // Stage 2: release branch.
        let branch = version.release_branch();
        self.scm
            .create_ref(&repo.name, &format!("refs/heads/{branch}"), &source_commit)
            .await
            .map_err(|e| ReleaseError::BranchCreateFailed {
                repo: repo.name.clone(),
                branch: branch.clone(),
                reason: e.to_string(),
            })?;

        // Stage 3: annotated tag on the same commit.
        let tag = version.tag_name();
        self.scm
            .create_annotated_tag(
                &repo.name,
                &tag,
                &source_commit,
                &format!("Release {version}"),
            )
            .await
            .map_err(|e| ReleaseError::TagCreateFailed {
                repo: repo.name.clone(),
                tag: tag.clone(),
                reason: e.to_string(),
            })?;

        // First release: nothing to diff against.
        let Some(previous) = (match repo.current_version {
            crate::version::CurrentVersion::Released(v) => Some(v),
            _ => None,
        }) else {
            info!(repo = %repo.name, version = %version, "first release, skipping diff");
            return Ok((version, Vec::new()));
        };

        // Stages 4-5 degrade, never abort: the branch and tag exist.
        let work_items = match self
            .commits_since(&repo.name, previous, &source_commit, version)
            .await
        {
            Ok(commits) => {
                let ids = self.extractor.extract(&repo.name, &commits).await;
                self.resolver.resolve(&ids).await
            }
            Err(e) => {
                warn!(
                    repo = %repo.name,
                    error = %e,
                    "commit range unavailable, recording release with no work items"
                );
                Vec::new()
            }
        };

        Ok((version, work_items))
    }

    /// Commits introduced since the `previous` release.
    ///
    /// Prefers the tag-to-tag listing (the new tag's commit is already
    /// known); when the previous release tag is missing entirely, compares
    /// the two release branches instead.
    async fn commits_since(
        &self,
        repo: &str,
        previous: Version,
        new_commit: &str,
        new_version: Version,
    ) -> Result<Vec<Commit>> {
        let old_tag = previous.tag_name();
        let tag_refs = self
            .scm
            .list_refs(repo, &format!("tags/{old_tag}"))
            .await
            .map_err(|e| ReleaseError::RangeQueryFailed {
                repo: repo.to_string(),
                reason: e.to_string(),
            })?;

        let exact = format!("refs/tags/{old_tag}");
        if let Some(tag_ref) = tag_refs.iter().find(|r| r.name == exact || r.name == old_tag) {
            // Annotated tags point at a tag object; dereference falls back
            // to the ref's own id for lightweight tags.
            let old_commit = self.refs.dereference_tag(repo, &tag_ref.object_id).await;
            self.range.between_commits(repo, &old_commit, new_commit).await
        } else {
            warn!(repo, tag = %old_tag, "previous release tag missing, comparing branches");
            self.range
                .between_branches(repo, &previous.release_branch(), &new_version.release_branch())
                .await
        }
    }
}

/// Union of every successful repository's work items, deduplicated by id
/// across the whole batch. The first-seen record wins, in processing order.
pub fn consolidated_work_items(results: &[ProcessingResult]) -> Vec<WorkItem> {
    let mut seen = std::collections::HashSet::new();
    let mut consolidated = Vec::new();
    for result in results {
        if let RepoOutcome::Completed { work_items, .. } = &result.outcome {
            for item in work_items {
                if seen.insert(item.id) {
                    consolidated.push(item.clone());
                }
            }
        }
    }
    consolidated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, ApiResult};
    use crate::model::{GitRef, TagObject, WorkItemId};
    use crate::version::{BumpKind, CurrentVersion};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory remote with scripted failures.
    #[derive(Default)]
    struct FakeRemote {
        heads: HashMap<String, String>,
        tag_refs: HashMap<String, Vec<GitRef>>,
        tag_objects: HashMap<String, TagObject>,
        listings: HashMap<String, Vec<Commit>>,
        items: HashMap<WorkItemId, WorkItem>,
        fail_tag_for: Option<String>,
        fail_listing: bool,
        created_refs: Mutex<Vec<(String, String)>>,
        created_tags: Mutex<Vec<(String, String)>>,
    }

    fn item(id: WorkItemId, title: &str) -> WorkItem {
        WorkItem {
            id,
            kind: "Bug".to_string(),
            title: title.to_string(),
            description: None,
            state: "Resolved".to_string(),
            url: format!("https://example.test/wit/{id}"),
        }
    }

    #[async_trait]
    impl SourceControlApi for FakeRemote {
        async fn list_refs(&self, repo: &str, filter: &str) -> ApiResult<Vec<GitRef>> {
            if filter.starts_with("tags/") {
                return Ok(self.tag_refs.get(repo).cloned().unwrap_or_default());
            }
            Ok(vec![])
        }

        async fn branch_head(&self, repo: &str, branch: &str) -> ApiResult<Option<String>> {
            Ok(self.heads.get(&format!("{repo}:{branch}")).cloned())
        }

        async fn compare_commits(
            &self,
            repo: &str,
            _base: &str,
            _target: &str,
        ) -> ApiResult<Vec<Commit>> {
            Ok(self.listings.get(repo).cloned().unwrap_or_default())
        }

        async fn list_commits_from(
            &self,
            repo: &str,
            _commit: &str,
            max: usize,
        ) -> ApiResult<Vec<Commit>> {
            if self.fail_listing {
                return Err(ApiError::Remote("listing unavailable".to_string()));
            }
            Ok(self
                .listings
                .get(repo)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(max)
                .collect())
        }

        async fn create_ref(&self, repo: &str, name: &str, object_id: &str) -> ApiResult<GitRef> {
            self.created_refs
                .lock()
                .unwrap()
                .push((repo.to_string(), name.to_string()));
            Ok(GitRef {
                name: name.to_string(),
                object_id: object_id.to_string(),
            })
        }

        async fn create_annotated_tag(
            &self,
            repo: &str,
            name: &str,
            target_object_id: &str,
            _message: &str,
        ) -> ApiResult<TagObject> {
            if self.fail_tag_for.as_deref() == Some(repo) {
                return Err(ApiError::Remote("tag already exists".to_string()));
            }
            self.created_tags
                .lock()
                .unwrap()
                .push((repo.to_string(), name.to_string()));
            Ok(TagObject {
                object_id: format!("tagobj-{name}"),
                target_object_id: target_object_id.to_string(),
            })
        }

        async fn get_annotated_tag(&self, _repo: &str, object_id: &str) -> ApiResult<TagObject> {
            self.tag_objects
                .get(object_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(object_id.to_string()))
        }

        async fn commit_work_item_links(
            &self,
            _repo: &str,
            _commit_id: &str,
        ) -> ApiResult<Vec<WorkItemId>> {
            Ok(vec![])
        }

        async fn pull_request_work_item_links(
            &self,
            _repo: &str,
            _pull_request_id: u64,
        ) -> ApiResult<Vec<WorkItemId>> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl WorkTrackingApi for FakeRemote {
        async fn work_item(&self, id: WorkItemId) -> ApiResult<WorkItem> {
            self.items
                .get(&id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(id.to_string()))
        }

        async fn update_work_item_field(
            &self,
            _id: WorkItemId,
            _field: &str,
            _value: &str,
        ) -> ApiResult<()> {
            Ok(())
        }
    }

    fn repo(name: &str, current: CurrentVersion, bump: BumpKind) -> Repository {
        Repository::new(name, current, bump)
    }

    /// Remote where `org/app` has a 1.0 release (lightweight tag at c2) and
    /// three newer commits mentioning work items 10 and 11.
    fn seeded_remote() -> FakeRemote {
        let mut remote = FakeRemote::default();
        remote.heads.insert("org/app:main".to_string(), "c5".to_string());
        remote.tag_refs.insert(
            "org/app".to_string(),
            vec![GitRef {
                name: "refs/tags/v1.0".to_string(),
                object_id: "c2".to_string(),
            }],
        );
        remote.listings.insert(
            "org/app".to_string(),
            vec![
                Commit::new("c5", "dev", "polish #10"),
                Commit::new("c4", "dev", "fix AB#11"),
                Commit::new("c3", "dev", "chore"),
                Commit::new("c2", "dev", "old release work #99"),
                Commit::new("c1", "dev", "ancient #98"),
            ],
        );
        remote.items.insert(10, item(10, "polish pass"));
        remote.items.insert(11, item(11, "crash fix"));
        remote
    }

    #[tokio::test]
    async fn test_release_with_prior_version_collects_work_items() {
        let remote = Arc::new(seeded_remote());
        let pipeline = ReleasePipeline::new(remote.clone(), remote.clone());

        let repos = vec![repo(
            "org/app",
            CurrentVersion::Released(Version::new(1, 0)),
            BumpKind::Minor,
        )];
        let results = pipeline.run_release_batch(&repos).await;

        assert_eq!(results.len(), 1);
        match &results[0].outcome {
            RepoOutcome::Completed { version, work_items } => {
                assert_eq!(*version, Version::new(1, 1));
                let ids: Vec<WorkItemId> = work_items.iter().map(|i| i.id).collect();
                // Commits at and below the old tag (c2, c1) are excluded.
                assert_eq!(ids, vec![10, 11]);
            }
            other => panic!("expected success, got {other:?}"),
        }

        let refs = remote.created_refs.lock().unwrap();
        assert_eq!(refs[0].1, "refs/heads/release/1.1");
        let tags = remote.created_tags.lock().unwrap();
        assert_eq!(tags[0].1, "v1.1");
    }

    #[tokio::test]
    async fn test_first_release_skips_diff_entirely() {
        let mut remote = FakeRemote::default();
        remote.heads.insert("org/new:main".to_string(), "c1".to_string());
        remote.fail_listing = true; // would fail if the diff stage ran
        let remote = Arc::new(remote);
        let pipeline = ReleasePipeline::new(remote.clone(), remote.clone());

        let repos = vec![repo("org/new", CurrentVersion::NoReleases, BumpKind::Major)];
        let results = pipeline.run_release_batch(&repos).await;

        match &results[0].outcome {
            RepoOutcome::Completed { version, work_items } => {
                assert_eq!(*version, Version::new(1, 0));
                assert!(work_items.is_empty());
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_source_branch_is_fatal_for_repo() {
        let remote = Arc::new(FakeRemote::default());
        let pipeline = ReleasePipeline::new(remote.clone(), remote.clone());

        let repos = vec![repo("org/app", CurrentVersion::NoReleases, BumpKind::Minor)];
        let results = pipeline.run_release_batch(&repos).await;

        match &results[0].outcome {
            RepoOutcome::Failed { error } => assert!(error.contains("ref not found")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_middle_repo_failure_does_not_abort_batch() {
        let mut remote = seeded_remote();
        remote.heads.insert("org/lib:main".to_string(), "d1".to_string());
        remote.heads.insert("org/tool:main".to_string(), "e1".to_string());
        remote.fail_tag_for = Some("org/lib".to_string());
        let remote = Arc::new(remote);
        let pipeline = ReleasePipeline::new(remote.clone(), remote.clone());

        let repos = vec![
            repo(
                "org/app",
                CurrentVersion::Released(Version::new(1, 0)),
                BumpKind::Minor,
            ),
            repo("org/lib", CurrentVersion::NoReleases, BumpKind::Major),
            repo("org/tool", CurrentVersion::NoReleases, BumpKind::Minor),
        ];
        let results = pipeline.run_release_batch(&repos).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_success());
        match &results[1].outcome {
            RepoOutcome::Failed { error } => assert!(error.contains("tag already exists")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(results[2].is_success());
    }

    #[tokio::test]
    async fn test_range_failure_degrades_to_empty_work_items() {
        let mut remote = seeded_remote();
        remote.fail_listing = true;
        let remote = Arc::new(remote);
        let pipeline = ReleasePipeline::new(remote.clone(), remote.clone());

        let repos = vec![repo(
            "org/app",
            CurrentVersion::Released(Version::new(1, 0)),
            BumpKind::Major,
        )];
        let results = pipeline.run_release_batch(&repos).await;

        match &results[0].outcome {
            RepoOutcome::Completed { version, work_items } => {
                assert_eq!(*version, Version::new(2, 0));
                assert!(work_items.is_empty());
            }
            other => panic!("expected degraded success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deselected_repositories_are_skipped_without_result() {
        let mut remote = FakeRemote::default();
        remote.heads.insert("org/a:main".to_string(), "a1".to_string());
        remote.heads.insert("org/c:main".to_string(), "c1".to_string());
        let remote = Arc::new(remote);
        let pipeline = ReleasePipeline::new(remote.clone(), remote.clone());

        let repos = vec![
            repo("org/a", CurrentVersion::NoReleases, BumpKind::Minor),
            repo("org/b", CurrentVersion::NoReleases, BumpKind::Minor).with_selected(false),
            repo("org/c", CurrentVersion::NoReleases, BumpKind::Minor),
        ];
        let results = pipeline.run_release_batch(&repos).await;

        // org/b gets no result at all, and nothing was created for it.
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].repository, "org/a");
        assert_eq!(results[1].repository, "org/c");
        let refs = remote.created_refs.lock().unwrap();
        assert!(refs.iter().all(|(r, _)| r != "org/b"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_repositories() {
        let mut remote = FakeRemote::default();
        remote.heads.insert("org/a:main".to_string(), "a1".to_string());
        remote.heads.insert("org/b:main".to_string(), "b1".to_string());
        let remote = Arc::new(remote);
        let pipeline = ReleasePipeline::new(remote.clone(), remote.clone());
        pipeline.cancel_flag().store(true, Ordering::SeqCst);

        let repos = vec![
            repo("org/a", CurrentVersion::NoReleases, BumpKind::Minor),
            repo("org/b", CurrentVersion::NoReleases, BumpKind::Minor),
        ];
        let results = pipeline.run_release_batch(&repos).await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_consolidation_first_seen_record_wins() {
        let shared_from_app = item(100, "as seen by app");
        let mut shared_from_lib = item(100, "as seen by lib");
        shared_from_lib.state = "Closed".to_string();

        let results = vec![
            ProcessingResult::completed(
                "org/app",
                Version::new(1, 1),
                vec![shared_from_app.clone(), item(101, "app only")],
            ),
            ProcessingResult::failed("org/lib", "tag exists"),
            ProcessingResult::completed(
                "org/tool",
                Version::new(0, 2),
                vec![shared_from_lib, item(102, "tool only")],
            ),
        ];

        let consolidated = consolidated_work_items(&results);
        let ids: Vec<WorkItemId> = consolidated.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![100, 101, 102]);
        // The first-processed repository's snapshot of 100 is kept.
        assert_eq!(consolidated[0].title, "as seen by app");
    }
}
