//! Work-item reference extraction.
//!
//! Three independent sources scan every commit (explicit commit links, the
//! pull-request merge pattern, and inline `#id` / `AB#id` tokens), and a
//! final server-side per-commit link query fills in references that never
//! appear in the message. Results are unioned and deduplicated by id, first
//! discovery winning for order.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::api::SourceControlApi;
use crate::model::{Commit, WorkItemId};

/// One extraction heuristic.
///
/// Implementations must never fail the scan: a source that cannot produce
/// references for a commit logs and returns an empty list.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Work-item ids this source finds in `commit`.
    async fn extract(&self, repo: &str, commit: &Commit) -> Vec<WorkItemId>;
}

/// Source 1: the commit record's explicit linked-work-item list.
pub struct ExplicitLinks;

#[async_trait]
impl ReferenceSource for ExplicitLinks {
    fn name(&self) -> &'static str {
        "explicit-links"
    }

    async fn extract(&self, _repo: &str, commit: &Commit) -> Vec<WorkItemId> {
        commit.linked_work_items.clone()
    }
}

/// Source 2: `Merged PR <N>` merge commits.
///
/// The matched number is a pull-request id, not a work-item id; the work
/// items linked to that pull request are fetched remotely. A failed lookup
/// skips this source for the commit, it never aborts the scan.
pub struct PrMergeLinks {
    scm: Arc<dyn SourceControlApi>,
    pattern: Regex,
}

impl PrMergeLinks {
    pub fn new(scm: Arc<dyn SourceControlApi>) -> Self {
        Self {
            scm,
            pattern: Regex::new(r"(?i)merged pr (\d+)").expect("static pattern compiles"),
        }
    }
}

#[async_trait]
impl ReferenceSource for PrMergeLinks {
    fn name(&self) -> &'static str {
        "pr-merge"
    }

    async fn extract(&self, repo: &str, commit: &Commit) -> Vec<WorkItemId> {
        let Some(caps) = self.pattern.captures(&commit.message) else {
            return Vec::new();
        };
        let Ok(pr_id) = caps[1].parse::<u64>() else {
            return Vec::new();
        };
        match self.scm.pull_request_work_item_links(repo, pr_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(
                    repo,
                    commit = %commit.id,
                    pr_id,
                    error = %e,
                    "pull request work-item lookup failed, skipping source"
                );
                Vec::new()
            }
        }
    }
}

/// Source 3: inline `#123` and `AB#123` tokens anywhere in the message.
pub struct InlineRefs {
    pattern: Regex,
}

impl InlineRefs {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"(?i)(?:AB)?#(\d+)").expect("static pattern compiles"),
        }
    }
}

impl Default for InlineRefs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferenceSource for InlineRefs {
    fn name(&self) -> &'static str {
        "inline-refs"
    }

    async fn extract(&self, _repo: &str, commit: &Commit) -> Vec<WorkItemId> {
        self.pattern
            .captures_iter(&commit.message)
            .filter_map(|caps| caps[1].parse::<u64>().ok())
            .collect()
    }
}

/// Runs every [`ReferenceSource`] over every commit and unions the results.
pub struct WorkItemExtractor {
    scm: Arc<dyn SourceControlApi>,
    sources: Vec<Box<dyn ReferenceSource>>,
}

impl WorkItemExtractor {
    /// Extractor with the three standard sources installed.
    pub fn new(scm: Arc<dyn SourceControlApi>) -> Self {
        let sources: Vec<Box<dyn ReferenceSource>> = vec![
            Box::new(ExplicitLinks),
            Box::new(PrMergeLinks::new(Arc::clone(&scm))),
            Box::new(InlineRefs::new()),
        ];
        Self { scm, sources }
    }

    /// Add a custom source; it participates in the union like the others.
    pub fn with_source(mut self, source: Box<dyn ReferenceSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Deduplicated work-item ids referenced by `commits`, in first-seen
    /// order.
    ///
    /// Every source runs for every commit regardless of what earlier
    /// sources found; the server-side per-commit link query runs last and
    /// also merges in. Failures of that query are logged and skipped.
    pub async fn extract(&self, repo: &str, commits: &[Commit]) -> Vec<WorkItemId> {
        let mut seen: HashSet<WorkItemId> = HashSet::new();
        let mut ordered: Vec<WorkItemId> = Vec::new();

        for commit in commits {
            for source in &self.sources {
                for id in source.extract(repo, commit).await {
                    if seen.insert(id) {
                        ordered.push(id);
                    }
                }
            }

            match self.scm.commit_work_item_links(repo, &commit.id).await {
                Ok(ids) => {
                    for id in ids {
                        if seen.insert(id) {
                            ordered.push(id);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        repo,
                        commit = %commit.id,
                        error = %e,
                        "commit work-item link query failed, skipping"
                    );
                }
            }
        }

        debug!(repo, commits = commits.len(), ids = ordered.len(), "extraction complete");
        ordered
    }
}
