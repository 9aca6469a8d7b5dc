//! Domain records shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::version::{BumpKind, CurrentVersion, Version};

/// Identifier of a work item in the tracking system.
pub type WorkItemId = u64;

/// A repository participating in a release batch.
///
/// Populated at batch start and read-only during pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    /// Remote repository identifier (API path segment).
    pub name: String,
    /// Human-facing name for reports.
    pub display_name: String,
    /// Latest released version, or a sentinel when none was found.
    pub current_version: CurrentVersion,
    /// Which component the next release bumps.
    pub bump: BumpKind,
    /// Branch the release is cut from.
    pub source_branch: String,
    /// Whether this repository participates in the batch. Deselected
    /// repositories are skipped entirely, with no result recorded.
    #[serde(default = "default_selected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl Repository {
    pub fn new(name: impl Into<String>, current_version: CurrentVersion, bump: BumpKind) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            current_version,
            bump,
            source_branch: "main".to_string(),
            selected: true,
        }
    }

    pub fn with_source_branch(mut self, branch: impl Into<String>) -> Self {
        self.source_branch = branch.into();
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

/// A named pointer into the remote history store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    /// Ref name, e.g. `refs/heads/release/1.2` or `refs/tags/v1.2`.
    pub name: String,
    /// Object the ref currently points to: a commit, or a tag object for
    /// annotated tags.
    pub object_id: String,
}

/// An annotated tag object: one dereference hop away from its commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagObject {
    pub object_id: String,
    /// The commit the tag annotates.
    pub target_object_id: String,
}

/// A commit as reported by the remote listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub author: String,
    pub message: String,
    /// Work items explicitly linked to this commit in the remote record.
    #[serde(default)]
    pub linked_work_items: Vec<WorkItemId>,
}

impl Commit {
    pub fn new(id: impl Into<String>, author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: author.into(),
            message: message.into(),
            linked_work_items: Vec::new(),
        }
    }

    pub fn with_links(mut self, links: Vec<WorkItemId>) -> Self {
        self.linked_work_items = links;
        self
    }
}

/// A resolved work-item record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: WorkItemId,
    /// Type/category, e.g. `"Bug"` or `"User Story"`.
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    pub url: String,
}

/// Outcome of one repository's pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoOutcome {
    /// Branch and tag were created. `work_items` may be empty when the
    /// repository had no prior release or when range/extraction degraded.
    Completed {
        version: Version,
        work_items: Vec<WorkItem>,
    },
    /// A fatal stage failed; nothing further was attempted for this repo.
    Failed { error: String },
}

/// Per-repository processing record, immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub repository: String,
    pub outcome: RepoOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl ProcessingResult {
    pub fn completed(repository: impl Into<String>, version: Version, work_items: Vec<WorkItem>) -> Self {
        Self {
            repository: repository.into(),
            outcome: RepoOutcome::Completed {
                version,
                work_items,
            },
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(repository: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            outcome: RepoOutcome::Failed {
                error: error.into(),
            },
            recorded_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RepoOutcome::Completed { .. })
    }
}
