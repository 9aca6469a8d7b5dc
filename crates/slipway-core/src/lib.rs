//! Slipway core — release-diff and work-item-aggregation pipeline.
//!
//! Provides:
//! - [`version`] — version bump policy and release branch/tag naming
//! - [`refs`] — branch/tag resolution, annotated-tag dereferencing
//! - [`range`] — commit-range computation between two releases
//! - [`extract`] — work-item reference extraction strategies
//! - [`resolve`] — work-item record resolution with per-id fault tolerance
//! - [`pipeline`] — per-repository release orchestration and batch aggregation
//!
//! The remote source-control/work-tracking system is injected through the
//! [`api::SourceControlApi`] and [`api::WorkTrackingApi`] traits; plug in the
//! REST client from `slipway-remote`, or in-memory stubs for tests.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use slipway_core::pipeline::{ReleasePipeline, consolidated_work_items};
//!
//! let pipeline = ReleasePipeline::new(scm, tracking);
//! let results = pipeline.run_release_batch(&repositories).await;
//! let work_items = consolidated_work_items(&results);
//! ```

pub mod api;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod range;
pub mod refs;
pub mod resolve;
pub mod version;

pub use api::{ApiError, ApiResult, SourceControlApi, WorkTrackingApi};
pub use error::{ReleaseError, Result};
pub use model::{
    Commit, GitRef, ProcessingResult, RepoOutcome, Repository, TagObject, WorkItem, WorkItemId,
};
pub use pipeline::{consolidated_work_items, BatchOptions, ReleasePipeline};
pub use version::{BumpKind, CurrentVersion, Version};
