//! Work-item record resolution.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::WorkTrackingApi;
use crate::model::{WorkItem, WorkItemId};

/// Fetches full work-item records for a set of ids.
///
/// Resolution is per-id fault tolerant: a failed fetch (missing item,
/// transient error past retries) is logged and the id omitted from the
/// result. Callers aggregate by id, so order carries no meaning beyond the
/// input order preserved here.
pub struct WorkItemResolver {
    tracking: Arc<dyn WorkTrackingApi>,
}

impl WorkItemResolver {
    pub fn new(tracking: Arc<dyn WorkTrackingApi>) -> Self {
        Self { tracking }
    }

    pub async fn resolve(&self, ids: &[WorkItemId]) -> Vec<WorkItem> {
        let mut items = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.tracking.work_item(id).await {
                Ok(item) => items.push(item),
                Err(e) => {
                    warn!(work_item = id, error = %e, "work item fetch failed, omitting");
                }
            }
        }
        debug!(requested = ids.len(), resolved = items.len(), "work items resolved");
        items
    }
}
