//! Queue state as captured in a snapshot

use crate::state::{Job, PageJob};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a job still has to be processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Enqueued and not yet fully handled
    Pending,

    /// Handed to a worker and finished (successfully or not)
    Done,
}

impl JobStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Every job a queue has ever seen, with its status
///
/// Ordered so that iteration, and therefore every "pick any" decision made
/// from it, is deterministic.
pub type QueueState = BTreeMap<Job, JobStatus>;

/// Picks the page a resumed crawl should start from
///
/// Prefers the first pending page; if every page is done, falls back to the
/// first page so the crawl can look for new content. Returns `None` when the
/// state holds no page at all.
pub fn pick_resume_page(state: &QueueState) -> Option<PageJob> {
    let pages: Vec<(&PageJob, JobStatus)> = state
        .iter()
        .filter_map(|(job, status)| job.as_page().map(|page| (page, *status)))
        .collect();

    pages
        .iter()
        .find(|(_, status)| status.is_pending())
        .or_else(|| pages.first())
        .map(|(page, _)| (*page).clone())
}

/// Counts the pending jobs in a state
pub fn count_pending(state: &QueueState) -> usize {
    state.values().filter(|status| status.is_pending()).count()
}
