//! Per-change outcomes of an apply pass

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::BackendRef;
use crate::endpoint::AtomicChange;

/// What happened to one change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Submitted to the backend
    Applied {
        /// Reference the backend returned
        reference: BackendRef,
    },
    /// Built and logged but not submitted
    DryRun,
    /// Left out of the pass
    Skipped {
        /// Why the change was left out
        reason: String,
    },
}

/// One change and its outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeOutcome {
    /// Zone that owns the change, `None` if it could not be routed
    pub zone: Option<String>,
    /// The change
    pub change: AtomicChange,
    /// The outcome
    #[serde(flatten)]
    pub status: ChangeStatus,
}

/// Report of one apply pass
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// When the pass finished
    pub finished_at: DateTime<Utc>,
    /// Whether the pass ran in dry-run mode
    pub dry_run: bool,
    /// Outcomes in submission order, unroutable changes first
    pub outcomes: Vec<ChangeOutcome>,
}

impl ApplyReport {
    pub(crate) fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            dry_run,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, zone: Option<&str>, change: &AtomicChange, status: ChangeStatus) {
        self.outcomes.push(ChangeOutcome {
            zone: zone.map(str::to_string),
            change: change.clone(),
            status,
        });
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Number of changes submitted to the backend
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, ChangeStatus::Applied { .. }))
    }

    /// Number of changes only logged because of dry-run mode
    pub fn dry_run_count(&self) -> usize {
        self.count(|s| matches!(s, ChangeStatus::DryRun))
    }

    /// Number of changes left out of the pass
    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ChangeStatus::Skipped { .. }))
    }

    /// Whether the pass touched nothing
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn count(&self, pred: impl Fn(&ChangeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}
