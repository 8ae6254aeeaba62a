//! Change batcher
//!
//! Groups atomic changes by the zone that has to execute them. Every forward
//! zone is pre-seeded with an empty list so callers can tell "nothing to do"
//! from "zone missing". Reverse zone lists only appear once a derived PTR
//! change lands in them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::endpoint::{Action, AtomicChange};
use crate::error::Error;
use crate::ptr;
use crate::zone::{Zone, ZoneDirectory};

/// A change that could not be routed and was left out of the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedChange {
    /// The change that was dropped
    pub change: AtomicChange,
    /// Why it was dropped
    pub reason: String,
}

/// Changes grouped by owning zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonedChangeSet {
    zones: BTreeMap<String, Vec<AtomicChange>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    skipped: Vec<SkippedChange>,
}

impl ZonedChangeSet {
    /// Changes routed to `zone`, or `None` if the zone is not in the plan
    pub fn zone(&self, zone: &str) -> Option<&[AtomicChange]> {
        self.zones.get(zone).map(Vec::as_slice)
    }

    /// Zone names in the plan
    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.zones.keys().map(String::as_str)
    }

    /// `(zone, changes)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AtomicChange])> {
        self.zones.iter().map(|(z, c)| (z.as_str(), c.as_slice()))
    }

    /// Changes dropped because no zone owns them
    pub fn skipped(&self) -> &[SkippedChange] {
        &self.skipped
    }

    /// Number of routed changes across all zones
    pub fn total_changes(&self) -> usize {
        self.zones.values().map(Vec::len).sum()
    }

    /// Whether no zone has any change
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }

    /// Changes for `zone` ordered deletes, then creates, then updates.
    ///
    /// Submitting in this order avoids transient duplicate-name conflicts at
    /// the backend. Relative order within one action is preserved.
    pub fn submission_order(&self, zone: &str) -> Vec<&AtomicChange> {
        let mut changes: Vec<&AtomicChange> =
            self.zones.get(zone).map(|c| c.iter().collect()).unwrap_or_default();
        changes.sort_by_key(|c| match c.action() {
            Action::Delete => 0,
            Action::Create => 1,
            Action::Update => 2,
        });
        changes
    }

    fn seed(&mut self, zone: &Zone) {
        self.zones.entry(zone.name().to_string()).or_default();
    }

    fn push(&mut self, zone: &Zone, change: AtomicChange) {
        self.zones
            .entry(zone.name().to_string())
            .or_default()
            .push(change);
    }

    fn skip(&mut self, change: AtomicChange, reason: impl Into<String>) {
        self.skipped.push(SkippedChange {
            change,
            reason: reason.into(),
        });
    }
}

/// Routes atomic changes into a [`ZonedChangeSet`]
#[derive(Debug, Clone)]
pub struct ChangeBatcher {
    forward: Vec<Zone>,
    reverse: Vec<Zone>,
    reverse_records: bool,
}

impl ChangeBatcher {
    /// Create a batcher over the zones of `directory`
    pub fn new(directory: &ZoneDirectory) -> Self {
        Self {
            forward: directory.forward(),
            reverse: directory.reverse(),
            reverse_records: false,
        }
    }

    /// Derive PTR changes for A changes
    pub fn with_reverse_records(mut self, enabled: bool) -> Self {
        self.reverse_records = enabled;
        self
    }

    /// Group `changes` by owning zone
    pub fn batch<I>(&self, changes: I) -> ZonedChangeSet
    where
        I: IntoIterator<Item = AtomicChange>,
    {
        let mut set = ZonedChangeSet::default();
        for zone in &self.forward {
            set.seed(zone);
        }

        for change in changes {
            let Some(zone) = crate::router::find_forward_zone(&self.forward, change.dns_name())
            else {
                let err = Error::unroutable(change.dns_name(), "no forward zone owns this name");
                tracing::debug!("Skipping record: {}", err);
                set.skip(change, err.to_string());
                continue;
            };

            let derived = if self.reverse_records {
                ptr::derive_ptr_change(&change, &self.reverse)
            } else {
                None
            };

            set.push(zone, change);

            if let Some((reverse_zone, ptr_change)) = derived {
                set.push(reverse_zone, ptr_change);
            }
        }

        set
    }
}

/// Group `changes` by owning zone without PTR derivation
pub fn batch(directory: &ZoneDirectory, changes: Vec<AtomicChange>) -> ZonedChangeSet {
    ChangeBatcher::new(directory).batch(changes)
}
