//! Target differ
//!
//! Turns the planning engine's coarse batches into atomic single-target
//! changes. Update pairs are compared by target *set*: targets that only the
//! old version has are deleted, targets that only the new version has are
//! created, and shared targets produce nothing (unless attribute updates are
//! enabled, see [`DiffOptions::emit_attribute_updates`]).
//!
//! The differ never mutates its input; every output collection is built
//! fresh.

use std::collections::{BTreeMap, BTreeSet};

use crate::endpoint::{Action, AtomicChange, ChangeBatches, Endpoint, EndpointKey};
use crate::error::{Error, Result};

/// Tunables for a diff
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Emit `Update` for a shared target whose TTL or annotations changed
    pub emit_attribute_updates: bool,
}

/// Atomic changes grouped by action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtomicChanges {
    /// Changes that create a record
    pub creates: Vec<AtomicChange>,
    /// Changes that update a record in place
    pub updates: Vec<AtomicChange>,
    /// Changes that delete a record
    pub deletes: Vec<AtomicChange>,
}

impl AtomicChanges {
    /// Total number of changes
    pub fn len(&self) -> usize {
        self.creates.len() + self.updates.len() + self.deletes.len()
    }

    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All changes, creates first, then updates, then deletes
    pub fn into_vec(self) -> Vec<AtomicChange> {
        let mut all = self.creates;
        all.extend(self.updates);
        all.extend(self.deletes);
        all
    }
}

/// Diff the batches with default options
pub fn diff(batches: &ChangeBatches) -> Result<AtomicChanges> {
    diff_with(batches, DiffOptions::default())
}

/// Diff the batches
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] when an endpoint has no targets or when
/// a `(name, type)` key appears twice within the update-old or update-new
/// batch.
pub fn diff_with(batches: &ChangeBatches, options: DiffOptions) -> Result<AtomicChanges> {
    let old = index_by_key(&batches.update_old, "update-old")?;
    let new = index_by_key(&batches.update_new, "update-new")?;
    require_targets(&batches.create, "create")?;
    require_targets(&batches.delete, "delete")?;

    let mut out = AtomicChanges::default();

    out.creates.extend(fan_out(&batches.create, Action::Create));
    out.deletes.extend(fan_out(&batches.delete, Action::Delete));

    for (key, old_ep) in &old {
        if !new.contains_key(key) {
            tracing::debug!("{} dropped from update set, deleting all targets", key);
            out.deletes
                .extend(old_ep.targets.iter().map(|t| AtomicChange::delete(old_ep, t)));
        }
    }

    for (key, new_ep) in &new {
        let Some(old_ep) = old.get(key) else {
            tracing::debug!("{} has no previous version, creating all targets", key);
            out.creates
                .extend(new_ep.targets.iter().map(|t| AtomicChange::create(new_ep, t)));
            continue;
        };

        let old_targets: BTreeSet<&str> = old_ep.targets.iter().map(String::as_str).collect();
        let new_targets: BTreeSet<&str> = new_ep.targets.iter().map(String::as_str).collect();

        for target in old_targets.difference(&new_targets) {
            out.deletes.push(AtomicChange::delete(old_ep, *target));
        }
        for target in new_targets.difference(&old_targets) {
            out.creates.push(AtomicChange::create(new_ep, *target));
        }

        if new_ep.attributes_differ(old_ep) {
            let shared = old_targets.intersection(&new_targets);
            if options.emit_attribute_updates {
                out.updates
                    .extend(shared.map(|target| AtomicChange::update(new_ep, *target)));
            } else {
                tracing::debug!(
                    "{} changed attributes on {} unchanged target(s); not emitting updates",
                    key,
                    shared.count()
                );
            }
        }
    }

    Ok(out)
}

/// One change per element of `targets`, for every endpoint
fn fan_out(endpoints: &[Endpoint], action: Action) -> impl Iterator<Item = AtomicChange> + '_ {
    endpoints.iter().flat_map(move |ep| {
        ep.targets
            .iter()
            .map(move |t| AtomicChange::new(action, ep, t.as_str()))
    })
}

fn require_targets(endpoints: &[Endpoint], batch: &str) -> Result<()> {
    match endpoints.iter().find(|ep| ep.targets.is_empty()) {
        Some(ep) => Err(Error::malformed(format!(
            "{} in {} batch has no targets",
            ep.key(),
            batch
        ))),
        None => Ok(()),
    }
}

fn index_by_key<'a>(
    endpoints: &'a [Endpoint],
    batch: &str,
) -> Result<BTreeMap<EndpointKey, &'a Endpoint>> {
    require_targets(endpoints, batch)?;

    let mut index = BTreeMap::new();
    for ep in endpoints {
        if index.insert(ep.key(), ep).is_some() {
            return Err(Error::malformed(format!(
                "duplicate key {} in {} batch",
                ep.key(),
                batch
            )));
        }
    }
    Ok(index)
}
