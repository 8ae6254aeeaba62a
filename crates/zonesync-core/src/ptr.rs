//! PTR correlation
//!
//! Keeps the `ptr_record_exists` marker on A endpoints in step with the
//! reverse records the backend holds, and derives the PTR change that
//! accompanies every A change when reverse-record generation is on.
//!
//! A PTR endpoint is named after the address it reverses and targets the
//! host name: `10.1.2.3 PTR -> host.example.com`.

use std::collections::{HashMap, HashSet};

use crate::endpoint::{AtomicChange, Endpoint, EndpointKey, RecordType};
use crate::error::Error;
use crate::router;
use crate::zone::Zone;

/// Set the PTR marker on observed A records that an observed PTR points at.
///
/// Idempotent: a marker that is already set stays set, and running this any
/// number of times yields the same endpoints.
pub fn mark_observed(endpoints: &mut [Endpoint]) {
    let pointed_at: HashSet<String> = endpoints
        .iter()
        .filter(|ep| ep.record_type == RecordType::Ptr)
        .flat_map(|ep| ep.targets.iter().map(|t| normalize(t)))
        .collect();

    if pointed_at.is_empty() {
        return;
    }

    let mut marked = 0usize;
    for ep in endpoints
        .iter_mut()
        .filter(|ep| ep.record_type == RecordType::A)
    {
        if pointed_at.contains(&normalize(&ep.dns_name)) {
            ep.ptr_record_exists = true;
            marked += 1;
        }
    }

    tracing::debug!("{} A record(s) have an observed PTR record", marked);
}

/// Declare the intent to keep a PTR record for every desired A record.
pub fn mark_desired(endpoints: &mut [Endpoint]) {
    for ep in endpoints
        .iter_mut()
        .filter(|ep| ep.record_type == RecordType::A)
    {
        ep.ptr_record_exists = true;
    }
}

/// OR the observed PTR markers into the desired endpoints with the same key.
pub fn merge_markers(desired: &mut [Endpoint], observed: &[Endpoint]) {
    let observed: HashMap<EndpointKey, &Endpoint> = observed
        .iter()
        .filter(|ep| ep.record_type == RecordType::A && ep.ptr_record_exists)
        .map(|ep| (ep.key(), ep))
        .collect();

    for ep in desired.iter_mut() {
        if let Some(seen) = observed.get(&ep.key()) {
            ep.merge_ptr_marker(seen);
        }
    }
}

/// The PTR endpoint that reverses the single target of an A change
pub fn ptr_endpoint(change: &AtomicChange) -> Endpoint {
    let forward = change.endpoint();
    Endpoint {
        dns_name: change.target().to_string(),
        record_type: RecordType::Ptr,
        targets: vec![forward.dns_name.clone()],
        ttl: forward.ttl,
        annotations: forward.annotations.clone(),
        ptr_record_exists: false,
    }
}

/// Derive the PTR change that accompanies an A change.
///
/// Returns the owning reverse zone together with the synthesized change, or
/// `None` when the change is not an A change or no reverse zone contains its
/// target.
pub fn derive_ptr_change<'a>(
    change: &AtomicChange,
    zones: &'a [Zone],
) -> Option<(&'a Zone, AtomicChange)> {
    if change.record_type() != RecordType::A {
        return None;
    }

    let Some(zone) = router::find_reverse_zone(zones, change.target()) else {
        let err = Error::unroutable(change.target(), "no reverse zone contains this address");
        tracing::debug!("Skipping PTR for {}: {}", change.dns_name(), err);
        return None;
    };

    let ptr = ptr_endpoint(change);
    let target = ptr.targets[0].clone();
    Some((zone, AtomicChange::new(change.action(), &ptr, target)))
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}
