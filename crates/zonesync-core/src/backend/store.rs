//! Record store shared by the in-process and file backends
//!
//! Plain data plus the query and mutation rules the reference backends agree
//! on. Locking and persistence are left to the owning backend.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::record::{BackendRecord, RecordKind};
use super::{
    BackendRef, FILTER_FQDN_REGEX, FILTER_MAX_RESULTS, FILTER_NAME_REGEX, FILTER_VIEW,
    RecordFilters, RecordPage,
};
use crate::endpoint::RecordType;
use crate::error::{Error, Result};
use crate::router;
use crate::zone::Zone;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredZone {
    zone: Zone,
    view: String,
}

/// A record together with the zone and view that own it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredRecord {
    pub(crate) zone: String,
    pub(crate) view: String,
    pub(crate) record: BackendRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct RecordStore {
    #[serde(default)]
    zones: Vec<StoredZone>,
    #[serde(default)]
    records: BTreeMap<BackendRef, StoredRecord>,
    #[serde(default)]
    next_id: u64,
}

impl RecordStore {
    /// Register a zone in a view. Returns `false` if it was already present.
    pub(crate) fn add_zone(&mut self, name: &str, view: &str) -> bool {
        let exists = self
            .zones
            .iter()
            .any(|z| z.view == view && z.zone.name().eq_ignore_ascii_case(name));
        if exists {
            return false;
        }
        self.zones.push(StoredZone {
            zone: Zone::new(name),
            view: view.to_string(),
        });
        true
    }

    pub(crate) fn zones(&self, filters: &RecordFilters) -> Result<Vec<Zone>> {
        let view = filters.get(FILTER_VIEW);
        let in_view: Vec<&StoredZone> = self
            .zones
            .iter()
            .filter(|z| view.is_none_or(|v| &z.view == v))
            .collect();

        if in_view.is_empty() {
            let view = view.map_or("any", String::as_str);
            return Err(Error::not_found(format!("view '{}' has no zones", view)));
        }

        let fqdn_filter = compile_filter(filters, FILTER_FQDN_REGEX)?;
        Ok(in_view
            .into_iter()
            .filter(|z| fqdn_filter.as_ref().is_none_or(|re| re.is_match(z.zone.name())))
            .map(|z| z.zone.clone())
            .collect())
    }

    pub(crate) fn page(
        &self,
        zone: &str,
        record_type: RecordType,
        filters: &RecordFilters,
        page: Option<&str>,
    ) -> Result<RecordPage> {
        let view = filters.get(FILTER_VIEW);
        let owner = self
            .zones
            .iter()
            .filter(|z| view.is_none_or(|v| &z.view == v))
            .find(|z| zone_is_named(&z.zone, zone))
            .ok_or_else(|| Error::not_found(format!("zone '{}'", zone)))?;

        let name_filter = compile_filter(filters, FILTER_NAME_REGEX)?;

        let offset = match page {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::backend(format!("invalid page token '{}'", token)))?,
            None => 0,
        };

        let page_size = filters
            .get(FILTER_MAX_RESULTS)
            .and_then(|max| max.parse::<usize>().ok())
            .filter(|max| *max > 0)
            .unwrap_or(usize::MAX);

        let matching: Vec<&StoredRecord> = self
            .records
            .values()
            .filter(|s| s.zone == owner.zone.name() && s.view == owner.view)
            .filter(|s| s.record.kind.record_type() == record_type)
            .filter(|s| {
                name_filter
                    .as_ref()
                    .is_none_or(|re| re.is_match(s.record.kind.name()))
            })
            .collect();

        let end = offset.saturating_add(page_size).min(matching.len());
        let endpoints = matching
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|s| s.record.to_endpoint())
            .collect();

        Ok(RecordPage {
            endpoints,
            next_page: (end < matching.len()).then(|| end.to_string()),
        })
    }

    pub(crate) fn lookup(&self, record: &BackendRecord) -> Option<BackendRef> {
        self.records
            .iter()
            .find(|(_, s)| s.record.kind.identifies(&record.kind))
            .map(|(reference, _)| reference.clone())
    }

    pub(crate) fn insert(&mut self, record: &BackendRecord) -> Result<BackendRef> {
        if let Some(existing) = self.lookup(record) {
            return Err(Error::backend(format!(
                "{} already exists as {}",
                record, existing
            )));
        }

        let (zone, view) = self.owner_of(record)?;

        self.next_id += 1;
        let reference = BackendRef::new(format!(
            "{}/{:08}:{}/{}",
            record.kind.object_type(),
            self.next_id,
            record.kind.name(),
            view
        ));

        self.records.insert(
            reference.clone(),
            StoredRecord {
                zone,
                view,
                record: BackendRecord {
                    view: None,
                    ..record.clone()
                },
            },
        );
        Ok(reference)
    }

    pub(crate) fn replace(
        &mut self,
        record: &BackendRecord,
        reference: &BackendRef,
    ) -> Result<BackendRef> {
        let stored = self
            .records
            .get_mut(reference)
            .ok_or_else(|| Error::not_found(format!("object {}", reference)))?;

        if stored.record.kind.record_type() != record.kind.record_type() {
            return Err(Error::backend(format!(
                "cannot update {} with a {} record",
                reference,
                record.kind.record_type()
            )));
        }

        stored.record = BackendRecord {
            view: None,
            ..record.clone()
        };
        Ok(reference.clone())
    }

    pub(crate) fn remove(&mut self, reference: &BackendRef) -> Result<BackendRef> {
        self.records
            .remove(reference)
            .map(|_| reference.clone())
            .ok_or_else(|| Error::not_found(format!("object {}", reference)))
    }

    pub(crate) fn records(&self) -> Vec<StoredRecord> {
        self.records.values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }

    /// Zone and view that take ownership of a new record
    fn owner_of(&self, record: &BackendRecord) -> Result<(String, String)> {
        let candidates: Vec<&StoredZone> = self
            .zones
            .iter()
            .filter(|z| record.view.as_ref().is_none_or(|v| &z.view == v))
            .collect();
        let zones: Vec<Zone> = candidates.iter().map(|z| z.zone.clone()).collect();

        let found = match &record.kind {
            RecordKind::Ptr { address, .. } => {
                router::find_reverse_zone(&zones, &address.to_string())
            }
            other => router::find_forward_zone(&zones, other.name()),
        };

        let zone = found.ok_or_else(|| {
            Error::backend(format!("no zone accepts {}", record))
        })?;

        let view = candidates
            .iter()
            .rev()
            .find(|z| z.zone.name() == zone.name())
            .map(|z| z.view.clone())
            .unwrap_or_default();

        Ok((zone.name().to_string(), view))
    }
}

fn compile_filter(filters: &RecordFilters, key: &str) -> Result<Option<Regex>> {
    filters
        .get(key)
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| Error::backend(format!("invalid {} filter '{}': {}", key, pattern, e)))
        })
        .transpose()
}

/// A reverse zone answers to its CIDR literal and to its arpa name
fn zone_is_named(zone: &Zone, name: &str) -> bool {
    let name = name.trim_end_matches('.');
    zone.name().eq_ignore_ascii_case(name)
        || zone
            .arpa_name()
            .is_some_and(|arpa| arpa.eq_ignore_ascii_case(name))
}
