// # DNS Backend Trait
//
// Defines the interface to the authoritative DNS store the reconciler reads
// from and writes to.
//
// ## Implementations
//
// - `MemoryBackend`: in-process, not persistent
// - `FileBackend`: JSON snapshot with atomic writes and backup recovery
//
// ## Usage
//
// ```rust,ignore
// use zonesync_core::backend::{DnsBackend, RecordFilters, view_filters};
// use zonesync_core::RecordType;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let backend = /* DnsBackend implementation */;
//
//     let zones = backend.list_zones(&view_filters("default")).await?;
//     let page = backend
//         .fetch_page("example.com", RecordType::A, &RecordFilters::new(), None)
//         .await?;
//
//     Ok(())
// }
// ```

pub mod file;
pub mod memory;
pub mod record;
mod store;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use record::{BackendRecord, RecordKind, build_backend_record, reverse_name};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{BackendConfig, SyncConfig};
use crate::endpoint::{Endpoint, RecordType};
use crate::zone::Zone;

/// Filter key selecting the zone to list
pub const FILTER_ZONE: &str = "zone";
/// Filter key selecting the view to list
pub const FILTER_VIEW: &str = "view";
/// Filter key carrying a regular expression over record names
pub const FILTER_NAME_REGEX: &str = "name~";
/// Filter key carrying a regular expression over zone names
pub const FILTER_FQDN_REGEX: &str = "fqdn~";
/// Filter key carrying the page size
pub const FILTER_MAX_RESULTS: &str = "_max_results";

/// Query filters passed to [`DnsBackend::list_zones`] and [`DnsBackend::fetch_page`]
pub type RecordFilters = BTreeMap<String, String>;

/// Filters selecting every zone of `view`
pub fn view_filters(view: &str) -> RecordFilters {
    let mut filters = RecordFilters::new();
    filters.insert(FILTER_VIEW.to_string(), view.to_string());
    filters
}

/// Build the query filters for listing zones
pub fn zone_filters(config: &SyncConfig) -> RecordFilters {
    let mut filters = view_filters(&config.view);
    if let Some(regex) = &config.zone_regex {
        filters.insert(FILTER_FQDN_REGEX.to_string(), regex.clone());
    }
    filters
}

/// Build the query filters for listing one zone
pub fn record_filters(zone: &str, config: &SyncConfig) -> RecordFilters {
    let mut filters = RecordFilters::new();
    filters.insert(FILTER_ZONE.to_string(), zone.to_string());
    filters.insert(FILTER_VIEW.to_string(), config.view.clone());
    if let Some(regex) = &config.name_regex {
        filters.insert(FILTER_NAME_REGEX.to_string(), regex.clone());
    }
    if let Some(max) = config.max_results {
        filters.insert(FILTER_MAX_RESULTS.to_string(), max.to_string());
    }
    filters
}

/// Opaque reference to an object stored in a backend
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendRef(String);

impl BackendRef {
    /// Wrap a backend-issued reference
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as issued by the backend
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a record listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    /// Records on this page
    pub endpoints: Vec<Endpoint>,
    /// Token for the next page, `None` on the last page
    pub next_page: Option<String>,
}

/// Trait for DNS backend implementations
///
/// A backend is a thin adapter over a record store. It executes exactly the
/// call it is given and reports the outcome.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// ## Responsibilities
///
/// - List zones and records, one page per call
/// - Resolve a record to its backend reference
/// - Create, update and delete single records
///
/// ## Not Responsibilities
///
/// - Retrying failed calls (a failed call fails the pass)
/// - Deciding which zone owns a change (owned by the reconciler)
/// - Following pagination (owned by the reconciler)
///
/// ## Errors
///
/// Return [`Error::NotFound`](crate::Error::NotFound) when the requested view,
/// zone or object does not exist. The reconciler treats that as an empty
/// result. Any other error aborts the pass.
#[async_trait]
pub trait DnsBackend: Send + Sync {
    /// List the authoritative zones matching `filters`.
    ///
    /// Honours [`FILTER_VIEW`] and [`FILTER_FQDN_REGEX`]. A view with no zones
    /// at all is [`crate::Error::NotFound`].
    async fn list_zones(&self, filters: &RecordFilters) -> Result<Vec<Zone>, crate::Error>;

    /// Fetch one page of records of `record_type` from `zone`.
    ///
    /// `zone` is a forward zone name or the arpa name of a reverse zone.
    /// `page` is the token returned with the previous page, `None` for the
    /// first page.
    async fn fetch_page(
        &self,
        zone: &str,
        record_type: RecordType,
        filters: &RecordFilters,
        page: Option<&str>,
    ) -> Result<RecordPage, crate::Error>;

    /// Find the stored object a record built for reading denotes
    async fn lookup_record(
        &self,
        record: &BackendRecord,
    ) -> Result<Option<BackendRef>, crate::Error>;

    /// Create a record
    async fn create_record(&self, record: &BackendRecord) -> Result<BackendRef, crate::Error>;

    /// Replace the object behind `reference` with `record`
    async fn update_record(
        &self,
        record: &BackendRecord,
        reference: &BackendRef,
    ) -> Result<BackendRef, crate::Error>;

    /// Delete the object behind `reference`
    async fn delete_record(&self, reference: &BackendRef) -> Result<BackendRef, crate::Error>;

    /// Get the backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for constructing backends from configuration
#[async_trait]
pub trait DnsBackendFactory: Send + Sync {
    /// Create a DnsBackend instance from configuration
    async fn create(&self, config: &BackendConfig) -> Result<Box<dyn DnsBackend>, crate::Error>;
}
