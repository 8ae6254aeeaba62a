// # Memory Backend
//
// In-memory implementation of DnsBackend.
//
// ## Purpose
//
// Provides a fast backend that doesn't persist across restarts. Useful for
// tests, dry runs and for exercising a reconciliation pass without a real
// DNS server.
//
// ## Behavior
//
// - Zones are registered per view; listing an unknown view is `NotFound`
// - New records are placed in the zone that owns them, like a real server
// - Listings honour the `view`, `name~` and `_max_results` filters
// - Clones share the same underlying store

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::record::{BackendRecord, RecordKind};
use super::store::RecordStore;
use super::{BackendRef, DnsBackend, RecordFilters, RecordPage};
use crate::Error;
use crate::endpoint::{Endpoint, RecordType};
use crate::zone::Zone;

/// In-memory backend implementation
///
/// # Example
///
/// ```rust,no_run
/// use zonesync_core::backend::{DnsBackend, MemoryBackend, view_filters};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = MemoryBackend::with_zones("default", ["example.com", "10.0.0.0/8"]);
///
///     let zones = backend.list_zones(&view_filters("default")).await?;
///     assert_eq!(zones.len(), 2);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<RecordStore>>,
}

impl MemoryBackend {
    /// Create a new empty backend with no zones
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend serving `zones` in `view`
    pub fn with_zones<I, S>(view: &str, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = RecordStore::default();
        for zone in zones {
            store.add_zone(zone.as_ref(), view);
        }
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Register a zone in a view
    pub async fn add_zone(&self, zone: &str, view: &str) {
        self.inner.write().await.add_zone(zone, view);
    }

    /// Store an endpoint as-is, bypassing the reconciler
    ///
    /// Every target becomes its own record. Endpoints without a TTL are
    /// stored with a TTL of 300 seconds.
    pub async fn seed(&self, endpoint: &Endpoint) -> Result<Vec<BackendRef>, Error> {
        let mut guard = self.inner.write().await;
        let mut refs = Vec::with_capacity(endpoint.targets.len());
        for target in &endpoint.targets {
            let kind = RecordKind::from_endpoint(&endpoint.with_single_target(target.as_str()))?;
            let record = BackendRecord::new(kind, endpoint.ttl.unwrap_or(300));
            refs.push(guard.insert(&record)?);
        }
        Ok(refs)
    }

    /// All stored records, in reference order
    pub async fn records(&self) -> Vec<BackendRecord> {
        self.inner
            .read()
            .await
            .records()
            .into_iter()
            .map(|s| s.record)
            .collect()
    }

    /// Get the number of records in the backend
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the backend holds no records
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.len() == 0
    }

    /// Remove all records, keeping the zones
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl DnsBackend for MemoryBackend {
    async fn list_zones(&self, filters: &RecordFilters) -> Result<Vec<Zone>, Error> {
        self.inner.read().await.zones(filters)
    }

    async fn fetch_page(
        &self,
        zone: &str,
        record_type: RecordType,
        filters: &RecordFilters,
        page: Option<&str>,
    ) -> Result<RecordPage, Error> {
        self.inner
            .read()
            .await
            .page(zone, record_type, filters, page)
    }

    async fn lookup_record(&self, record: &BackendRecord) -> Result<Option<BackendRef>, Error> {
        Ok(self.inner.read().await.lookup(record))
    }

    async fn create_record(&self, record: &BackendRecord) -> Result<BackendRef, Error> {
        self.inner.write().await.insert(record)
    }

    async fn update_record(
        &self,
        record: &BackendRecord,
        reference: &BackendRef,
    ) -> Result<BackendRef, Error> {
        self.inner.write().await.replace(record, reference)
    }

    async fn delete_record(&self, reference: &BackendRef) -> Result<BackendRef, Error> {
        self.inner.write().await.remove(reference)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
