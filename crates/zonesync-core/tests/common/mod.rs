//! Test doubles and common utilities for contract tests
//!
//! `CountingBackend` wraps the in-memory backend and records every call made
//! through the `DnsBackend` trait, so tests can assert on what a pass did to
//! the backend and not only on its final state.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use zonesync_core::backend::{
    BackendRecord, BackendRef, DnsBackend, MemoryBackend, RecordFilters, RecordPage,
};
use zonesync_core::error::{Error, Result};
use zonesync_core::{Endpoint, EngineEvent, RecordType, Reconciler, SyncConfig, Zone};

/// A backend that counts calls and can be told to fail writes
pub struct CountingBackend {
    inner: MemoryBackend,
    list_zones_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
    lookup_calls: Arc<AtomicUsize>,
    write_calls: Arc<AtomicUsize>,
    /// Writes in the order they reached the backend, e.g. `DELETE record:a/...`
    writes: Arc<Mutex<Vec<String>>>,
    fail_writes: bool,
}

impl CountingBackend {
    /// Wrap a memory backend
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            list_zones_calls: Arc::new(AtomicUsize::new(0)),
            fetch_calls: Arc::new(AtomicUsize::new(0)),
            lookup_calls: Arc::new(AtomicUsize::new(0)),
            write_calls: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(Mutex::new(Vec::new())),
            fail_writes: false,
        }
    }

    /// Wrap a memory backend that rejects every write as unavailable
    pub fn failing_writes(inner: MemoryBackend) -> Self {
        Self {
            fail_writes: true,
            ..Self::new(inner)
        }
    }

    /// Create a new CountingBackend that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            list_zones_calls: Arc::clone(&other.list_zones_calls),
            fetch_calls: Arc::clone(&other.fetch_calls),
            lookup_calls: Arc::clone(&other.lookup_calls),
            write_calls: Arc::clone(&other.write_calls),
            writes: Arc::clone(&other.writes),
            fail_writes: other.fail_writes,
        }
    }

    /// The wrapped store, for inspecting final state
    pub fn store(&self) -> &MemoryBackend {
        &self.inner
    }

    pub fn list_zones_call_count(&self) -> usize {
        self.list_zones_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_call_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn lookup_call_count(&self) -> usize {
        self.lookup_calls.load(Ordering::SeqCst)
    }

    pub fn write_call_count(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Writes in submission order
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn record_write(&self, entry: String) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.writes.lock().unwrap().push(entry);
        if self.fail_writes {
            return Err(Error::backend("connection refused"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DnsBackend for CountingBackend {
    async fn list_zones(&self, filters: &RecordFilters) -> Result<Vec<Zone>> {
        self.list_zones_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_zones(filters).await
    }

    async fn fetch_page(
        &self,
        zone: &str,
        record_type: RecordType,
        filters: &RecordFilters,
        page: Option<&str>,
    ) -> Result<RecordPage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_page(zone, record_type, filters, page).await
    }

    async fn lookup_record(&self, record: &BackendRecord) -> Result<Option<BackendRef>> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lookup_record(record).await
    }

    async fn create_record(&self, record: &BackendRecord) -> Result<BackendRef> {
        self.record_write(format!("CREATE {}", record))?;
        self.inner.create_record(record).await
    }

    async fn update_record(
        &self,
        record: &BackendRecord,
        reference: &BackendRef,
    ) -> Result<BackendRef> {
        self.record_write(format!("UPDATE {}", record))?;
        self.inner.update_record(record, reference).await
    }

    async fn delete_record(&self, reference: &BackendRef) -> Result<BackendRef> {
        self.record_write(format!("DELETE {}", reference))?;
        self.inner.delete_record(reference).await
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

/// Memory backend serving `zones` in the default view
pub fn backend_with_zones(zones: &[&str]) -> MemoryBackend {
    MemoryBackend::with_zones("default", zones.iter().copied())
}

/// Build a reconciler over a counting backend that shares its counters
pub fn counted_reconciler(
    backend: &CountingBackend,
    config: SyncConfig,
) -> (Reconciler, tokio::sync::mpsc::Receiver<EngineEvent>) {
    Reconciler::new(
        Box::new(CountingBackend::sharing_counters_with(backend)),
        config,
    )
    .expect("reconciler construction succeeds")
}

/// A record endpoint
pub fn a(name: &str, targets: &[&str]) -> Endpoint {
    Endpoint::new(name, RecordType::A, targets.iter().copied())
}

/// Sorted `name TYPE target` lines for every stored record
pub async fn stored(backend: &MemoryBackend) -> Vec<String> {
    let mut lines: Vec<String> = backend
        .records()
        .await
        .iter()
        .map(|r| {
            let ep = r.to_endpoint();
            format!("{} {} {}", ep.dns_name, ep.record_type, ep.targets[0])
        })
        .collect();
    lines.sort();
    lines
}

/// Drain every event currently queued
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
