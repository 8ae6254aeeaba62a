//! Contract Test: PTR Correlation
//!
//! This test verifies that reverse records follow their A records.
//!
//! Constraints verified:
//! - Observed A records are marked when a PTR points at them
//! - Markers are merged, never cleared
//! - Every A change with a reverse zone carries a matching PTR change
//! - A changes without a reverse zone proceed alone
//!
//! If this test fails, reverse lookups may drift from forward records.

mod common;

use common::*;
use zonesync_core::{ChangeBatches, Endpoint, RecordType, SyncConfig};

fn ptr(address: &str, host: &str) -> Endpoint {
    Endpoint::new(address, RecordType::Ptr, [host])
}

#[tokio::test]
async fn observed_a_records_with_a_ptr_are_marked() {
    let store = backend_with_zones(&["example.com", "10.1.0.0/16"]);
    store.seed(&a("host.example.com", &["10.1.2.3"])).await.unwrap();
    store.seed(&a("bare.example.com", &["10.1.2.4"])).await.unwrap();
    store.seed(&ptr("10.1.2.3", "host.example.com")).await.unwrap();
    let backend = CountingBackend::new(store);

    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);
    let records = reconciler.records().await.unwrap();

    let find = |name: &str| {
        records
            .iter()
            .find(|ep| ep.dns_name == name && ep.record_type == RecordType::A)
            .unwrap()
    };
    assert!(find("host.example.com").ptr_record_exists);
    assert!(!find("bare.example.com").ptr_record_exists);
    assert!(
        records
            .iter()
            .any(|ep| ep.record_type == RecordType::Ptr && ep.dns_name == "10.1.2.3")
    );
}

#[tokio::test]
async fn reverse_zones_are_not_read_when_generation_is_off() {
    let store = backend_with_zones(&["example.com", "10.1.0.0/16"]);
    store.seed(&a("host.example.com", &["10.1.2.3"])).await.unwrap();
    store.seed(&ptr("10.1.2.3", "host.example.com")).await.unwrap();
    let backend = CountingBackend::new(store);

    let (reconciler, _rx) = counted_reconciler(&backend, SyncConfig::new());
    let records = reconciler.records().await.unwrap();

    assert_eq!(records.len(), 1);
    assert!(!records[0].ptr_record_exists);
}

#[tokio::test]
async fn adjusting_never_clears_an_observed_marker() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com"]));
    let (reconciler, _rx) = counted_reconciler(&backend, SyncConfig::new());

    let observed = vec![a("host.example.com", &["10.1.2.3"]).with_ptr_record_exists(true)];
    let desired = vec![
        a("host.example.com", &["10.1.2.3"]),
        a("other.example.com", &["10.1.2.4"]),
    ];

    let adjusted = reconciler.adjust_endpoints(desired, &observed);
    assert!(adjusted[0].ptr_record_exists);
    assert!(!adjusted[1].ptr_record_exists);

    let again = reconciler.adjust_endpoints(adjusted.clone(), &observed);
    assert_eq!(again, adjusted);
}

#[tokio::test]
async fn creating_an_a_record_creates_its_ptr() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com", "10.1.0.0/16"]));
    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        create: vec![a("host.example.com", &["10.1.2.3"])],
        ..Default::default()
    };
    let report = reconciler.apply_changes(&batches).await.unwrap();

    assert_eq!(report.applied(), 2);
    assert_eq!(
        stored(backend.store()).await,
        vec!["10.1.2.3 PTR host.example.com", "host.example.com A 10.1.2.3"]
    );
}

#[tokio::test]
async fn a_record_without_a_reverse_zone_is_created_alone() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com", "10.0.0.0/8"]));
    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        create: vec![a("x.example.com", &["5.5.5.5"])],
        ..Default::default()
    };
    let report = reconciler.apply_changes(&batches).await.unwrap();

    assert_eq!(report.applied(), 1);
    assert_eq!(report.skipped(), 0);
    assert_eq!(stored(backend.store()).await, vec!["x.example.com A 5.5.5.5"]);
}

#[tokio::test]
async fn deleting_an_a_record_deletes_its_ptr() {
    let store = backend_with_zones(&["example.com", "10.1.0.0/16"]);
    store.seed(&a("host.example.com", &["10.1.2.3"])).await.unwrap();
    store.seed(&ptr("10.1.2.3", "host.example.com")).await.unwrap();
    let backend = CountingBackend::new(store);

    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        delete: vec![a("host.example.com", &["10.1.2.3"])],
        ..Default::default()
    };
    let report = reconciler.apply_changes(&batches).await.unwrap();

    assert_eq!(report.applied(), 2);
    assert!(backend.store().is_empty().await);
}

#[tokio::test]
async fn moving_an_address_moves_the_ptr() {
    let store = backend_with_zones(&["example.com", "10.1.0.0/16"]);
    store.seed(&a("host.example.com", &["10.1.2.3"])).await.unwrap();
    store.seed(&ptr("10.1.2.3", "host.example.com")).await.unwrap();
    let backend = CountingBackend::new(store);

    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        update_old: vec![a("host.example.com", &["10.1.2.3"])],
        update_new: vec![a("host.example.com", &["10.1.2.4"])],
        ..Default::default()
    };
    reconciler.apply_changes(&batches).await.unwrap();

    assert_eq!(
        stored(backend.store()).await,
        vec!["10.1.2.4 PTR host.example.com", "host.example.com A 10.1.2.4"]
    );
}
