//! Contract Test: Change Batching
//!
//! This test verifies how routed changes are grouped and ordered.
//!
//! Constraints verified:
//! - Every visible forward zone appears in a plan, even with no changes
//! - Reverse zones appear only when a PTR change lands in them
//! - Within a zone, deletes reach the backend before creates
//!
//! If this test fails, a backend may see a name twice during a pass.

mod common;

use common::*;
use zonesync_core::{ChangeBatches, SyncConfig};

#[tokio::test]
async fn forward_zones_are_always_in_the_plan() {
    let backend = CountingBackend::new(backend_with_zones(&[
        "example.com",
        "example.org",
        "10.0.0.0/8",
    ]));
    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        create: vec![a("host.example.com", &["192.168.0.1"])],
        ..Default::default()
    };
    let plan = reconciler.plan(&batches).await.unwrap();

    let names: Vec<&str> = plan.zone_names().collect();
    assert_eq!(names, vec!["example.com", "example.org"]);
    assert!(plan.zone("example.org").unwrap().is_empty());
    assert_eq!(plan.total_changes(), 1);
}

#[tokio::test]
async fn reverse_zones_join_the_plan_on_demand() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com", "10.0.0.0/8"]));
    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        create: vec![a("host.example.com", &["10.0.0.1"])],
        ..Default::default()
    };
    let plan = reconciler.plan(&batches).await.unwrap();

    assert_eq!(plan.zone("10.0.0.0/8").map(<[_]>::len), Some(1));
    assert_eq!(plan.total_changes(), 2);
}

#[tokio::test]
async fn deletes_reach_the_backend_before_creates() {
    let store = backend_with_zones(&["example.com"]);
    store.seed(&a("old.example.com", &["10.0.0.1"])).await.unwrap();
    let backend = CountingBackend::new(store);
    let (reconciler, _rx) = counted_reconciler(&backend, SyncConfig::new());

    let batches = ChangeBatches {
        create: vec![a("new.example.com", &["10.0.0.2"])],
        delete: vec![a("old.example.com", &["10.0.0.1"])],
        ..Default::default()
    };
    reconciler.apply_changes(&batches).await.unwrap();

    let writes = backend.writes();
    assert_eq!(writes.len(), 2);
    assert!(writes[0].starts_with("DELETE "));
    assert!(writes[1].starts_with("CREATE "));
    assert_eq!(stored(backend.store()).await, vec!["new.example.com A 10.0.0.2"]);
}

#[tokio::test]
async fn plan_serializes_by_zone() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com"]));
    let (reconciler, _rx) = counted_reconciler(&backend, SyncConfig::new());

    let batches = ChangeBatches {
        create: vec![a("host.example.com", &["10.0.0.1"])],
        ..Default::default()
    };
    let plan = reconciler.plan(&batches).await.unwrap();

    let json = serde_json::to_value(&plan).unwrap();
    assert_eq!(json["zones"]["example.com"].as_array().unwrap().len(), 1);

    let back: zonesync_core::ZonedChangeSet = serde_json::from_value(json).unwrap();
    assert_eq!(back, plan);
}
