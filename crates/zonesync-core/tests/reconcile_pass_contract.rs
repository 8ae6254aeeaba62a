//! Contract Test: Reconcile Pass
//!
//! This test verifies the externally visible behavior of one apply pass.
//!
//! Constraints verified:
//! - Dry run reads from the backend but never writes
//! - Updates and deletes of records the backend does not hold are skipped
//! - Record types without a backend mapping are skipped
//! - A backend failure aborts the pass and is reported as an event
//! - Applying the same desired state twice converges
//!
//! If this test fails, passes may write blindly or never settle.

mod common;

use common::*;
use zonesync_core::{
    ChangeBatches, ChangeStatus, Endpoint, EngineEvent, Error, RecordType, SyncConfig,
};

#[tokio::test]
async fn dry_run_never_writes() {
    let store = backend_with_zones(&["example.com"]);
    store.seed(&a("old.example.com", &["10.0.0.1"])).await.unwrap();
    let backend = CountingBackend::new(store);

    let config = SyncConfig::new().with_dry_run(true);
    let (reconciler, mut rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        create: vec![a("new.example.com", &["10.0.0.2"])],
        delete: vec![a("old.example.com", &["10.0.0.1"])],
        ..Default::default()
    };
    let report = reconciler.apply_changes(&batches).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.dry_run_count(), 2);
    assert_eq!(report.applied(), 0);
    assert_eq!(backend.write_call_count(), 0);
    assert_eq!(backend.lookup_call_count(), 1);
    assert_eq!(stored(backend.store()).await, vec!["old.example.com A 10.0.0.1"]);

    let dry: usize = drain(&mut rx)
        .iter()
        .filter(|e| matches!(e, EngineEvent::ChangeDryRun { .. }))
        .count();
    assert_eq!(dry, 2);
}

#[tokio::test]
async fn missing_records_are_skipped_on_update_and_delete() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com"]));
    let mut config = SyncConfig::new();
    config.engine.emit_attribute_updates = true;
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let batches = ChangeBatches {
        delete: vec![a("ghost.example.com", &["10.0.0.9"])],
        update_old: vec![a("stale.example.com", &["10.0.0.8"]).with_ttl(60)],
        update_new: vec![a("stale.example.com", &["10.0.0.8"]).with_ttl(600)],
        ..Default::default()
    };
    let report = reconciler.apply_changes(&batches).await.unwrap();

    assert_eq!(report.skipped(), 2);
    assert_eq!(report.applied(), 0);
    assert_eq!(backend.lookup_call_count(), 2);
    assert_eq!(backend.write_call_count(), 0);
    assert!(report.outcomes.iter().all(|o| o.zone.as_deref() == Some("example.com")));
}

#[tokio::test]
async fn unmapped_record_types_are_skipped() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com"]));
    let (reconciler, _rx) = counted_reconciler(&backend, SyncConfig::new());

    let batches = ChangeBatches {
        create: vec![
            Endpoint::new("example.com", RecordType::Mx, ["10 mail.example.com"]),
            a("mail.example.com", &["10.0.0.25"]),
        ],
        ..Default::default()
    };
    let report = reconciler.apply_changes(&batches).await.unwrap();

    assert_eq!(report.applied(), 1);
    assert_eq!(report.skipped(), 1);
    let skipped = report
        .outcomes
        .iter()
        .find(|o| o.change.record_type() == RecordType::Mx)
        .unwrap();
    assert!(matches!(&skipped.status, ChangeStatus::Skipped { reason } if reason.contains("MX")));
}

#[tokio::test]
async fn backend_failure_aborts_the_pass() {
    let backend = CountingBackend::failing_writes(backend_with_zones(&["example.com"]));
    let (reconciler, mut rx) = counted_reconciler(&backend, SyncConfig::new());

    let batches = ChangeBatches {
        create: vec![
            a("one.example.com", &["10.0.0.1"]),
            a("two.example.com", &["10.0.0.2"]),
        ],
        ..Default::default()
    };
    let err = reconciler.apply_changes(&batches).await.unwrap_err();

    assert!(matches!(err, Error::BackendUnavailable(_)));
    assert_eq!(backend.write_call_count(), 1);

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, EngineEvent::ChangeFailed { .. })));
    assert!(!events.iter().any(|e| matches!(e, EngineEvent::PassFinished { .. })));
}

#[tokio::test]
async fn events_trace_the_pass() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com"]));
    let (reconciler, mut rx) = counted_reconciler(&backend, SyncConfig::new());

    let batches = ChangeBatches {
        create: vec![
            a("host.example.com", &["10.0.0.1"]),
            a("host.example.net", &["10.0.0.2"]),
        ],
        ..Default::default()
    };
    reconciler.apply_changes(&batches).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], EngineEvent::PassStarted { zones: 1, changes: 1 });
    assert!(matches!(&events[1], EngineEvent::ChangeSkipped { zone: None, .. }));
    assert!(matches!(&events[2], EngineEvent::ChangeApplied { zone, .. } if zone == "example.com"));
    assert_eq!(events[3], EngineEvent::PassFinished { applied: 1, skipped: 1 });
}

#[tokio::test]
async fn applying_the_same_state_twice_converges() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com", "10.0.0.0/8"]));
    let config = SyncConfig::new().with_reverse_records(true);
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    let desired = reconciler.adjust_endpoints(
        vec![
            a("host.example.com", &["10.0.0.1", "10.0.0.2"]),
            Endpoint::new("host.example.com", RecordType::Txt, ["heritage=zonesync"]),
        ],
        &[],
    );

    let first = reconciler
        .apply_changes(&ChangeBatches {
            create: desired.clone(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(first.applied(), 5);

    let observed = reconciler.records().await.unwrap();
    let current: Vec<Endpoint> = observed
        .iter()
        .filter(|ep| ep.record_type != RecordType::Ptr)
        .cloned()
        .collect();
    let desired = reconciler.adjust_endpoints(desired, &observed);
    let writes_before = backend.write_call_count();

    let second = reconciler
        .apply_changes(&ChangeBatches {
            update_old: merge_targets(current),
            update_new: desired,
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(second.is_empty());
    assert_eq!(backend.write_call_count(), writes_before);
    assert!(
        observed
            .iter()
            .filter(|ep| ep.record_type == RecordType::A)
            .all(|ep| ep.ptr_record_exists)
    );
}

#[tokio::test]
async fn created_records_carry_configured_attributes() {
    let backend = CountingBackend::new(backend_with_zones(&["example.com"]));
    let mut config = SyncConfig::new();
    config.extensible_attributes = serde_json::json!({"Owner": {"value": "zonesync"}});
    let (reconciler, _rx) = counted_reconciler(&backend, config);

    reconciler
        .apply_changes(&ChangeBatches {
            create: vec![a("host.example.com", &["10.0.0.1"])],
            ..Default::default()
        })
        .await
        .unwrap();

    let records = backend.store().records().await;
    assert_eq!(
        records[0].extensible_attributes["Owner"]["value"],
        serde_json::json!("zonesync")
    );
    assert_eq!(records[0].ttl, 300);
    assert!(
        reconciler
            .plan(&ChangeBatches::default())
            .await
            .unwrap()
            .is_empty()
    );
}

/// Fold single-target observed endpoints back into one endpoint per key
fn merge_targets(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut merged: Vec<Endpoint> = Vec::new();
    for ep in endpoints {
        match merged.iter_mut().find(|m| m.key() == ep.key()) {
            Some(existing) => {
                existing.merge_ptr_marker(&ep);
                existing.targets.extend(ep.targets);
            }
            None => merged.push(ep),
        }
    }
    merged
}
