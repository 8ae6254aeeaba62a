//! Property tests for the target differ
//!
//! Constraints verified:
//! - Deleted targets are exactly old minus new, created targets new minus old
//! - Diffing a state against itself yields nothing
//! - Every emitted change carries exactly one target

use std::collections::BTreeSet;

use proptest::prelude::*;
use zonesync_core::differ;
use zonesync_core::{ChangeBatches, Endpoint, RecordType};

fn target_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set((1u8..=20).prop_map(|n| format!("10.0.0.{}", n)), 1..6)
}

fn endpoint(targets: &BTreeSet<String>) -> Endpoint {
    Endpoint::new("host.example.com", RecordType::A, targets.iter().cloned())
}

proptest! {
    #[test]
    fn update_is_a_symmetric_difference(old in target_set(), new in target_set()) {
        let batches = ChangeBatches {
            update_old: vec![endpoint(&old)],
            update_new: vec![endpoint(&new)],
            ..Default::default()
        };

        let changes = differ::diff(&batches).unwrap();

        let deleted: BTreeSet<String> =
            changes.deletes.iter().map(|c| c.target().to_string()).collect();
        let created: BTreeSet<String> =
            changes.creates.iter().map(|c| c.target().to_string()).collect();

        let only_old: BTreeSet<String> = old.difference(&new).cloned().collect();
        let only_new: BTreeSet<String> = new.difference(&old).cloned().collect();

        prop_assert_eq!(&deleted, &only_old);
        prop_assert_eq!(&created, &only_new);
        prop_assert_eq!(changes.deletes.len(), deleted.len());
        prop_assert_eq!(changes.creates.len(), created.len());
        prop_assert!(changes.updates.is_empty());
    }

    #[test]
    fn rediffing_the_new_state_is_empty(targets in target_set()) {
        let batches = ChangeBatches {
            update_old: vec![endpoint(&targets)],
            update_new: vec![endpoint(&targets)],
            ..Default::default()
        };

        prop_assert!(differ::diff(&batches).unwrap().is_empty());
    }

    #[test]
    fn every_change_has_one_target(old in target_set(), new in target_set(), extra in target_set()) {
        let batches = ChangeBatches {
            create: vec![Endpoint::new("extra.example.com", RecordType::A, extra.iter().cloned())],
            update_old: vec![endpoint(&old)],
            update_new: vec![endpoint(&new)],
            ..Default::default()
        };

        let changes = differ::diff(&batches).unwrap();
        prop_assert!(changes.into_vec().iter().all(|c| c.endpoint().targets.len() == 1));
    }
}
