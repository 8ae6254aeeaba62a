// # zonesync-core
//
// Core library for reconciling desired DNS records against authoritative and
// reverse zones.
//
// ## Architecture Overview
//
// The planning core is synchronous and pure:
// - **differ**: Splits coarse update batches into single-target changes
// - **router**: Finds the forward or reverse zone that owns a name or address
// - **ptr**: Keeps A records and their PTR records in step
// - **batcher**: Groups changes by owning zone
//
// Around it:
// - **DnsBackend**: Trait for the zone store a pass reads from and writes to
// - **Reconciler**: Runs a pass against a backend and reports what it did
// - **BackendRegistry**: Plugin-based registry for backends
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Planning never touches the backend
// 2. **Per-change isolation**: Unroutable or unmappable changes are reported,
//    not fatal
// 3. **Plugin-Based**: Backends are registered dynamically
// 4. **Library-First**: All core functionality can be used as a library

pub mod backend;
pub mod batcher;
pub mod config;
pub mod differ;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod ptr;
pub mod registry;
pub mod router;
pub mod zone;

// Re-export core types for convenience
pub use backend::{BackendRecord, BackendRef, DnsBackend, DnsBackendFactory, RecordKind};
pub use batcher::{ChangeBatcher, SkippedChange, ZonedChangeSet};
pub use config::{BackendConfig, DomainFilter, EngineConfig, SyncConfig};
pub use differ::{AtomicChanges, DiffOptions};
pub use endpoint::{Action, AtomicChange, ChangeBatches, Endpoint, EndpointKey, RecordType};
pub use engine::{ApplyReport, ChangeOutcome, ChangeStatus, EngineEvent, Reconciler};
pub use error::{Error, Result};
pub use registry::BackendRegistry;
pub use zone::{Zone, ZoneDirectory, ZoneKind};
