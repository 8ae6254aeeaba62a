//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Building the zone directory for a pass from the backend's zone listing
//! - Reading observed records, following pagination, and marking PTR state
//! - Adjusting desired endpoints (default TTL, PTR intent)
//! - Planning atomic changes per zone and submitting them to the backend
//!
//! ## Architecture
//!
//! ```text
//!  ChangeBatches
//!       │
//!       ▼
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   differ    │──▶│     ptr      │──▶│   batcher    │── ZonedChangeSet
//! └─────────────┘   └──────────────┘   └──────────────┘
//!                                              │
//!                                              ▼
//!                                      ┌──────────────┐
//!                                      │  Reconciler  │── EngineEvent
//!                                      └──────────────┘
//!                                              │
//!                                              ▼
//!                                      ┌──────────────┐
//!                                      │  DnsBackend  │
//!                                      └──────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. List zones for the configured view, apply the domain filter
//! 2. Diff the batches into atomic changes
//! 3. Route each change to its zone, deriving PTR changes when enabled
//! 4. Build every backend record; malformed input aborts before any write
//! 5. Submit per zone (deletes, creates, updates), or log them on dry run

mod report;

pub use report::{ApplyReport, ChangeOutcome, ChangeStatus};

use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendRecord, BackendRef, DnsBackend, RecordPage};
use crate::backend::{build_backend_record, record_filters, zone_filters};
use crate::batcher::{ChangeBatcher, ZonedChangeSet};
use crate::config::SyncConfig;
use crate::differ::{self, DiffOptions};
use crate::endpoint::{Action, AtomicChange, ChangeBatches, Endpoint, RecordType};
use crate::error::{Error, Result, empty_if_not_found};
use crate::ptr;
use crate::zone::ZoneDirectory;

/// Record types read from forward zones
const FORWARD_RECORD_TYPES: [RecordType; 3] = [RecordType::A, RecordType::Cname, RecordType::Txt];

/// Events emitted by the Reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Observed records were read from the backend
    RecordsFetched {
        /// Number of endpoints read
        count: usize,
    },

    /// An apply pass started
    PassStarted {
        /// Zones in the plan
        zones: usize,
        /// Routed changes in the plan
        changes: usize,
    },

    /// A change was submitted to the backend
    ChangeApplied {
        zone: String,
        change: String,
        reference: BackendRef,
    },

    /// A change was logged instead of submitted
    ChangeDryRun {
        zone: String,
        change: String,
    },

    /// A change was left out of the pass
    ChangeSkipped {
        zone: Option<String>,
        change: String,
        reason: String,
    },

    /// A backend call failed and aborted the pass
    ChangeFailed {
        zone: String,
        change: String,
        error: String,
    },

    /// An apply pass finished
    PassFinished {
        applied: usize,
        skipped: usize,
    },
}

/// A change whose backend record has been built, or that was set aside
enum Prepared<'a> {
    Ready {
        zone: &'a str,
        change: &'a AtomicChange,
        record: BackendRecord,
    },
    Skip {
        zone: &'a str,
        change: &'a AtomicChange,
        reason: String,
    },
}

/// Core reconciliation engine
///
/// One Reconciler drives passes against one backend. Each pass builds its
/// own zone directory and change set; nothing is shared between passes.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Read state with [`Reconciler::records()`]
/// 3. Submit batches with [`Reconciler::apply_changes()`]
///
/// ## Load Resistance
///
/// Events go out on a bounded channel. When it is full, new events are
/// dropped with a warning instead of blocking the pass.
pub struct Reconciler {
    /// Backend holding the zones
    backend: Box<dyn DnsBackend>,

    /// Pass configuration
    config: SyncConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Reconciler {
    /// Create a new Reconciler
    ///
    /// # Returns
    ///
    /// A tuple of (reconciler, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        backend: Box<dyn DnsBackend>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let reconciler = Self {
            backend,
            config,
            event_tx: tx,
        };

        Ok((reconciler, rx))
    }

    /// The pass configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Zones visible to a pass.
    ///
    /// A view the backend does not know yields an empty directory. Zones
    /// are narrowed by `zone_regex` in the backend query and then by the
    /// domain filter.
    pub async fn zones(&self) -> Result<ZoneDirectory> {
        let filters = zone_filters(&self.config);
        let zones = empty_if_not_found(self.backend.list_zones(&filters).await)?;
        let listed = zones.len();
        let directory = ZoneDirectory::filtered(zones, &self.config.domain_filter);

        debug!(
            "{} of {} zone(s) in view '{}' pass the domain filter",
            directory.len(),
            listed,
            self.config.view
        );
        Ok(directory)
    }

    /// Read the observed records of every visible zone.
    ///
    /// A, CNAME and TXT records are read from forward zones. With reverse
    /// record generation on, PTR records are read from reverse zones and A
    /// records they point at get their PTR marker set.
    pub async fn records(&self) -> Result<Vec<Endpoint>> {
        let directory = self.zones().await?;
        let mut endpoints = Vec::new();

        for zone in directory.forward() {
            debug!("Fetching records from zone '{}'", zone);
            for record_type in FORWARD_RECORD_TYPES {
                endpoints.extend(self.fetch_all(zone.name(), record_type).await?);
            }
        }

        if self.config.reverse_record_generation {
            for zone in directory.reverse() {
                match zone.arpa_name() {
                    Some(arpa) => {
                        debug!("Fetching PTR records from zone '{}' ({})", zone, arpa);
                        endpoints.extend(self.fetch_all(&arpa, RecordType::Ptr).await?);
                    }
                    None => debug!(
                        "Could not fetch PTR records from zone '{}': prefix has no arpa name",
                        zone
                    ),
                }
            }
            ptr::mark_observed(&mut endpoints);
        }

        debug!(
            "Fetched {} record(s) from {}",
            endpoints.len(),
            self.backend.backend_name()
        );
        self.emit_event(EngineEvent::RecordsFetched {
            count: endpoints.len(),
        });
        Ok(endpoints)
    }

    /// Adjust desired endpoints before planning.
    ///
    /// Endpoints without a TTL get the configured default. With reverse record
    /// generation on, every A endpoint declares PTR intent. PTR markers seen
    /// in `observed` are carried over; a marker is never cleared.
    pub fn adjust_endpoints(&self, mut desired: Vec<Endpoint>, observed: &[Endpoint]) -> Vec<Endpoint> {
        for ep in desired.iter_mut().filter(|ep| ep.ttl.is_none()) {
            ep.ttl = Some(self.config.default_ttl);
        }

        if self.config.reverse_record_generation {
            ptr::mark_desired(&mut desired);
        }
        ptr::merge_markers(&mut desired, observed);

        desired
    }

    /// Plan the batches against the zones currently visible
    pub async fn plan(&self, batches: &ChangeBatches) -> Result<ZonedChangeSet> {
        let directory = self.zones().await?;
        self.plan_with(&directory, batches)
    }

    /// Plan the batches against a given zone directory
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] for batches the differ rejects.
    pub fn plan_with(&self, directory: &ZoneDirectory, batches: &ChangeBatches) -> Result<ZonedChangeSet> {
        let changes = differ::diff_with(
            batches,
            DiffOptions {
                emit_attribute_updates: self.config.engine.emit_attribute_updates,
            },
        )?;

        info!(
            "Planned {} create(s), {} update(s), {} delete(s)",
            changes.creates.len(),
            changes.updates.len(),
            changes.deletes.len()
        );

        let plan = ChangeBatcher::new(directory)
            .with_reverse_records(self.config.reverse_record_generation)
            .batch(changes.into_vec());

        Ok(plan)
    }

    /// Plan and apply the batches in one pass
    pub async fn apply_changes(&self, batches: &ChangeBatches) -> Result<ApplyReport> {
        if batches.is_empty() {
            debug!("No changes to apply");
            return Ok(ApplyReport::new(self.config.dry_run).finish());
        }

        let plan = self.plan(batches).await?;
        self.submit(&plan).await
    }

    /// Submit a prepared plan
    ///
    /// Every record is built before the first backend call, so malformed
    /// input never leaves a half-applied pass behind. Changes whose type has
    /// no backend mapping, and updates or deletes of records the backend does
    /// not hold, are skipped. Any other backend failure aborts the pass.
    pub async fn submit(&self, plan: &ZonedChangeSet) -> Result<ApplyReport> {
        let mut report = ApplyReport::new(self.config.dry_run);

        self.emit_event(EngineEvent::PassStarted {
            zones: plan.zone_names().count(),
            changes: plan.total_changes(),
        });

        for skipped in plan.skipped() {
            warn!("Skipping {}: {}", skipped.change, skipped.reason);
            self.emit_event(EngineEvent::ChangeSkipped {
                zone: None,
                change: skipped.change.to_string(),
                reason: skipped.reason.clone(),
            });
            report.push(
                None,
                &skipped.change,
                ChangeStatus::Skipped {
                    reason: skipped.reason.clone(),
                },
            );
        }

        let prepared = self.prepare(plan)?;

        for item in prepared {
            let (zone, change, status) = match item {
                Prepared::Skip {
                    zone,
                    change,
                    reason,
                } => (zone, change, ChangeStatus::Skipped { reason }),
                Prepared::Ready {
                    zone,
                    change,
                    record,
                } => match self.submit_change(zone, change, &record).await {
                    Ok(status) => (zone, change, status),
                    Err(e) if !e.aborts_pass() => {
                        (zone, change, ChangeStatus::Skipped { reason: e.to_string() })
                    }
                    Err(e) => {
                        error!("Failed to {} in zone {}: {}", change, zone, e);
                        self.emit_event(EngineEvent::ChangeFailed {
                            zone: zone.to_string(),
                            change: change.to_string(),
                            error: e.to_string(),
                        });
                        return Err(e);
                    }
                },
            };

            match &status {
                ChangeStatus::Applied { reference } => {
                    self.emit_event(EngineEvent::ChangeApplied {
                        zone: zone.to_string(),
                        change: change.to_string(),
                        reference: reference.clone(),
                    })
                }
                ChangeStatus::DryRun => self.emit_event(EngineEvent::ChangeDryRun {
                    zone: zone.to_string(),
                    change: change.to_string(),
                }),
                ChangeStatus::Skipped { reason } => {
                    warn!("Skipping {} in zone {}: {}", change, zone, reason);
                    self.emit_event(EngineEvent::ChangeSkipped {
                        zone: Some(zone.to_string()),
                        change: change.to_string(),
                        reason: reason.clone(),
                    })
                }
            }
            report.push(Some(zone), change, status);
        }

        let report = report.finish();
        info!(
            "Pass finished: {} applied, {} dry run, {} skipped",
            report.applied(),
            report.dry_run_count(),
            report.skipped()
        );
        self.emit_event(EngineEvent::PassFinished {
            applied: report.applied(),
            skipped: report.skipped(),
        });
        Ok(report)
    }

    /// Build the backend record for every routed change, in submission order
    fn prepare<'a>(&self, plan: &'a ZonedChangeSet) -> Result<Vec<Prepared<'a>>> {
        let mut prepared = Vec::with_capacity(plan.total_changes());

        for (zone, _) in plan.iter() {
            for change in plan.submission_order(zone) {
                let for_read = change.action() != Action::Create;
                match build_backend_record(change.endpoint(), for_read, &self.config) {
                    Ok(record) => prepared.push(Prepared::Ready {
                        zone,
                        change,
                        record,
                    }),
                    Err(e) if !e.aborts_pass() => prepared.push(Prepared::Skip {
                        zone,
                        change,
                        reason: e.to_string(),
                    }),
                    Err(e) => {
                        error!("Could not build record for {}: {}", change, e);
                        return Err(e);
                    }
                }
            }
        }

        Ok(prepared)
    }

    /// Submit a single change
    async fn submit_change(
        &self,
        zone: &str,
        change: &AtomicChange,
        record: &BackendRecord,
    ) -> Result<ChangeStatus> {
        let action = change.action();

        let reference = match action {
            Action::Create => None,
            Action::Update | Action::Delete => {
                let found = empty_if_not_found(self.backend.lookup_record(record).await)?;
                let Some(reference) = found else {
                    return Ok(ChangeStatus::Skipped {
                        reason: format!("{} not found in backend", record),
                    });
                };
                Some(reference)
            }
        };

        if self.config.dry_run {
            info!("Dry run: skipping {} {} in zone {}", action, record, zone);
            return Ok(ChangeStatus::DryRun);
        }

        info!("Changing record: {} {} in zone {}", action, record, zone);
        let applied = match (action, reference) {
            (Action::Create, _) => self.backend.create_record(record).await?,
            (Action::Update, Some(reference)) => {
                self.backend.update_record(record, &reference).await?
            }
            (Action::Delete, Some(reference)) => self.backend.delete_record(&reference).await?,
            (action, None) => {
                return Err(Error::Other(format!(
                    "{} of {} has no backend reference",
                    action, record
                )));
            }
        };

        Ok(ChangeStatus::Applied { reference: applied })
    }

    /// Read every page of one record type from one zone
    async fn fetch_all(&self, zone: &str, record_type: RecordType) -> Result<Vec<Endpoint>> {
        let filters = record_filters(zone, &self.config);
        let mut endpoints = Vec::new();
        let mut page: Option<String> = None;
        let mut seen_pages: HashSet<String> = HashSet::new();

        loop {
            let result = self
                .backend
                .fetch_page(zone, record_type, &filters, page.as_deref())
                .await;
            let RecordPage {
                endpoints: batch,
                next_page,
            } = empty_if_not_found(result).inspect_err(|e| {
                error!(
                    "Could not fetch {} records from zone '{}': {}",
                    record_type, zone, e
                )
            })?;

            endpoints.extend(batch);

            match next_page {
                Some(next) if !seen_pages.insert(next.clone()) => {
                    return Err(Error::backend(format!(
                        "{} listing of zone '{}' repeated page token '{}'",
                        record_type, zone, next
                    )));
                }
                Some(next) => page = Some(next),
                None => break,
            }
        }

        Ok(endpoints)
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
