use super::cls::LayoutShiftAccumulator;
use super::kind::MetricKind;
use super::snapshot::{
    ExportedMetric, ExportedSnapshot, MetricEntry, MetricReading, MetricsSnapshot, SnapshotUpdate,
};
use super::thresholds::{self, ThresholdResult};
use crate::event::{LayoutShiftEntry, RawReading, TransitionType};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;

/// Counters for inputs that were rejected rather than applied. Never
/// surfaced as errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub stale_dropped: u64,
    pub malformed_dropped: u64,
}

/// The single writer of the canonical metrics snapshot for one browsing
/// context. All mutation goes through its operations; consumers only ever
/// see cloned publications.
pub struct MetricsAggregator {
    snapshot: MetricsSnapshot,
    cls: LayoutShiftAccumulator,
    unavailable: BTreeSet<MetricKind>,
    diagnostics: Diagnostics,
}

impl MetricsAggregator {
    /// Starts at epoch 0 as a pre-document placeholder; the first document
    /// load begins epoch 1.
    pub fn new() -> Self {
        Self {
            snapshot: MetricsSnapshot::new(String::new(), TransitionType::Navigation, 0),
            cls: LayoutShiftAccumulator::new(),
            unavailable: BTreeSet::new(),
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn snapshot(&self) -> &MetricsSnapshot {
        &self.snapshot
    }

    pub fn current_epoch(&self) -> u64 {
        self.snapshot.view_epoch
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub(crate) fn note_malformed(&mut self) {
        self.diagnostics.malformed_dropped += 1;
    }

    pub fn is_supported(&self, kind: MetricKind) -> bool {
        !self.unavailable.contains(&kind)
    }

    /// Accept one raw reading. Returns the publication it produced, if any.
    /// Readings tagged with a non-current epoch are dropped, never merged.
    pub fn ingest(&mut self, reading: RawReading) -> Option<SnapshotUpdate> {
        if let Err(e) = reading.validate() {
            self.diagnostics.malformed_dropped += 1;
            log::debug!("{e}");
            return None;
        }
        if reading.epoch != self.snapshot.view_epoch {
            self.diagnostics.stale_dropped += 1;
            log::debug!(
                "dropping stale {} reading from epoch {} (current epoch {})",
                reading.kind,
                reading.epoch,
                self.snapshot.view_epoch
            );
            return None;
        }
        // A live reading proves the capability after all.
        self.unavailable.remove(&reading.kind);
        self.apply(reading.kind, reading.value, reading.provisional)
    }

    /// Feed one raw layout-shift observation through the accumulator and
    /// fold the resulting score into the snapshot.
    pub fn record_layout_shift(&mut self, entry: &LayoutShiftEntry) -> Option<SnapshotUpdate> {
        self.cls.record(entry);
        let score = self.cls.value()?;
        self.apply(MetricKind::Cls, score, false)
    }

    fn apply(&mut self, kind: MetricKind, value: f64, provisional: bool) -> Option<SnapshotUpdate> {
        if let Some(prev) = self.snapshot.metrics.get(&kind).and_then(|e| e.reading.as_ref()) {
            if prev.value == value && prev.provisional == provisional {
                return None;
            }
        }
        let now = Utc::now();
        let reading = MetricReading {
            kind,
            value,
            unit: kind.unit().to_string(),
            recorded_at: now,
            provisional,
            epoch: self.snapshot.view_epoch,
        };
        let entry = MetricEntry {
            reading: Some(reading),
            threshold: thresholds::evaluate(kind, value),
            last_changed_at: now,
        };
        self.snapshot.metrics.insert(kind, entry);
        self.snapshot.update_count += 1;
        Some(self.publish([kind].into_iter().collect()))
    }

    /// The instrumentation API backing a metric is absent. The metric is
    /// marked explicitly rather than left silently missing, and the others
    /// keep publishing. Idempotent.
    pub fn mark_unavailable(&mut self, kind: MetricKind) -> Option<SnapshotUpdate> {
        if kind == MetricKind::Cls {
            self.cls.mark_unsupported();
        }
        self.unavailable.insert(kind);
        if self
            .snapshot
            .metrics
            .get(&kind)
            .is_some_and(|e| e.reading.is_none())
        {
            return None;
        }
        self.snapshot.metrics.insert(
            kind,
            MetricEntry {
                reading: None,
                threshold: Some(ThresholdResult::unavailable()),
                last_changed_at: Utc::now(),
            },
        );
        self.snapshot.update_count += 1;
        Some(self.publish([kind].into_iter().collect()))
    }

    /// Begin a new page view: bump the epoch, drop every reading, reset the
    /// layout-shift accumulator, and publish the loading state before any
    /// new reading arrives. Returns that publication plus the recollection
    /// request for the new epoch.
    pub fn on_navigation(
        &mut self,
        url: String,
        transition: TransitionType,
    ) -> (SnapshotUpdate, crate::event::CollectorCommand) {
        let epoch = self.snapshot.view_epoch + 1;
        self.cls.reset();
        self.snapshot = MetricsSnapshot::new(url, transition, epoch);

        let applicable = MetricKind::applicable_for(transition);
        let now = Utc::now();
        for kind in applicable {
            if !self.is_supported(*kind) {
                self.snapshot.metrics.insert(
                    *kind,
                    MetricEntry {
                        reading: None,
                        threshold: Some(ThresholdResult::unavailable()),
                        last_changed_at: now,
                    },
                );
            }
        }
        // CLS restarts at zero rather than absent; its value only ever grows
        // from here via the shift feed.
        if self.is_supported(MetricKind::Cls) {
            self.snapshot.metrics.insert(
                MetricKind::Cls,
                MetricEntry {
                    reading: Some(MetricReading {
                        kind: MetricKind::Cls,
                        value: 0.0,
                        unit: MetricKind::Cls.unit().to_string(),
                        recorded_at: now,
                        provisional: false,
                        epoch,
                    }),
                    threshold: thresholds::evaluate(MetricKind::Cls, 0.0),
                    last_changed_at: now,
                },
            );
        }

        let changed: BTreeSet<MetricKind> = applicable.iter().copied().collect();
        // CLS is push-driven by the shift feed and needs no recollection.
        let kinds: Vec<MetricKind> = applicable
            .iter()
            .copied()
            .filter(|k| *k != MetricKind::Cls && self.is_supported(*k))
            .collect();

        log::info!("view epoch {} started: {} ({:?})", epoch, self.snapshot.url, transition);
        let update = SnapshotUpdate { snapshot: self.snapshot.clone(), changed };
        (update, crate::event::CollectorCommand::Recollect { kinds, epoch })
    }

    /// Flip `collection_complete` once every applicable metric has a final
    /// reading or is confirmed unavailable. Idempotent; a no-op until the
    /// condition holds.
    pub fn mark_complete(&mut self) -> Option<SnapshotUpdate> {
        if self.snapshot.collection_complete || !self.all_applicable_settled() {
            return None;
        }
        self.snapshot.collection_complete = true;
        log::debug!("collection complete for epoch {}", self.snapshot.view_epoch);
        Some(self.publish(BTreeSet::new()))
    }

    fn all_applicable_settled(&self) -> bool {
        MetricKind::applicable_for(self.snapshot.transition)
            .iter()
            .all(|kind| {
                if self.unavailable.contains(kind) {
                    return true;
                }
                self.snapshot
                    .metrics
                    .get(kind)
                    .and_then(|e| e.reading.as_ref())
                    .is_some_and(|r| !r.provisional)
            })
    }

    /// Read-only accessor in the stable export shape. Must not mutate state.
    pub fn export(&self) -> ExportedSnapshot {
        let metrics = self
            .snapshot
            .metrics
            .iter()
            .map(|(kind, entry)| {
                (
                    *kind,
                    ExportedMetric {
                        value: entry.reading.as_ref().map(|r| r.value),
                        unit: kind.unit().to_string(),
                        status: entry.threshold.as_ref().map(|t| t.status),
                    },
                )
            })
            .collect();
        ExportedSnapshot {
            url: self.snapshot.url.clone(),
            timestamp: Utc::now(),
            metrics,
        }
    }

    fn publish(&self, changed: BTreeSet<MetricKind>) -> SnapshotUpdate {
        SnapshotUpdate {
            snapshot: self.snapshot.clone(),
            changed,
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}
