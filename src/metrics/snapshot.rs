use super::kind::MetricKind;
use super::thresholds::{MetricStatus, ThresholdResult};
use crate::event::TransitionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One observed value for one metric kind. Superseded by later readings of
/// the same kind within a page view, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub kind: MetricKind,
    pub value: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
    pub provisional: bool,
    pub epoch: u64,
}

/// Per-kind slot in the snapshot. `reading: None` means the metric is
/// confirmed unavailable in this context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub reading: Option<MetricReading>,
    pub threshold: Option<ThresholdResult>,
    pub last_changed_at: DateTime<Utc>,
}

/// The canonical aggregate for exactly one page view. Owned by the metrics
/// aggregator; superseded wholesale when a new view epoch begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub url: String,
    pub transition: TransitionType,
    /// Incremented exactly once per detected navigation.
    pub view_epoch: u64,
    pub created_at: DateTime<Utc>,
    pub collection_complete: bool,
    pub update_count: u64,
    pub metrics: BTreeMap<MetricKind, MetricEntry>,
}

impl MetricsSnapshot {
    pub fn new(url: String, transition: TransitionType, view_epoch: u64) -> Self {
        Self {
            url,
            transition,
            view_epoch,
            created_at: Utc::now(),
            collection_complete: false,
            update_count: 0,
            metrics: BTreeMap::new(),
        }
    }

    pub fn status_of(&self, kind: MetricKind) -> Option<MetricStatus> {
        self.metrics
            .get(&kind)
            .and_then(|entry| entry.threshold.as_ref())
            .map(|t| t.status)
    }

    pub fn value_of(&self, kind: MetricKind) -> Option<f64> {
        self.metrics
            .get(&kind)
            .and_then(|entry| entry.reading.as_ref())
            .map(|r| r.value)
    }
}

/// One publication to consumers: the full snapshot plus exactly the kinds
/// whose value changed since the previous publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotUpdate {
    pub snapshot: MetricsSnapshot,
    pub changed: BTreeSet<MetricKind>,
}

impl Default for SnapshotUpdate {
    fn default() -> Self {
        Self {
            snapshot: MetricsSnapshot::new(String::new(), TransitionType::Navigation, 0),
            changed: BTreeSet::new(),
        }
    }
}

/// Stable fully-qualified shape for JSON serialization by export consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedSnapshot {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<MetricKind, ExportedMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedMetric {
    pub value: Option<f64>,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MetricStatus>,
}
