use crate::error::{Error, Result};
use crate::metrics::kind::MetricKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How the current page view was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    /// Full document load; the execution context itself is new.
    Navigation,
    /// Client-side route change inside the same document.
    Spa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSource {
    History,
    Poll,
    Mutation,
    Framework,
}

/// One hint that a navigation may have happened. Ephemeral: consumed by the
/// navigation detector and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationSignal {
    pub source: SignalSource,
    pub observed_url: String,
    pub observed_at_ms: f64,
}

impl NavigationSignal {
    pub fn validate(&self) -> Result<()> {
        if self.observed_url.is_empty() {
            return Err(Error::MalformedSignal("empty observed_url".into()));
        }
        if !self.observed_at_ms.is_finite() {
            return Err(Error::MalformedSignal("non-finite observed_at_ms".into()));
        }
        Ok(())
    }
}

/// One raw metric observation pushed by the instrumentation side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReading {
    pub kind: MetricKind,
    pub value: f64,
    pub epoch: u64,
    pub observed_at_ms: f64,
    /// Still possibly revised for the current page view (e.g. LCP candidates).
    #[serde(default)]
    pub provisional: bool,
}

impl RawReading {
    pub fn validate(&self) -> Result<()> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(Error::MalformedSignal(format!(
                "unusable {} value: {}",
                self.kind, self.value
            )));
        }
        Ok(())
    }
}

/// One raw layout-shift observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutShiftEntry {
    pub value: f64,
    pub had_recent_input: bool,
    pub start_time_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeClass {
    /// Contributes paintable area: images, text blocks, embeds.
    Paintable,
    /// Invisible or administrative: meta, script, hidden containers.
    Administrative,
}

/// One coalesced DOM mutation record, summarized by the instrumentation side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Nearest identifiable ancestor container of the mutation.
    pub region: String,
    /// Distance of the mutation target from the document root.
    pub depth: u32,
    pub node_class: NodeClass,
    pub added: u32,
    pub removed: u32,
    /// Estimated painted area touched, in px².
    pub area_px: f64,
}

/// Lightweight DOM summary captured alongside a mutation batch. Framework
/// detection strategies pattern-match against this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub url: String,
    /// Root-level framework marker attributes present in the document.
    #[serde(default)]
    pub markers: BTreeSet<String>,
    /// Populated only when a router live-region announcement mutated within
    /// this burst.
    #[serde(default)]
    pub route_announcement: Option<String>,
    pub node_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationBatch {
    pub records: Vec<MutationRecord>,
    pub dom: DomSnapshot,
    pub at_ms: f64,
}

/// One externally delivered callback, enqueued for the single-threaded
/// event handler. Arrival order is processing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    Reading(RawReading),
    LayoutShift(LayoutShiftEntry),
    Mutations(MutationBatch),
    Signal(NavigationSignal),
    /// Browser-level document load. Bypasses the navigation detector.
    DocumentLoad { url: String },
    /// The instrumentation API backing a metric is absent in this context.
    CapabilityMissing { kind: MetricKind },
    Shutdown,
}

/// Request sent back to the instrumentation side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CollectorCommand {
    /// Re-measure the listed kinds for the given view epoch.
    Recollect { kinds: Vec<MetricKind>, epoch: u64 },
}
