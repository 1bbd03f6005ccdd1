pub mod aggregator;
pub mod cls;
pub mod kind;
pub mod snapshot;
pub mod thresholds;

pub use aggregator::{Diagnostics, MetricsAggregator};
pub use cls::LayoutShiftAccumulator;
pub use kind::MetricKind;
pub use snapshot::{ExportedSnapshot, MetricsSnapshot, SnapshotUpdate};
pub use thresholds::{MetricStatus, ThresholdResult};
