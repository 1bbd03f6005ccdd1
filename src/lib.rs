pub mod classifier;
pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod monitor;
pub mod navigation;
pub mod pipeline;
pub mod sink;
pub mod trace;

pub use classifier::{DynamicContentClassifier, MutationSignificance};
pub use config::{ConfigLoader, MonitorConfig};
pub use error::{Error, Result};
pub use event::{CollectorCommand, CoreEvent, NavigationSignal, TransitionType};
pub use metrics::aggregator::MetricsAggregator;
pub use metrics::kind::MetricKind;
pub use metrics::snapshot::{ExportedSnapshot, MetricsSnapshot, SnapshotUpdate};
pub use monitor::{MonitorEngine, MonitorState};
pub use navigation::{FrameworkRegistry, FrameworkStrategy, NavigationDetector};
pub use pipeline::{Pipeline, PipelineOutput};
pub use sink::SnapshotSink;
