use crate::classifier::{DynamicContentClassifier, MutationSignificance};
use crate::config::MonitorConfig;
use crate::event::{
    CollectorCommand, CoreEvent, NavigationSignal, SignalSource, TransitionType,
};
use crate::metrics::aggregator::{Diagnostics, MetricsAggregator};
use crate::metrics::kind::MetricKind;
use crate::metrics::snapshot::{ExportedSnapshot, MetricsSnapshot, SnapshotUpdate};
use crate::navigation::detector::NavigationDetector;
use crate::navigation::framework::FrameworkRegistry;

/// Something the pipeline produced for the outside world.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    Snapshot(SnapshotUpdate),
    Command(CollectorCommand),
}

/// The single logical execution stream: every externally delivered event is
/// handled here, in arrival order, with time passed in explicitly. Nothing
/// in the pipeline reads a clock or blocks.
pub struct Pipeline {
    aggregator: MetricsAggregator,
    detector: NavigationDetector,
    classifier: DynamicContentClassifier,
    frameworks: FrameworkRegistry,
    recollect_debounce_ms: f64,
    recollect_deadline_ms: Option<f64>,
    outbox: Vec<PipelineOutput>,
}

impl Pipeline {
    pub fn new(config: &MonitorConfig) -> Self {
        Self::with_registry(config, FrameworkRegistry::default())
    }

    pub fn with_registry(config: &MonitorConfig, frameworks: FrameworkRegistry) -> Self {
        Self {
            aggregator: MetricsAggregator::new(),
            detector: NavigationDetector::new(config.nav_debounce_ms, config.nav_max_wait_ms),
            classifier: DynamicContentClassifier::new(config),
            frameworks,
            recollect_debounce_ms: config.recollect_debounce_ms,
            recollect_deadline_ms: None,
            outbox: Vec::new(),
        }
    }

    pub fn handle(&mut self, event: CoreEvent, now_ms: f64) {
        match event {
            CoreEvent::Reading(reading) => {
                if let Some(update) = self.aggregator.ingest(reading) {
                    self.outbox.push(PipelineOutput::Snapshot(update));
                }
                self.try_complete();
            }
            CoreEvent::LayoutShift(entry) => {
                if let Some(update) = self.aggregator.record_layout_shift(&entry) {
                    self.outbox.push(PipelineOutput::Snapshot(update));
                }
            }
            CoreEvent::Mutations(batch) => {
                // Framework strategies look at every burst's DOM summary;
                // their assertions feed the detector like any other signal.
                for signal in self.frameworks.detect(&batch.dom, batch.at_ms) {
                    self.feed_signal(signal, now_ms);
                }
                self.classifier.absorb(batch, now_ms);
            }
            CoreEvent::Signal(signal) => self.feed_signal(signal, now_ms),
            CoreEvent::DocumentLoad { url } => self.document_load(url),
            CoreEvent::CapabilityMissing { kind } => {
                if let Some(update) = self.aggregator.mark_unavailable(kind) {
                    self.outbox.push(PipelineOutput::Snapshot(update));
                }
                self.try_complete();
            }
            CoreEvent::Shutdown => {}
        }
    }

    fn feed_signal(&mut self, signal: NavigationSignal, now_ms: f64) {
        if let Err(e) = signal.validate() {
            log::debug!("{e}");
            self.aggregator.note_malformed();
            return;
        }
        self.detector.observe(&signal, now_ms);
    }

    /// Browser-level document load: a brand-new execution context. Bypasses
    /// the detector, abandons any pending confirmation or burst, and starts
    /// every metric fresh.
    fn document_load(&mut self, url: String) {
        self.detector.set_current_url(&url);
        self.classifier.clear();
        self.recollect_deadline_ms = None;
        let (update, command) = self.aggregator.on_navigation(url, TransitionType::Navigation);
        self.outbox.push(PipelineOutput::Snapshot(update));
        self.outbox.push(PipelineOutput::Command(command));
    }

    /// The earliest pending debounce deadline across all components.
    pub fn next_deadline(&self) -> Option<f64> {
        [
            self.detector.next_deadline(),
            self.classifier.next_deadline(),
            self.recollect_deadline_ms,
        ]
        .into_iter()
        .flatten()
        .min_by(|a, b| a.total_cmp(b))
    }

    /// Fire every deadline at or before `now_ms`.
    pub fn on_deadline(&mut self, now_ms: f64) {
        if let Some((significance, dom)) = self.classifier.on_deadline(now_ms) {
            match significance {
                MutationSignificance::Insignificant => {}
                MutationSignificance::ContentUpdate => {
                    // Debounced: follow-on bursts push the request out
                    // instead of issuing one request per burst.
                    self.recollect_deadline_ms = Some(now_ms + self.recollect_debounce_ms);
                }
                MutationSignificance::NavigationLike => {
                    let signal = NavigationSignal {
                        source: SignalSource::Mutation,
                        observed_url: dom.url,
                        observed_at_ms: now_ms,
                    };
                    self.feed_signal(signal, now_ms);
                }
            }
        }

        if let Some(nav) = self.detector.on_deadline(now_ms) {
            self.recollect_deadline_ms = None;
            let (update, command) = self.aggregator.on_navigation(nav.new_url, nav.transition);
            self.outbox.push(PipelineOutput::Snapshot(update));
            self.outbox.push(PipelineOutput::Command(command));
        }

        if self.recollect_deadline_ms.is_some_and(|d| now_ms >= d) {
            self.recollect_deadline_ms = None;
            self.outbox.push(PipelineOutput::Command(CollectorCommand::Recollect {
                kinds: vec![MetricKind::Lcp, MetricKind::Cls],
                epoch: self.aggregator.current_epoch(),
            }));
        }

        self.try_complete();
    }

    fn try_complete(&mut self) {
        if let Some(update) = self.aggregator.mark_complete() {
            self.outbox.push(PipelineOutput::Snapshot(update));
        }
    }

    pub fn drain(&mut self) -> Vec<PipelineOutput> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> &MetricsSnapshot {
        self.aggregator.snapshot()
    }

    pub fn export(&self) -> ExportedSnapshot {
        self.aggregator.export()
    }

    pub fn is_supported(&self, kind: MetricKind) -> bool {
        self.aggregator.is_supported(kind)
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.aggregator.diagnostics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        DomSnapshot, LayoutShiftEntry, MutationBatch, MutationRecord, NodeClass, RawReading,
    };
    use crate::metrics::thresholds::MetricStatus;

    fn pipeline() -> Pipeline {
        let mut p = Pipeline::new(&MonitorConfig::default());
        p.handle(CoreEvent::DocumentLoad { url: "https://app.test/home".into() }, 0.0);
        p.drain();
        p
    }

    fn reading(kind: MetricKind, value: f64, epoch: u64) -> CoreEvent {
        CoreEvent::Reading(RawReading { kind, value, epoch, observed_at_ms: 0.0, provisional: false })
    }

    fn snapshots(outputs: &[PipelineOutput]) -> Vec<&SnapshotUpdate> {
        outputs
            .iter()
            .filter_map(|o| match o {
                PipelineOutput::Snapshot(u) => Some(u),
                PipelineOutput::Command(_) => None,
            })
            .collect()
    }

    fn commands(outputs: &[PipelineOutput]) -> Vec<&CollectorCommand> {
        outputs
            .iter()
            .filter_map(|o| match o {
                PipelineOutput::Command(c) => Some(c),
                PipelineOutput::Snapshot(_) => None,
            })
            .collect()
    }

    #[test]
    fn document_load_publishes_loading_state_and_recollects() {
        let mut p = Pipeline::new(&MonitorConfig::default());
        p.handle(CoreEvent::DocumentLoad { url: "https://app.test/".into() }, 0.0);
        let outputs = p.drain();

        let published = snapshots(&outputs);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].snapshot.view_epoch, 1);
        assert_eq!(published[0].snapshot.transition, TransitionType::Navigation);

        let cmds = commands(&outputs);
        assert_eq!(cmds.len(), 1);
        let CollectorCommand::Recollect { kinds, epoch } = cmds[0];
        assert_eq!(*epoch, 1);
        assert!(kinds.contains(&MetricKind::Ttfb));
    }

    #[test]
    fn spa_navigation_end_to_end() {
        let mut p = pipeline();
        p.handle(reading(MetricKind::Lcp, 2200.0, 1), 100.0);
        let outputs = p.drain();
        assert_eq!(
            snapshots(&outputs)[0].snapshot.status_of(MetricKind::Lcp),
            Some(MetricStatus::Good)
        );

        // History signal for a new URL, confirmed after the debounce.
        p.handle(
            CoreEvent::Signal(NavigationSignal {
                source: SignalSource::History,
                observed_url: "https://app.test/profile".into(),
                observed_at_ms: 1_000.0,
            }),
            1_000.0,
        );
        let deadline = p.next_deadline().unwrap();
        p.on_deadline(deadline);
        let outputs = p.drain();

        let published = snapshots(&outputs);
        assert_eq!(published.len(), 1);
        let loading = published[0];
        assert_eq!(loading.snapshot.view_epoch, 2);
        assert_eq!(loading.snapshot.transition, TransitionType::Spa);
        assert_eq!(loading.snapshot.url, "https://app.test/profile");
        assert!(loading.snapshot.value_of(MetricKind::Lcp).is_none());
        assert_eq!(loading.snapshot.value_of(MetricKind::Cls), Some(0.0));

        // A reading from the superseded view arrives late and is dropped.
        p.handle(reading(MetricKind::Lcp, 9_000.0, 1), 2_000.0);
        assert!(p.drain().is_empty());
        assert_eq!(p.diagnostics().stale_dropped, 1);
    }

    #[test]
    fn layout_shifts_update_cls_within_epoch() {
        let mut p = pipeline();
        p.handle(
            CoreEvent::LayoutShift(LayoutShiftEntry {
                value: 0.12,
                had_recent_input: false,
                start_time_ms: 300.0,
            }),
            300.0,
        );
        let outputs = p.drain();
        let update = snapshots(&outputs)[0];
        assert_eq!(update.snapshot.value_of(MetricKind::Cls), Some(0.12));
        assert_eq!(update.snapshot.status_of(MetricKind::Cls), Some(MetricStatus::NeedsImprovement));
    }

    #[test]
    fn content_update_burst_requests_recollection_without_reset() {
        let mut p = pipeline();
        let batch = MutationBatch {
            records: (0..10)
                .map(|_| MutationRecord {
                    region: "#feed".into(),
                    depth: 6,
                    node_class: NodeClass::Paintable,
                    added: 4,
                    removed: 0,
                    area_px: 30_000.0,
                })
                .collect(),
            dom: DomSnapshot {
                url: "https://app.test/home".into(),
                markers: Default::default(),
                route_announcement: None,
                node_count: 2_000,
            },
            at_ms: 500.0,
        };
        p.handle(CoreEvent::Mutations(batch), 500.0);

        // Burst coalescing window, then the recollect debounce.
        let d1 = p.next_deadline().unwrap();
        p.on_deadline(d1);
        assert!(p.drain().is_empty(), "no request before the debounce");
        let d2 = p.next_deadline().unwrap();
        assert!(d2 > d1);
        p.on_deadline(d2);
        let outputs = p.drain();

        let cmds = commands(&outputs);
        assert_eq!(cmds.len(), 1);
        let CollectorCommand::Recollect { kinds, epoch } = cmds[0];
        assert_eq!(*epoch, 1, "same epoch: no reset");
        assert_eq!(kinds, &vec![MetricKind::Lcp, MetricKind::Cls]);
        assert!(snapshots(&outputs).is_empty());
    }

    #[test]
    fn navigation_like_burst_without_url_change_does_not_reset() {
        let mut p = pipeline();
        let batch = MutationBatch {
            records: vec![MutationRecord {
                region: "#app".into(),
                depth: 1,
                node_class: NodeClass::Paintable,
                added: 700,
                removed: 650,
                area_px: 400_000.0,
            }],
            dom: DomSnapshot {
                url: "https://app.test/home".into(),
                markers: Default::default(),
                route_announcement: None,
                node_count: 1_400,
            },
            at_ms: 500.0,
        };
        p.handle(CoreEvent::Mutations(batch), 500.0);

        // Fire everything that becomes due; URL never changed, so no
        // navigation and no new epoch.
        let mut guard = 0;
        while let Some(d) = p.next_deadline() {
            p.on_deadline(d);
            guard += 1;
            assert!(guard < 10);
        }
        assert!(p.drain().is_empty());
        assert_eq!(p.snapshot().view_epoch, 1);
    }

    #[test]
    fn framework_marker_burst_confirms_navigation() {
        let mut p = pipeline();
        let batch = MutationBatch {
            records: vec![MutationRecord {
                region: "#root".into(),
                depth: 1,
                node_class: NodeClass::Paintable,
                added: 300,
                removed: 280,
                area_px: 300_000.0,
            }],
            dom: DomSnapshot {
                url: "https://app.test/inbox".into(),
                markers: ["data-reactroot".to_string()].into(),
                route_announcement: Some("/inbox".into()),
                node_count: 900,
            },
            at_ms: 700.0,
        };
        p.handle(CoreEvent::Mutations(batch), 700.0);

        let mut epochs = Vec::new();
        let mut guard = 0;
        while let Some(d) = p.next_deadline() {
            p.on_deadline(d);
            for output in p.drain() {
                if let PipelineOutput::Snapshot(u) = output {
                    epochs.push(u.snapshot.view_epoch);
                }
            }
            guard += 1;
            assert!(guard < 10);
        }
        assert_eq!(epochs, vec![2], "exactly one navigation for the burst");
        assert_eq!(p.snapshot().url, "https://app.test/inbox");
    }

    #[test]
    fn capability_missing_degrades_gracefully() {
        let mut p = pipeline();
        p.handle(CoreEvent::CapabilityMissing { kind: MetricKind::Lcp }, 0.0);
        let outputs = p.drain();
        assert_eq!(
            snapshots(&outputs)[0].snapshot.status_of(MetricKind::Lcp),
            Some(MetricStatus::Unavailable)
        );
        assert!(!p.is_supported(MetricKind::Lcp));

        for (kind, value) in [
            (MetricKind::Ttfb, 500.0),
            (MetricKind::Fcp, 1_400.0),
            (MetricKind::DomLoadTime, 800.0),
            (MetricKind::NavigationTime, 1_000.0),
        ] {
            p.handle(reading(kind, value, 1), 50.0);
        }
        let outputs = p.drain();
        let last = snapshots(&outputs).last().unwrap().snapshot.clone();
        assert!(last.collection_complete, "completes despite unavailable LCP");
    }

    #[test]
    fn malformed_signals_are_dropped_with_diagnostics() {
        let mut p = pipeline();
        p.handle(
            CoreEvent::Signal(NavigationSignal {
                source: SignalSource::History,
                observed_url: String::new(),
                observed_at_ms: 10.0,
            }),
            10.0,
        );
        assert!(p.next_deadline().is_none(), "nothing pending");
        assert_eq!(p.diagnostics().malformed_dropped, 1);
    }
}
