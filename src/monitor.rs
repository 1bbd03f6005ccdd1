use crate::config::MonitorConfig;
use crate::event::{CollectorCommand, CoreEvent};
use crate::metrics::snapshot::SnapshotUpdate;
use crate::pipeline::{Pipeline, PipelineOutput};
use crate::sink::SnapshotSink;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_stream::wrappers::WatchStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Observing,
    Stopped,
}

/// Async shell around the pipeline for one browsing context: owns the event
/// channel, stamps arrival times, sleeps until the earliest debounce
/// deadline, and fans publications out over a watch channel.
pub struct MonitorEngine {
    config: MonitorConfig,
    event_tx: mpsc::Sender<CoreEvent>,
    event_rx: std::sync::Mutex<Option<mpsc::Receiver<CoreEvent>>>,
    command_tx: mpsc::UnboundedSender<CollectorCommand>,
    command_rx: std::sync::Mutex<Option<mpsc::UnboundedReceiver<CollectorCommand>>>,
    snapshot_tx: watch::Sender<SnapshotUpdate>,
    state: Arc<Mutex<MonitorState>>,
    state_watcher: watch::Sender<MonitorState>,
}

impl MonitorEngine {
    pub fn new(config: MonitorConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SnapshotUpdate::default());
        let (state_tx, _) = watch::channel(MonitorState::Idle);

        Self {
            config,
            event_tx,
            event_rx: std::sync::Mutex::new(Some(event_rx)),
            command_tx,
            command_rx: std::sync::Mutex::new(Some(command_rx)),
            snapshot_tx,
            state: Arc::new(Mutex::new(MonitorState::Idle)),
            state_watcher: state_tx,
        }
    }

    /// Sender the instrumentation side pushes its callbacks into.
    pub fn sender(&self) -> mpsc::Sender<CoreEvent> {
        self.event_tx.clone()
    }

    /// The stream of recollection requests back to the instrumentation side.
    /// There is exactly one; the first caller takes it.
    pub fn take_commands(&self) -> Option<mpsc::UnboundedReceiver<CollectorCommand>> {
        self.command_rx.lock().expect("command receiver lock").take()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<SnapshotUpdate> {
        self.snapshot_tx.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<MonitorState> {
        self.state_watcher.subscribe()
    }

    /// Forward every publication to a sink until the engine shuts down.
    pub fn attach_sink(&self, mut sink: Box<dyn SnapshotSink>) -> tokio::task::JoinHandle<()> {
        let rx = self.snapshot_tx.subscribe();
        tokio::spawn(async move {
            let mut updates = WatchStream::from_changes(rx);
            while let Some(update) = updates.next().await {
                if let Err(e) = sink.publish(&update).await {
                    log::error!("sink error: {}", e);
                }
            }
            if let Err(e) = sink.close().await {
                log::error!("sink close error: {}", e);
            }
        })
    }

    /// Run the event loop until `Shutdown` arrives or every sender is gone.
    pub async fn run(&self) {
        let Some(mut event_rx) = self.event_rx.lock().expect("event receiver lock").take() else {
            log::warn!("monitor engine already ran");
            return;
        };
        self.set_state(MonitorState::Observing).await;

        let origin = Instant::now();
        let mut pipeline = Pipeline::new(&self.config);

        loop {
            let deadline = pipeline.next_deadline();
            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        None | Some(CoreEvent::Shutdown) => break,
                        Some(event) => {
                            let now_ms = origin.elapsed().as_secs_f64() * 1_000.0;
                            pipeline.handle(event, now_ms);
                        }
                    }
                }
                _ = Self::sleep_until_ms(origin, deadline), if deadline.is_some() => {
                    let now_ms = origin.elapsed().as_secs_f64() * 1_000.0;
                    pipeline.on_deadline(now_ms);
                }
            }
            self.flush(&mut pipeline);
        }

        self.flush(&mut pipeline);
        log::info!("observation stopped; {:?}", pipeline.diagnostics());
        self.set_state(MonitorState::Stopped).await;
    }

    fn flush(&self, pipeline: &mut Pipeline) {
        for output in pipeline.drain() {
            match output {
                PipelineOutput::Snapshot(update) => {
                    let _ = self.snapshot_tx.send(update);
                }
                PipelineOutput::Command(command) => {
                    let _ = self.command_tx.send(command);
                }
            }
        }
    }

    async fn sleep_until_ms(origin: Instant, deadline_ms: Option<f64>) {
        match deadline_ms {
            Some(ms) => {
                let target = origin + Duration::from_secs_f64(ms.max(0.0) / 1_000.0);
                tokio::time::sleep_until(tokio::time::Instant::from_std(target)).await;
            }
            None => std::future::pending().await,
        }
    }

    pub async fn set_state(&self, state: MonitorState) {
        let mut guard = self.state.lock().await;
        *guard = state;
        let _ = self.state_watcher.send(state);
    }

    pub async fn state(&self) -> MonitorState {
        *self.state.lock().await
    }
}
