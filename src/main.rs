use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use webvitals::config::ConfigLoader;
use webvitals::event::CoreEvent;
use webvitals::metrics::snapshot::SnapshotUpdate;
use webvitals::monitor::MonitorEngine;
use webvitals::pipeline::{Pipeline, PipelineOutput};
use webvitals::trace::{replay, TraceFile};
use webvitals::MonitorConfig;

#[derive(Parser)]
#[command(name = "webvitals")]
#[command(version = "0.1.0")]
#[command(about = "Replay recorded page-performance observation sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded event trace through the observation pipeline
    Run {
        /// Path to the trace file (JSON/YAML/TOML)
        #[arg(short, long)]
        trace: PathBuf,

        /// Optional monitor configuration file (JSON/YAML/TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pace events against the wall clock through the async engine
        /// instead of replaying instantly
        #[arg(long)]
        realtime: bool,

        /// Show progress (stderr)
        #[arg(short, long, default_value_t = true)]
        progress: bool,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    let cli = Cli::parse();
    let logger = env_logger::Builder::from_default_env().build();
    let multi = Arc::new(indicatif::MultiProgress::new());

    match cli.command {
        Commands::Run { trace, config, realtime, progress } => {
            if progress {
                let multi_clone = multi.clone();
                indicatif_log_bridge::LogWrapper::new((*multi_clone).clone(), logger)
                    .try_init()
                    .unwrap();
            } else {
                log::set_boxed_logger(Box::new(logger)).unwrap();
                log::set_max_level(log::LevelFilter::Info);
            }

            let config_data = match &config {
                Some(path) => {
                    log::info!("Loading config from {:?}", path);
                    ConfigLoader::load(path)?
                }
                None => MonitorConfig::default(),
            };

            log::info!("Loading trace from {:?}", trace);
            let trace_data = TraceFile::load(&trace)?;
            log::info!("Loaded {} events", trace_data.events.len());

            if realtime {
                run_realtime(&config_data, trace_data, multi.clone(), progress).await?;
            } else {
                run_replay(&config_data, &trace_data, multi.clone()).await?;
            }
        }
        Commands::Check { config } => match ConfigLoader::load(&config) {
            Ok(cfg) => {
                println!("✅ Config is valid:");
                println!("   Nav debounce: {}ms (max wait {}ms)", cfg.nav_debounce_ms, cfg.nav_max_wait_ms);
                println!("   Mutation coalescing: {}ms", cfg.mutation_coalesce_ms);
                println!("   Recollect debounce: {}ms", cfg.recollect_debounce_ms);
            }
            Err(e) => {
                eprintln!("❌ Config error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Deterministic replay: recorded timestamps drive the pipeline directly.
async fn run_replay(
    config: &MonitorConfig,
    trace: &TraceFile,
    multi: Arc<indicatif::MultiProgress>,
) -> anyhow::Result<()> {
    let mut sink = ConfigLoader::create_sink(config, Some(multi))?;
    let mut pipeline = Pipeline::new(config);

    let mut published = 0u64;
    let mut commands = 0u64;
    let mut outputs = Vec::new();
    replay(&mut pipeline, trace, |output| outputs.push(output));

    for output in outputs {
        match output {
            PipelineOutput::Snapshot(update) => {
                published += 1;
                sink.publish(&update).await?;
            }
            PipelineOutput::Command(command) => {
                commands += 1;
                log::debug!("collector command: {:?}", command);
            }
        }
    }
    sink.close().await?;

    let snapshot = pipeline.snapshot();
    let diagnostics = pipeline.diagnostics();
    println!("\n✅ Replay completed:");
    println!("   Final URL: {}", snapshot.url);
    println!("   View epochs: {}", snapshot.view_epoch);
    println!("   Publications: {}", published);
    println!("   Collector commands: {}", commands);
    println!(
        "   Dropped: {} stale, {} malformed",
        diagnostics.stale_dropped, diagnostics.malformed_dropped
    );
    println!("{}", serde_json::to_string_pretty(&pipeline.export())?);
    Ok(())
}

/// Wall-clock replay through the async engine, with live progress fed from
/// the snapshot watch channel.
async fn run_realtime(
    config: &MonitorConfig,
    trace: TraceFile,
    multi: Arc<indicatif::MultiProgress>,
    progress: bool,
) -> anyhow::Result<()> {
    let engine = Arc::new(MonitorEngine::new(config.clone()));
    let sink = ConfigLoader::create_sink(config, Some(multi.clone()))?;
    let sink_task = engine.attach_sink(sink);

    let mut command_rx = engine.take_commands().expect("fresh engine");
    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            log::debug!("collector command: {:?}", command);
        }
    });

    let mut _progress_task = None;
    if progress {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(120));
        let mut snapshot_rx = engine.watch_snapshots();
        _progress_task = Some(tokio::spawn(async move {
            while snapshot_rx.changed().await.is_ok() {
                let update: SnapshotUpdate = snapshot_rx.borrow().clone();
                pb.set_message(format!(
                    "epoch {} | {} | updates: {} | changed: {:?}",
                    update.snapshot.view_epoch,
                    update.snapshot.url,
                    update.snapshot.update_count,
                    update.changed
                ));
            }
        }));
    }

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    let tx = engine.sender();
    let mut last_at = 0.0f64;
    for event in trace.events {
        let gap = (event.at_ms - last_at).max(0.0);
        last_at = event.at_ms;
        tokio::time::sleep(Duration::from_secs_f64(gap / 1_000.0)).await;
        if tx.send(event.event).await.is_err() {
            break;
        }
    }
    // Let trailing debounce deadlines settle before stopping.
    tokio::time::sleep(Duration::from_secs_f64(
        (config.nav_max_wait_ms + config.recollect_debounce_ms) / 1_000.0,
    ))
    .await;
    let _ = tx.send(CoreEvent::Shutdown).await;
    runner.await?;
    sink_task.abort();

    println!("\n✅ Session finished:");
    let final_update = engine.watch_snapshots().borrow().clone();
    println!("   Final URL: {}", final_update.snapshot.url);
    println!("   View epochs: {}", final_update.snapshot.view_epoch);
    println!("   Updates in final view: {}", final_update.snapshot.update_count);
    Ok(())
}
