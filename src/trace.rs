use crate::error::{Error, Result};
use crate::event::CoreEvent;
use crate::pipeline::{Pipeline, PipelineOutput};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One recorded instrumentation callback with its monotonic arrival time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub at_ms: f64,
    #[serde(flatten)]
    pub event: CoreEvent,
}

/// A recorded observation session, replayable through the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceFile {
    pub events: Vec<TraceEvent>,
}

impl TraceFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }
}

/// Drive a pipeline through a recorded trace deterministically: deadlines
/// that fall between two recorded events fire at their recorded times, so a
/// replay reproduces exactly what the live loop would have done.
pub fn replay(
    pipeline: &mut Pipeline,
    trace: &TraceFile,
    mut emit: impl FnMut(PipelineOutput),
) {
    let mut drain = |pipeline: &mut Pipeline, emit: &mut dyn FnMut(PipelineOutput)| {
        for output in pipeline.drain() {
            emit(output);
        }
    };

    for event in &trace.events {
        while let Some(deadline) = pipeline.next_deadline() {
            if deadline > event.at_ms {
                break;
            }
            pipeline.on_deadline(deadline);
            drain(pipeline, &mut emit);
        }
        pipeline.handle(event.event.clone(), event.at_ms);
        drain(pipeline, &mut emit);
    }

    // Trailing deadlines after the last recorded event.
    while let Some(deadline) = pipeline.next_deadline() {
        pipeline.on_deadline(deadline);
        drain(pipeline, &mut emit);
    }
}
