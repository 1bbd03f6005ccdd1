use super::SnapshotSink;
use crate::error::Result;
use crate::metrics::snapshot::SnapshotUpdate;
use async_trait::async_trait;
use indicatif::MultiProgress;
use std::sync::Arc;

pub struct ConsoleSink {
    multi: Option<Arc<MultiProgress>>,
}

impl ConsoleSink {
    pub fn new(multi: Option<Arc<MultiProgress>>) -> Self {
        Self { multi }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl SnapshotSink for ConsoleSink {
    async fn publish(&mut self, update: &SnapshotUpdate) -> Result<()> {
        let output = serde_json::to_string_pretty(update)?;

        if let Some(multi) = &self.multi {
            for line in output.lines() {
                multi
                    .println(line)
                    .map_err(|e| crate::error::Error::Internal(e.to_string()))?;
            }
        } else {
            for line in output.lines() {
                println!("{}", line);
            }
        }
        Ok(())
    }
}
