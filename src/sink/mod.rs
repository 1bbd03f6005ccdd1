use crate::error::Result;
use crate::metrics::snapshot::SnapshotUpdate;
use async_trait::async_trait;

pub mod console;
pub mod csv;
pub mod json;

/// A consumer of snapshot publications: the storage/UI boundary. Sinks only
/// ever see what the publication carries.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn publish(&mut self, update: &SnapshotUpdate) -> Result<()>;
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
