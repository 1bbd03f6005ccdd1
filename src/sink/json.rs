use super::SnapshotSink;
use crate::error::Result;
use crate::metrics::snapshot::SnapshotUpdate;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Appends every publication to a JSON array on disk.
pub struct JsonSink {
    file: File,
    first: bool,
}

impl JsonSink {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        write!(file, "[")?;

        Ok(Self { file, first: true })
    }
}

#[async_trait]
impl SnapshotSink for JsonSink {
    async fn publish(&mut self, update: &SnapshotUpdate) -> Result<()> {
        if !self.first {
            write!(self.file, ",")?;
        } else {
            self.first = false;
        }

        serde_json::to_writer(&mut self.file, update)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        write!(self.file, "]")?;
        Ok(())
    }
}
