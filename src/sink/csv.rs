use super::SnapshotSink;
use crate::error::Result;
use crate::metrics::snapshot::SnapshotUpdate;
use async_trait::async_trait;
use std::path::PathBuf;

/// One row per changed metric per publication.
pub struct CsvSink {
    writer: csv::Writer<std::fs::File>,
    headers_written: bool,
}

impl CsvSink {
    pub fn new(path: PathBuf) -> Result<Self> {
        let writer = csv::Writer::from_path(path)?;

        Ok(Self {
            writer,
            headers_written: false,
        })
    }
}

#[async_trait]
impl SnapshotSink for CsvSink {
    async fn publish(&mut self, update: &SnapshotUpdate) -> Result<()> {
        if !self.headers_written {
            self.writer
                .write_record(["epoch", "url", "metric", "value", "unit", "status", "update_count"])?;
            self.headers_written = true;
        }

        let snapshot = &update.snapshot;
        for kind in &update.changed {
            let entry = match snapshot.metrics.get(kind) {
                Some(entry) => entry,
                None => continue,
            };
            let value = entry
                .reading
                .as_ref()
                .map(|r| r.value.to_string())
                .unwrap_or_default();
            let status = entry
                .threshold
                .as_ref()
                .map(|t| t.accessible_label.clone())
                .unwrap_or_default();
            self.writer.write_record([
                snapshot.view_epoch.to_string(),
                snapshot.url.clone(),
                kind.to_string(),
                value,
                kind.unit().to_string(),
                status,
                snapshot.update_count.to_string(),
            ])?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{RawReading, TransitionType};
    use crate::metrics::aggregator::MetricsAggregator;
    use crate::metrics::kind::MetricKind;

    #[tokio::test]
    async fn one_row_per_changed_metric() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("updates.csv");
        let mut sink = CsvSink::new(path.clone()).unwrap();

        let mut agg = MetricsAggregator::new();
        agg.on_navigation("https://app.test/".into(), TransitionType::Navigation);
        let update = agg
            .ingest(RawReading {
                kind: MetricKind::Lcp,
                value: 2100.0,
                epoch: 1,
                observed_at_ms: 0.0,
                provisional: false,
            })
            .unwrap();

        sink.publish(&update).await.unwrap();
        sink.close().await.unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "epoch,url,metric,value,unit,status,update_count"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("LCP"));
        assert!(row.contains("2100"));
        assert!(row.contains("Good"));
    }
}
