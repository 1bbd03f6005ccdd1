use crate::config::MonitorConfig;
use crate::event::{DomSnapshot, MutationBatch, MutationRecord, NodeClass};
use std::collections::BTreeSet;

/// How a coalesced mutation burst should be treated downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationSignificance {
    /// Below the mutation-count/area floor; ignored entirely.
    Insignificant,
    /// In-place content churn (ads, lazy images, infinite scroll); warrants
    /// a debounced recomputation, not a reset.
    ContentUpdate,
    /// Large subtree replacement near the document root; a navigation
    /// candidate, pending URL corroboration.
    NavigationLike,
}

#[derive(Debug)]
struct PendingBurst {
    records: Vec<MutationRecord>,
    dom: DomSnapshot,
    first_at_ms: f64,
    deadline_ms: f64,
}

/// Scores DOM mutation bursts for layout significance, gating LCP/CLS
/// recomputation so high-frequency low-significance churn cannot thrash the
/// aggregator.
pub struct DynamicContentClassifier {
    coalesce_ms: f64,
    max_coalesce_ms: f64,
    min_nodes: u32,
    min_paintable_area_px: f64,
    root_depth: u32,
    root_churn_ratio: f64,
    nav_min_nodes: u32,
    pending: Option<PendingBurst>,
}

impl DynamicContentClassifier {
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            coalesce_ms: config.mutation_coalesce_ms,
            max_coalesce_ms: config.mutation_max_coalesce_ms,
            min_nodes: config.min_mutation_nodes,
            min_paintable_area_px: config.min_paintable_area_px,
            root_depth: config.root_depth,
            root_churn_ratio: config.root_churn_ratio,
            nav_min_nodes: config.nav_min_nodes,
            pending: None,
        }
    }

    /// Merge one batch into the burst being coalesced, refreshing the
    /// coalescing deadline up to a maximum total window.
    pub fn absorb(&mut self, batch: MutationBatch, now_ms: f64) {
        match &mut self.pending {
            Some(pending) => {
                pending.records.extend(batch.records);
                pending.dom = batch.dom;
                pending.deadline_ms =
                    (now_ms + self.coalesce_ms).min(pending.first_at_ms + self.max_coalesce_ms);
            }
            None => {
                self.pending = Some(PendingBurst {
                    records: batch.records,
                    dom: batch.dom,
                    first_at_ms: now_ms,
                    deadline_ms: now_ms + self.coalesce_ms,
                });
            }
        }
    }

    /// Drop whatever is being coalesced (the document it belonged to is gone).
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.pending.as_ref().map(|p| p.deadline_ms)
    }

    /// Classify the coalesced burst once its window has expired.
    pub fn on_deadline(&mut self, now_ms: f64) -> Option<(MutationSignificance, DomSnapshot)> {
        match &self.pending {
            Some(pending) if now_ms >= pending.deadline_ms => {}
            _ => return None,
        }
        let pending = self.pending.take()?;
        let significance = self.classify(&pending.records, &pending.dom);
        log::debug!(
            "mutation burst of {} records classified {:?}",
            pending.records.len(),
            significance
        );
        Some((significance, pending.dom))
    }

    fn classify(&self, records: &[MutationRecord], dom: &DomSnapshot) -> MutationSignificance {
        let total_nodes: u64 = records.iter().map(|r| (r.added + r.removed) as u64).sum();
        let paintable_area: f64 = records
            .iter()
            .filter(|r| r.node_class == NodeClass::Paintable)
            .map(|r| r.area_px)
            .sum();

        if total_nodes < self.min_nodes as u64 && paintable_area < self.min_paintable_area_px {
            return MutationSignificance::Insignificant;
        }

        let root_nodes: u64 = records
            .iter()
            .filter(|r| r.depth <= self.root_depth)
            .map(|r| (r.added + r.removed) as u64)
            .sum();
        let doc_nodes = dom.node_count.max(1) as f64;
        if total_nodes >= self.nav_min_nodes as u64
            && root_nodes as f64 / doc_nodes >= self.root_churn_ratio
        {
            return MutationSignificance::NavigationLike;
        }

        // Scattered administrative churn (ad-frame ticking, attribute flips
        // across the page) paints nothing worth re-measuring.
        let regions: BTreeSet<&str> = records.iter().map(|r| r.region.as_str()).collect();
        let dispersed = records.len() >= 4 && regions.len() * 2 > records.len();
        if paintable_area < self.min_paintable_area_px && dispersed {
            return MutationSignificance::Insignificant;
        }

        MutationSignificance::ContentUpdate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> DynamicContentClassifier {
        DynamicContentClassifier::new(&MonitorConfig::default())
    }

    fn dom(node_count: u32) -> DomSnapshot {
        DomSnapshot {
            url: "https://app.test/feed".into(),
            markers: Default::default(),
            route_announcement: None,
            node_count,
        }
    }

    fn record(region: &str, depth: u32, class: NodeClass, added: u32, area: f64) -> MutationRecord {
        MutationRecord {
            region: region.into(),
            depth,
            node_class: class,
            added,
            removed: 0,
            area_px: area,
        }
    }

    fn classify_one(records: Vec<MutationRecord>, dom_nodes: u32) -> MutationSignificance {
        let mut c = classifier();
        c.absorb(MutationBatch { records, dom: dom(dom_nodes), at_ms: 0.0 }, 0.0);
        let deadline = c.next_deadline().unwrap();
        c.on_deadline(deadline).unwrap().0
    }

    #[test]
    fn tiny_bursts_are_insignificant() {
        let records = vec![record("#ad-slot", 8, NodeClass::Administrative, 2, 0.0)];
        assert_eq!(classify_one(records, 2_000), MutationSignificance::Insignificant);
    }

    #[test]
    fn concentrated_image_append_is_a_content_update() {
        // Infinite scroll: many paintable nodes, one region, deep in the tree.
        let records = (0..10)
            .map(|_| record("#feed", 6, NodeClass::Paintable, 4, 30_000.0))
            .collect();
        assert_eq!(classify_one(records, 2_000), MutationSignificance::ContentUpdate);
    }

    #[test]
    fn root_subtree_replacement_is_navigation_like() {
        let records = vec![
            MutationRecord {
                region: "#app".into(),
                depth: 1,
                node_class: NodeClass::Paintable,
                added: 600,
                removed: 550,
                area_px: 500_000.0,
            },
        ];
        assert_eq!(classify_one(records, 1_200), MutationSignificance::NavigationLike);
    }

    #[test]
    fn dispersed_administrative_churn_is_insignificant() {
        // Plenty of records, but scattered and painting nothing.
        let records = (0..12)
            .map(|i| record(&format!("#widget-{i}"), 7, NodeClass::Administrative, 1, 0.0))
            .collect();
        assert_eq!(classify_one(records, 2_000), MutationSignificance::Insignificant);
    }

    #[test]
    fn batches_coalesce_until_the_window_expires() {
        let mut c = classifier();
        c.absorb(
            MutationBatch {
                records: vec![record("#feed", 6, NodeClass::Paintable, 3, 20_000.0)],
                dom: dom(2_000),
                at_ms: 0.0,
            },
            0.0,
        );
        assert!(c.on_deadline(50.0).is_none(), "window still open");
        c.absorb(
            MutationBatch {
                records: vec![record("#feed", 6, NodeClass::Paintable, 3, 20_000.0)],
                dom: dom(2_000),
                at_ms: 80.0,
            },
            80.0,
        );
        let deadline = c.next_deadline().unwrap();
        let (significance, _) = c.on_deadline(deadline).unwrap();
        assert_eq!(significance, MutationSignificance::ContentUpdate);
        assert!(c.next_deadline().is_none(), "burst consumed");
    }

    #[test]
    fn clear_drops_the_pending_burst() {
        let mut c = classifier();
        c.absorb(
            MutationBatch {
                records: vec![record("#feed", 6, NodeClass::Paintable, 3, 20_000.0)],
                dom: dom(2_000),
                at_ms: 0.0,
            },
            0.0,
        );
        c.clear();
        assert!(c.on_deadline(10_000.0).is_none());
    }
}
