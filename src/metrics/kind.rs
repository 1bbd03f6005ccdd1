use crate::event::TransitionType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The metric kinds the monitor tracks for one page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "TTFB")]
    Ttfb,
    #[serde(rename = "FCP")]
    Fcp,
    #[serde(rename = "LCP")]
    Lcp,
    #[serde(rename = "CLS")]
    Cls,
    #[serde(rename = "DOMLoadTime")]
    DomLoadTime,
    #[serde(rename = "NavigationTime")]
    NavigationTime,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::Ttfb,
        MetricKind::Fcp,
        MetricKind::Lcp,
        MetricKind::Cls,
        MetricKind::DomLoadTime,
        MetricKind::NavigationTime,
    ];

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Cls => "score",
            _ => "ms",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Ttfb => "TTFB",
            MetricKind::Fcp => "FCP",
            MetricKind::Lcp => "LCP",
            MetricKind::Cls => "CLS",
            MetricKind::DomLoadTime => "DOMLoadTime",
            MetricKind::NavigationTime => "NavigationTime",
        }
    }

    /// Kinds measured for a page view reached by the given transition.
    /// TTFB, FCP and DOM load time are document-scoped and are not
    /// re-measured when no new document was loaded.
    pub fn applicable_for(transition: TransitionType) -> &'static [MetricKind] {
        match transition {
            TransitionType::Navigation => &Self::ALL,
            TransitionType::Spa => &[MetricKind::Lcp, MetricKind::Cls, MetricKind::NavigationTime],
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_match_kind() {
        assert_eq!(MetricKind::Cls.unit(), "score");
        assert_eq!(MetricKind::Lcp.unit(), "ms");
        assert_eq!(MetricKind::Ttfb.unit(), "ms");
    }

    #[test]
    fn spa_views_skip_document_scoped_kinds() {
        let spa = MetricKind::applicable_for(TransitionType::Spa);
        assert!(!spa.contains(&MetricKind::Ttfb));
        assert!(!spa.contains(&MetricKind::Fcp));
        assert!(!spa.contains(&MetricKind::DomLoadTime));
        assert!(spa.contains(&MetricKind::Lcp));
        assert!(spa.contains(&MetricKind::Cls));
        assert_eq!(
            MetricKind::applicable_for(TransitionType::Navigation).len(),
            MetricKind::ALL.len()
        );
    }
}
