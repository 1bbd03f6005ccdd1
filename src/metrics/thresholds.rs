use super::kind::MetricKind;
use serde::{Deserialize, Serialize};

/// Qualitative rating of one metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricStatus {
    Good,
    NeedsImprovement,
    Poor,
    Unavailable,
}

impl MetricStatus {
    pub fn color(&self) -> &'static str {
        match self {
            MetricStatus::Good => "green",
            MetricStatus::NeedsImprovement => "orange",
            MetricStatus::Poor => "red",
            MetricStatus::Unavailable => "gray",
        }
    }

    /// Textual label so status is never communicated by color alone.
    pub fn accessible_label(&self) -> &'static str {
        match self {
            MetricStatus::Good => "Good",
            MetricStatus::NeedsImprovement => "Needs improvement",
            MetricStatus::Poor => "Poor",
            MetricStatus::Unavailable => "Not available in this context",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub status: MetricStatus,
    pub color_label: String,
    pub accessible_label: String,
}

impl ThresholdResult {
    fn from_status(status: MetricStatus) -> Self {
        Self {
            status,
            color_label: status.color().to_string(),
            accessible_label: status.accessible_label().to_string(),
        }
    }

    /// Marker result for a metric whose instrumentation is absent. Never
    /// produced by `evaluate` and never rated "good".
    pub fn unavailable() -> Self {
        Self::from_status(MetricStatus::Unavailable)
    }
}

struct Band {
    good: f64,
    needs_improvement: f64,
}

/// Upper bounds per rating. Timing metrics in milliseconds, CLS unit-less.
fn band(kind: MetricKind) -> Option<Band> {
    match kind {
        MetricKind::Fcp => Some(Band { good: 1800.0, needs_improvement: 3000.0 }),
        MetricKind::Lcp => Some(Band { good: 2500.0, needs_improvement: 4000.0 }),
        MetricKind::Cls => Some(Band { good: 0.10, needs_improvement: 0.25 }),
        MetricKind::Ttfb => Some(Band { good: 800.0, needs_improvement: 1800.0 }),
        // No accepted rating bands; reported as informational values only.
        MetricKind::DomLoadTime | MetricKind::NavigationTime => None,
    }
}

/// Rate one metric value. Pure and total: invalid or negative values rate
/// "poor" rather than being rejected. `None` for kinds without rating bands.
pub fn evaluate(kind: MetricKind, value: f64) -> Option<ThresholdResult> {
    let band = band(kind)?;
    let status = if !value.is_finite() || value < 0.0 {
        MetricStatus::Poor
    } else if value <= band.good {
        MetricStatus::Good
    } else if value <= band.needs_improvement {
        MetricStatus::NeedsImprovement
    } else {
        MetricStatus::Poor
    };
    Some(ThresholdResult::from_status(status))
}
