use serde::{Deserialize, Serialize};
use validator::Validate;

/// Tuning knobs for the observation pipeline. Every field has a default so
/// a config file only needs to state what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MonitorConfig {
    /// Debounce applied before confirming a candidate navigation.
    #[serde(default = "default_nav_debounce_ms")]
    #[validate(range(min = 50.0, max = 5000.0))]
    pub nav_debounce_ms: f64,

    /// Hard cap on how long repeated signals can defer confirmation.
    #[serde(default = "default_nav_max_wait_ms")]
    #[validate(range(min = 100.0, max = 30000.0))]
    pub nav_max_wait_ms: f64,

    /// Coalescing window for DOM mutation bursts.
    #[serde(default = "default_mutation_coalesce_ms")]
    #[validate(range(min = 20.0, max = 2000.0))]
    pub mutation_coalesce_ms: f64,

    #[serde(default = "default_mutation_max_coalesce_ms")]
    #[validate(range(min = 50.0, max = 10000.0))]
    pub mutation_max_coalesce_ms: f64,

    /// Debounce between a content-update classification and the recollection
    /// request it triggers.
    #[serde(default = "default_recollect_debounce_ms")]
    #[validate(range(min = 50.0, max = 10000.0))]
    pub recollect_debounce_ms: f64,

    /// Mutation-count floor below which a burst is ignored.
    #[serde(default = "default_min_mutation_nodes")]
    pub min_mutation_nodes: u32,

    /// Paintable-area floor below which a burst is ignored, in px².
    #[serde(default = "default_min_paintable_area_px")]
    pub min_paintable_area_px: f64,

    /// Tree depth still counted as "near the document root".
    #[serde(default = "default_root_depth")]
    pub root_depth: u32,

    /// Fraction of the document's nodes that must churn near the root for a
    /// burst to look like a navigation.
    #[serde(default = "default_root_churn_ratio")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub root_churn_ratio: f64,

    /// Minimum burst size before navigation-likeness is even considered.
    #[serde(default = "default_nav_min_nodes")]
    pub nav_min_nodes: u32,

    #[serde(default)]
    pub output: Option<SinkConfig>,

    /// Optional path to a parent configuration file to inherit from.
    #[serde(default)]
    pub extends: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            nav_debounce_ms: default_nav_debounce_ms(),
            nav_max_wait_ms: default_nav_max_wait_ms(),
            mutation_coalesce_ms: default_mutation_coalesce_ms(),
            mutation_max_coalesce_ms: default_mutation_max_coalesce_ms(),
            recollect_debounce_ms: default_recollect_debounce_ms(),
            min_mutation_nodes: default_min_mutation_nodes(),
            min_paintable_area_px: default_min_paintable_area_px(),
            root_depth: default_root_depth(),
            root_churn_ratio: default_root_churn_ratio(),
            nav_min_nodes: default_nav_min_nodes(),
            output: None,
            extends: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    Console,
    Json { path: String },
    Csv { path: String },
}

fn default_nav_debounce_ms() -> f64 {
    300.0
}

fn default_nav_max_wait_ms() -> f64 {
    1_500.0
}

fn default_mutation_coalesce_ms() -> f64 {
    200.0
}

fn default_mutation_max_coalesce_ms() -> f64 {
    600.0
}

fn default_recollect_debounce_ms() -> f64 {
    500.0
}

fn default_min_mutation_nodes() -> u32 {
    5
}

fn default_min_paintable_area_px() -> f64 {
    10_000.0
}

fn default_root_depth() -> u32 {
    2
}

fn default_root_churn_ratio() -> f64 {
    0.5
}

fn default_nav_min_nodes() -> u32 {
    30
}
