use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metric columns carried by every [`MetricSeries`], in export order.
pub const METRIC_NAMES: [&str; 9] = [
    "total_packets",
    "finished_packets",
    "completion_rate",
    "avg_delay",
    "mem_power",
    "crossbar_power",
    "arbiter_power",
    "link_power",
    "total_power",
];

/// Result of one sweep axis: each metric as a series aligned with the
/// independent values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    /// Axis label, e.g. `array size [-A]`.
    pub independent_variable: String,
    pub independent_values: Vec<f64>,
    pub dependent_metrics: BTreeMap<String, Vec<f64>>,
}

impl MetricSeries {
    pub fn metric(&self, name: &str) -> Option<&[f64]> {
        self.dependent_metrics.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.independent_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.independent_values.is_empty()
    }
}
