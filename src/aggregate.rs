use crate::error::AggregateError;
use noc_sweep_common::{MetricSeries, SimulationReport, METRIC_NAMES};
use std::collections::BTreeMap;

/// Turns the reports of one sweep axis into per-metric series.
/// `reports[i]` belongs to `values[i]`.
pub fn aggregate(
    independent_variable: &str,
    values: &[f64],
    reports: &[SimulationReport],
) -> Result<MetricSeries, AggregateError> {
    if values.len() != reports.len() {
        return Err(AggregateError::LengthMismatch { values: values.len(), reports: reports.len() });
    }

    let mut dependent_metrics: BTreeMap<String, Vec<f64>> = METRIC_NAMES
        .iter()
        .map(|name| (name.to_string(), Vec::with_capacity(reports.len())))
        .collect();
    for report in reports {
        for (name, value) in report.metrics() {
            dependent_metrics.entry(name.to_string()).or_default().push(value);
        }
    }

    Ok(MetricSeries {
        independent_variable: independent_variable.to_string(),
        independent_values: values.to_vec(),
        dependent_metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(total: u64, finished: u64, delay: f64) -> SimulationReport {
        SimulationReport {
            total_packets: total,
            finished_packets: finished,
            avg_delay: delay,
            mem_power: 1.0,
            crossbar_power: 2.0,
            arbiter_power: 3.0,
            link_power: 4.0,
            total_power: 10.0,
        }
    }

    #[test]
    fn series_keep_positional_order() {
        let series = aggregate(
            "link length [-L]",
            &[100.0, 200.0],
            &[report(200, 50, 12.5), report(100, 100, 30.0)],
        )
        .expect("lengths match");

        assert_eq!(series.independent_variable, "link length [-L]");
        assert_eq!(series.len(), 2);
        assert_eq!(series.metric("completion_rate"), Some(&[25.0, 100.0][..]));
        assert_eq!(series.metric("avg_delay"), Some(&[12.5, 30.0][..]));
        assert_eq!(series.metric("total_packets"), Some(&[200.0, 100.0][..]));
        assert_eq!(series.dependent_metrics.len(), METRIC_NAMES.len());
        assert!(series.dependent_metrics.values().all(|s| s.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert_eq!(
            aggregate("seed [-r]", &[1.0, 2.0], &[report(1, 1, 1.0)]),
            Err(AggregateError::LengthMismatch { values: 2, reports: 1 })
        );
    }
}
