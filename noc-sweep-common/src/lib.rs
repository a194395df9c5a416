pub mod config;
pub mod params;
pub mod report;
pub mod series;

// Re-export key types for easier use by dependent crates
pub use config::{
    packets_per_source, AxisConfig, InjectionRateSweep, OutputConfig, OutputFormat, RateRange, SimulatorConfig,
    SweepConfig, SweepPlan, TimeNotation, TraceConfig, MAX_PACKETS_PER_SOURCE,
};
pub use params::{ParamKey, SimulatorParams, SweepParameter};
pub use report::SimulationReport;
pub use series::{MetricSeries, METRIC_NAMES};
