//! One-parameter-at-a-time sweeps over the simulator flags, plus the
//! injection-rate sweep over freshly generated traces.

use crate::aggregate::aggregate;
use crate::decoder::ReportDecoder;
use crate::materialize::materialize;
use crate::simulator::Simulator;
use crate::trace::{build_trace, TraceSpec};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use noc_sweep_common::{
    MetricSeries, ParamKey, RateRange, SimulationReport, SimulatorParams, SweepConfig, SweepParameter,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// Axis label used for every injection-rate series.
pub const INJECTION_RATE_TITLE: &str = "injection rate";

/// Series in the order they were produced, keyed by axis name.
pub type SweepResults = Vec<(String, MetricSeries)>;

/// Drives the external simulator across the configured sweep.
///
/// Parameters are never mutated in place: every sweep point runs with a copy
/// of the defaults overridden in exactly one place.
pub struct SweepDriver<'a, S: Simulator> {
    simulator: S,
    decoder: &'a ReportDecoder,
    config: &'a SweepConfig,
    /// Trace used by axes that do not reshape it; `None` once a rebuild has
    /// overwritten the trace directory.
    baseline: Option<PathBuf>,
}

impl<'a, S: Simulator> SweepDriver<'a, S> {
    pub fn new(simulator: S, decoder: &'a ReportDecoder, config: &'a SweepConfig) -> Self {
        SweepDriver { simulator, decoder, config, baseline: config.trace.base_trace.clone() }
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    /// Every configured axis, then the injection-rate sweep.
    pub fn run_all(&mut self) -> Result<SweepResults> {
        let defaults = self.config.defaults;
        let parameters = self.config.sweep.parameters(&defaults);
        let mut results = self.sweep(&parameters, &defaults, ParamKey::shapes_trace)?;
        results.extend(self.injection_rate_sweep(&defaults)?);
        Ok(results)
    }

    /// Sweeps each parameter over its range with everything else held at
    /// `defaults`. The trace is regenerated for each point of an axis for
    /// which `rebuild` holds.
    pub fn sweep<F>(
        &mut self,
        parameters: &[SweepParameter],
        defaults: &SimulatorParams,
        rebuild: F,
    ) -> Result<SweepResults>
    where
        F: Fn(ParamKey) -> bool,
    {
        let mut results = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let key = parameter.key;
            let max = parameter.range.iter().max().copied().unwrap_or_default();
            let mut reports = Vec::with_capacity(parameter.range.len());

            for &value in &parameter.range {
                let params = defaults.with(key, value);
                let context = || format!("Sweep point {} = {} failed", key, value);
                let trace = if rebuild(key) {
                    self.baseline = self.config.trace.base_trace.clone();
                    TraceSpec::from_config(&self.config.trace, &params)
                        .map_err(anyhow::Error::from)
                        .and_then(|spec| self.generate(&spec))
                        .with_context(context)?
                } else {
                    self.baseline_trace(defaults).with_context(context)?
                };
                info!("{}: {}/{}", key, value, max);
                let report = self.run_point(&params, &trace).with_context(context)?;
                reports.push(report);
            }

            let values: Vec<f64> = parameter.range.iter().map(|&v| v as f64).collect();
            let series = aggregate(&key.axis_title(), &values, &reports)?;
            results.push((key.name().to_string(), series));
        }
        Ok(results)
    }

    /// Sweeps the trace injection rate over the low and high ranges, once
    /// per configured cycle divisor. The simulator always runs with `defaults`.
    pub fn injection_rate_sweep(&mut self, defaults: &SimulatorParams) -> Result<SweepResults> {
        let config = self.config;
        let plan = &config.sweep.injection_rate;
        let ranges: [(&str, RateRange); 2] = [("low", plan.low), ("high", plan.high)];

        let mut results = Vec::new();
        for &divisor in &plan.cycle_divisors {
            if divisor == 0 {
                bail!("Injection rate cycle divisor must be positive");
            }
            let cycles = u64::from(defaults.cycles / divisor);
            for (label, range) in ranges {
                let rates = range.values();
                let mut reports = Vec::with_capacity(rates.len());
                for &rate in &rates {
                    let context = || format!("Sweep point injection rate = {} failed", rate);
                    let trace = TraceSpec::from_config(&config.trace, defaults)
                        .map_err(anyhow::Error::from)
                        .and_then(|spec| {
                            self.generate(&TraceSpec { injection_rate: rate, cycles, ..spec })
                        })
                        .with_context(context)?;
                    info!("injection rate: {} ({} cycles)", rate, cycles);
                    let report = self.run_point(defaults, &trace).with_context(context)?;
                    reports.push(report);
                }
                let series = aggregate(INJECTION_RATE_TITLE, &rates, &reports)?;
                results.push((format!("injection_rate_{}_cycles{}", label, cycles), series));
            }
        }
        self.baseline = config.trace.base_trace.clone();
        Ok(results)
    }

    fn run_point(&mut self, params: &SimulatorParams, trace: &Path) -> Result<SimulationReport> {
        let text = self.simulator.simulate(params, trace)?;
        let report = self.decoder.decode(&text)?;
        debug!(
            "{} of {} packets finished, average delay {}",
            report.finished_packets, report.total_packets, report.avg_delay
        );
        Ok(report)
    }

    /// Builds and writes a trace seeded from the configured trace seed.
    fn generate(&self, spec: &TraceSpec) -> Result<PathBuf> {
        let mut rng = StdRng::seed_from_u64(self.config.trace.seed);
        let trace = build_trace(spec, &mut rng)?;
        let files = materialize(&trace, &self.config.trace.output_dir, &self.config.trace.base_name)?;
        Ok(files.combined)
    }

    fn baseline_trace(&mut self, defaults: &SimulatorParams) -> Result<PathBuf> {
        if let Some(path) = &self.baseline {
            return Ok(path.clone());
        }
        let path = self.generate(&TraceSpec::from_config(&self.config.trace, defaults)?)?;
        self.baseline = Some(path.clone());
        Ok(path)
    }
}
