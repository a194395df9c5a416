use serde::{Deserialize, Serialize};
use anyhow::Result;
use log::warn;
use crate::params::{ParamKey, SimulatorParams, SweepParameter};
use std::path::{Path, PathBuf};

// How the external simulator is launched
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SimulatorConfig {
    pub executable: PathBuf,
    /// Wall-clock limit per invocation; 0 disables the limit.
    pub timeout_secs: u64,
    /// Echo every simulator output line at info level.
    pub verbose: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            executable: PathBuf::from("popnet/popnet"),
            timeout_secs: 600,
            verbose: false,
        }
    }
}

/// Textual representation of packet injection times in trace files.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeNotation {
    /// Shortest decimal form; whole numbers print without a fraction.
    #[default]
    Native,
    /// Truncated to whole cycles.
    Cycle,
    /// Scientific notation with four fractional mantissa digits (`1.2346e+01`).
    Scientific,
}

// Trace generation settings used by `run` and the sweeps
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TraceConfig {
    #[serde(default = "default_trace_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_base_name")]
    pub base_name: String,
    #[serde(default = "default_injection_rate")]
    pub injection_rate: f64,
    #[serde(default = "default_packet_size")]
    pub packet_size: u32,
    #[serde(default = "default_trace_cycles")]
    pub cycles: u64,
    #[serde(default = "default_true")]
    pub add_jitter: bool,
    #[serde(default)]
    pub notation: TimeNotation,
    #[serde(default = "default_trace_seed")]
    pub seed: u64,
    /// Pre-built trace for sweep axes that do not reshape the trace.
    /// When absent a baseline trace is generated from the defaults.
    #[serde(default)]
    pub base_trace: Option<PathBuf>,
}

fn default_trace_dir() -> PathBuf {
    PathBuf::from("trace")
}

fn default_base_name() -> String {
    "bench".to_string()
}

fn default_injection_rate() -> f64 {
    0.1
}

fn default_packet_size() -> u32 {
    5
}

fn default_trace_cycles() -> u64 {
    20000 / 3
}

fn default_true() -> bool {
    true
}

fn default_trace_seed() -> u64 {
    1
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            output_dir: default_trace_dir(),
            base_name: default_base_name(),
            injection_rate: default_injection_rate(),
            packet_size: default_packet_size(),
            cycles: default_trace_cycles(),
            add_jitter: true,
            notation: TimeNotation::default(),
            seed: default_trace_seed(),
            base_trace: None,
        }
    }
}

/// Upper bound on injections scheduled for a single source in one trace.
pub const MAX_PACKETS_PER_SOURCE: u64 = 10_000_000;

/// Injections per source for the schedule `1, 1 + interval, ...` up to
/// `cycles`, where `interval = packet_size / injection_rate`. Infinite when
/// the interval is too small to advance the schedule at all.
pub fn packets_per_source(packet_size: u32, injection_rate: f64, cycles: u64) -> f64 {
    let interval = packet_size as f64 / injection_rate;
    if !(1.0 + interval > 1.0) {
        return f64::INFINITY;
    }
    (cycles.saturating_sub(1) as f64 / interval).floor() + 1.0
}

impl TraceConfig {
    /// Path of the combined (all sources) trace file.
    pub fn combined_path(&self) -> PathBuf {
        self.output_dir.join(&self.base_name)
    }
}

/// One sweep axis: an inclusive integer range for a simulator flag.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AxisConfig {
    pub param: ParamKey,
    pub start: u32,
    pub end: u32,
    #[serde(default = "default_step")]
    pub step: u32,
}

fn default_step() -> u32 {
    1
}

impl AxisConfig {
    pub fn new(param: ParamKey, start: u32, end: u32, step: u32) -> Self {
        AxisConfig { param, start, end, step }
    }

    pub fn values(&self) -> Vec<u32> {
        (self.start..=self.end).step_by(self.step.max(1) as usize).collect()
    }
}

/// Inclusive real-valued range, sampled at `start + k * step`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct RateRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl RateRange {
    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.end < self.start {
            return Vec::new();
        }
        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize + 1;
        (0..count)
            // Round away the accumulated binary error so 0.1 * 3 prints as 0.3.
            .map(|k| ((self.start + k as f64 * self.step) * 1e10).round() / 1e10)
            .collect()
    }
}

// Injection rate is a trace parameter, not a simulator flag, so it has its own sweep
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct InjectionRateSweep {
    pub low: RateRange,
    pub high: RateRange,
    /// Trace cycles are `defaults.cycles / divisor` for each divisor.
    pub cycle_divisors: Vec<u32>,
}

impl Default for InjectionRateSweep {
    fn default() -> Self {
        InjectionRateSweep {
            low: RateRange { start: 0.01, end: 0.1, step: 0.01 },
            high: RateRange { start: 0.1, end: 3.0, step: 0.1 },
            cycle_divisors: vec![10, 1],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SweepPlan {
    #[serde(default = "default_axes")]
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub injection_rate: InjectionRateSweep,
}

fn default_axes() -> Vec<AxisConfig> {
    vec![
        AxisConfig::new(ParamKey::ArraySize, 1, 10, 1),
        AxisConfig::new(ParamKey::VirtualChannels, 1, 10, 1),
        AxisConfig::new(ParamKey::InputBuffer, 0, 10, 1),
        AxisConfig::new(ParamKey::OutputBuffer, 0, 10, 1),
        AxisConfig::new(ParamKey::FlitSize, 0, 100, 4),
        AxisConfig::new(ParamKey::LinkLength, 100, 2000, 100),
        AxisConfig::new(ParamKey::Cycles, 2000, 24000, 2000),
        AxisConfig::new(ParamKey::Seed, 1, 10, 1),
        AxisConfig::new(ParamKey::RoutingAlgorithm, 0, 1, 1),
    ]
}

impl Default for SweepPlan {
    fn default() -> Self {
        SweepPlan {
            axes: default_axes(),
            injection_rate: InjectionRateSweep::default(),
        }
    }
}

impl SweepPlan {
    /// Expands the configured axes into declared sweep parameters.
    pub fn parameters(&self, defaults: &SimulatorParams) -> Vec<SweepParameter> {
        self.axes
            .iter()
            .map(|axis| SweepParameter {
                key: axis.param,
                description: axis.param.description().to_string(),
                default: defaults.get(axis.param),
                range: axis.values(),
            })
            .collect()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Bincode,
    MessagePack,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Bincode => "bin",
            OutputFormat::MessagePack => "msgpack",
        }
    }
}

// Where sweep results are written
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub directory: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            directory: default_output_dir(),
            format: OutputFormat::default(),
        }
    }
}

// Main configuration structure, loaded from a TOML file.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SweepConfig {
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub defaults: SimulatorParams,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub sweep: SweepPlan,
    #[serde(default)]
    pub output: OutputConfig,
}

impl SweepConfig {
    /// Loads the sweep configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SweepConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects parameter combinations that would produce a degenerate trace
    /// or an invalid simulator invocation.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.array_size == 0 {
            anyhow::bail!("defaults.array_size must be greater than 0.");
        }
        match self.defaults.dimension {
            2 => {}
            3 => warn!("3D networks are not supported by the simulator yet."),
            other => anyhow::bail!("defaults.dimension must be 2 or 3, got {}.", other),
        }
        if !(self.trace.injection_rate > 0.0 && self.trace.injection_rate.is_finite()) {
            anyhow::bail!("trace.injection_rate must be a positive number.");
        }
        if self.trace.packet_size == 0 {
            anyhow::bail!("trace.packet_size must be greater than 0.");
        }
        if self.trace.cycles == 0 {
            anyhow::bail!("trace.cycles must be greater than 0.");
        }
        if packets_per_source(self.trace.packet_size, self.trace.injection_rate, self.trace.cycles)
            > MAX_PACKETS_PER_SOURCE as f64
        {
            anyhow::bail!(
                "trace.injection_rate {} schedules more than {} packets per source.",
                self.trace.injection_rate,
                MAX_PACKETS_PER_SOURCE
            );
        }
        if self.trace.base_name.is_empty() {
            anyhow::bail!("trace.base_name must not be empty.");
        }
        for axis in &self.sweep.axes {
            if axis.step == 0 {
                anyhow::bail!("sweep axis '{}' has a zero step.", axis.param);
            }
            if axis.start > axis.end {
                anyhow::bail!("sweep axis '{}' has start {} after end {}.", axis.param, axis.start, axis.end);
            }
            match axis.param {
                ParamKey::ArraySize if axis.start == 0 => {
                    anyhow::bail!("sweep axis 'array_size' must start at 1 or above.");
                }
                ParamKey::Dimension => {
                    if let Some(bad) = axis.values().into_iter().find(|d| !(2..=3).contains(d)) {
                        anyhow::bail!("sweep axis 'dimension' visits {}; only 2 and 3 are valid.", bad);
                    }
                }
                _ => {}
            }
        }
        let rates = &self.sweep.injection_rate;
        for (label, range) in [("low", &rates.low), ("high", &rates.high)] {
            if !(range.step > 0.0) || !(range.start > 0.0) || range.end < range.start {
                anyhow::bail!("sweep.injection_rate.{} must be a positive, non-empty range.", label);
            }
        }
        if rates.cycle_divisors.iter().any(|&d| d == 0 || self.defaults.cycles / d == 0) {
            anyhow::bail!("sweep.injection_rate.cycle_divisors must leave at least one trace cycle.");
        }
        for &divisor in &rates.cycle_divisors {
            let cycles = u64::from(self.defaults.cycles / divisor);
            for range in [&rates.low, &rates.high] {
                if packets_per_source(self.trace.packet_size, range.end, cycles) > MAX_PACKETS_PER_SOURCE as f64 {
                    anyhow::bail!(
                        "sweep.injection_rate up to {} schedules more than {} packets per source.",
                        range.end,
                        MAX_PACKETS_PER_SOURCE
                    );
                }
            }
        }
        Ok(())
    }
}
