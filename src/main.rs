use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::{Builder, Env};
use log::{debug, info};
use noc_sweep::decoder::{ReportDecoder, ReportSchema};
use noc_sweep::export::export_results;
use noc_sweep::materialize::{materialize, split_trace};
use noc_sweep::simulator::{ExternalSimulator, Simulator};
use noc_sweep::sweep::SweepDriver;
use noc_sweep::trace::{build_trace, TraceSpec};
use noc_sweep_common::{SweepConfig, TimeNotation};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;

/// Trace generator and parameter-sweep driver for the popnet simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the sweep configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a synthetic trace into the trace directory
    Trace(TraceOverrides),
    /// Run the simulator once with the configured defaults and print the decoded report
    Run {
        /// Use an existing combined trace instead of generating one
        #[arg(long)]
        trace: Option<PathBuf>,

        #[command(flatten)]
        overrides: TraceOverrides,
    },
    /// Split a combined trace into per-source files next to it
    Split {
        /// Combined trace file
        input: PathBuf,
    },
    /// Run every configured sweep axis plus the injection-rate sweep and export the results
    Sweep,
}

/// Command-line overrides for the trace and mesh settings of the config file
#[derive(clap::Args, Debug)]
struct TraceOverrides {
    /// Routers on each mesh dimension
    #[arg(long)]
    array_size: Option<u32>,

    /// Mesh dimension (2 or 3)
    #[arg(long)]
    dimension: Option<u32>,

    /// Flits injected per cycle per source
    #[arg(long)]
    injection_rate: Option<f64>,

    /// Flits per packet
    #[arg(long)]
    packet_size: Option<u32>,

    /// Last cycle at which a packet may be scheduled
    #[arg(long)]
    cycles: Option<u64>,

    /// Inject exactly on the nominal schedule
    #[arg(long)]
    no_jitter: bool,

    #[arg(long, value_enum)]
    notation: Option<NotationArg>,

    /// Seed for the trace generator
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the trace files are written to (wiped first)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum NotationArg {
    Native,
    Cycle,
    Scientific,
}

impl From<NotationArg> for TimeNotation {
    fn from(arg: NotationArg) -> Self {
        match arg {
            NotationArg::Native => TimeNotation::Native,
            NotationArg::Cycle => TimeNotation::Cycle,
            NotationArg::Scientific => TimeNotation::Scientific,
        }
    }
}

impl TraceOverrides {
    fn apply(&self, config: &mut SweepConfig) {
        if let Some(array_size) = self.array_size {
            config.defaults.array_size = array_size;
        }
        if let Some(dimension) = self.dimension {
            config.defaults.dimension = dimension;
        }
        if let Some(rate) = self.injection_rate {
            config.trace.injection_rate = rate;
        }
        if let Some(size) = self.packet_size {
            config.trace.packet_size = size;
        }
        if let Some(cycles) = self.cycles {
            config.trace.cycles = cycles;
        }
        if self.no_jitter {
            config.trace.add_jitter = false;
        }
        if let Some(notation) = self.notation {
            config.trace.notation = notation.into();
        }
        if let Some(seed) = self.seed {
            config.trace.seed = seed;
        }
        if let Some(dir) = &self.output_dir {
            config.trace.output_dir = dir.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut config = match &cli.config {
        Some(path) => SweepConfig::load(path)?,
        None => {
            let config = SweepConfig::default();
            config.validate()?;
            config
        }
    };

    match cli.command {
        Command::Trace(overrides) => {
            overrides.apply(&mut config);
            config.validate()?;
            generate_trace(&config)?;
        }
        Command::Run { trace, overrides } => {
            overrides.apply(&mut config);
            config.validate()?;
            let trace = match trace {
                Some(path) => path,
                None => generate_trace(&config)?,
            };
            run_once(&config, trace)?;
        }
        Command::Split { input } => {
            let files = split_trace(&input)?;
            info!("Wrote {} per-source files next to {}", files.per_source.len(), input.display());
        }
        Command::Sweep => run_sweep(&config)?,
    }
    Ok(())
}

/// Builds the configured trace and writes it out; returns the combined file.
fn generate_trace(config: &SweepConfig) -> Result<PathBuf> {
    let spec = TraceSpec::from_config(&config.trace, &config.defaults)?;
    let mut rng = StdRng::seed_from_u64(config.trace.seed);
    let trace = build_trace(&spec, &mut rng)?;
    let files = materialize(&trace, &config.trace.output_dir, &config.trace.base_name)?;
    info!(
        "Generated {} packets from {} sources into {}",
        trace.len(),
        files.per_source.len(),
        files.combined.display()
    );
    Ok(files.combined)
}

fn run_once(config: &SweepConfig, trace: PathBuf) -> Result<()> {
    let decoder = ReportDecoder::new(&ReportSchema::popnet())?;
    let mut simulator = ExternalSimulator::from_config(&config.simulator);
    debug!("Simulator parameters: {:#?}", config.defaults);

    let start_time = Instant::now();
    let output = simulator
        .simulate(&config.defaults, &trace)
        .with_context(|| format!("Simulation of '{}' failed", trace.display()))?;
    let report = decoder.decode(&output)?;

    info!("Simulation finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());
    info!(
        "Packets: {} injected, {} finished ({:.2}%)",
        report.total_packets,
        report.finished_packets,
        report.completion_rate()
    );
    info!("Average delay: {}", report.avg_delay);
    info!(
        "Power: mem {} | crossbar {} | arbiter {} | link {} | total {}",
        report.mem_power, report.crossbar_power, report.arbiter_power, report.link_power, report.total_power
    );
    Ok(())
}

fn run_sweep(config: &SweepConfig) -> Result<()> {
    let decoder = ReportDecoder::new(&ReportSchema::popnet())?;
    let simulator = ExternalSimulator::from_config(&config.simulator);

    info!("Starting sweep over {} axes plus injection rate...", config.sweep.axes.len());
    let start_time = Instant::now();
    let results = SweepDriver::new(simulator, &decoder, config).run_all()?;
    info!(
        "Sweep finished in {:.3} minutes.",
        start_time.elapsed().as_secs_f64() / 60.0
    );

    export_results(&results, &config.output)?;
    Ok(())
}
