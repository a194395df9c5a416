//! Invocation of the external interconnect simulator.

use crate::error::SimulatorError;
use log::{debug, info, trace};
use noc_sweep_common::{SimulatorConfig, SimulatorParams};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a running simulator is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of one simulator run.
#[derive(Debug, Clone)]
pub struct SimulatorOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Something that can simulate a trace file under a parameter set and
/// return the textual report.
pub trait Simulator {
    fn simulate(&mut self, params: &SimulatorParams, trace: &Path) -> Result<String, SimulatorError>;
}

/// The simulator executable, run as a child process per invocation.
#[derive(Debug, Clone)]
pub struct ExternalSimulator {
    executable: PathBuf,
    timeout: Option<Duration>,
    verbose: bool,
}

impl ExternalSimulator {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        ExternalSimulator { executable: executable.into(), timeout: None, verbose: false }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        ExternalSimulator::new(&config.executable).with_timeout(timeout).with_verbose(config.verbose)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Runs the simulator to completion (or until the timeout) and captures
    /// both output streams. Any exit status is returned as-is.
    pub fn run(&self, params: &SimulatorParams, trace: &Path) -> Result<SimulatorOutput, SimulatorError> {
        let mut command = Command::new(&self.executable);
        command
            .args(params.to_args())
            .arg("-I")
            .arg(trace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Launching {:?}", command);

        let mut child = command.spawn().map_err(|source| SimulatorError::Spawn {
            executable: self.executable.clone(),
            source,
        })?;

        let verbose = self.verbose;
        let stdout_reader = child.stdout.take().map(|stdout| {
            thread::spawn(move || -> io::Result<String> {
                let mut captured = String::new();
                for line in BufReader::new(stdout).lines() {
                    let line = line?;
                    if verbose {
                        info!("{}", line);
                    } else {
                        trace!("{}", line);
                    }
                    captured.push_str(&line);
                    captured.push('\n');
                }
                Ok(captured)
            })
        });
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || -> io::Result<String> {
                let mut captured = String::new();
                stderr.read_to_string(&mut captured)?;
                Ok(captured)
            })
        });

        let status = self.wait(&mut child)?;
        let stdout = collect(stdout_reader)?;
        let stderr = collect(stderr_reader)?;
        Ok(SimulatorOutput { status, stdout, stderr })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus, SimulatorError> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if let Some(limit) = self.timeout {
                if started.elapsed() >= limit {
                    // Already-exited races are fine; the wait below reaps either way.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SimulatorError::Timeout { limit });
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Simulator for ExternalSimulator {
    /// Returns stdout of a successful run; a non-zero exit is an error.
    fn simulate(&mut self, params: &SimulatorParams, trace: &Path) -> Result<String, SimulatorError> {
        let output = self.run(params, trace)?;
        if !output.status.success() {
            return Err(SimulatorError::Failed {
                code: output.status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

fn collect(reader: Option<JoinHandle<io::Result<String>>>) -> Result<String, SimulatorError> {
    match reader {
        Some(handle) => Ok(handle.join().map_err(|_| SimulatorError::OutputReader)??),
        None => Ok(String::new()),
    }
}
