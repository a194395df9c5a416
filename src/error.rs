//! Error types for trace generation, report decoding and simulator invocation.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Precondition violations and trace-file parse failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraceError {
    #[error("array size must be a positive integer, got {0}")]
    InvalidArraySize(u32),

    #[error("injection rate must be a positive finite number, got {0}")]
    InvalidInjectionRate(f64),

    #[error("packet size must be a positive integer, got {0}")]
    InvalidPacketSize(u32),

    #[error("simulation must run for at least one cycle, got {0}")]
    InvalidCycles(u64),

    #[error("interval of {interval} cycles schedules more than {limit} packets per source")]
    ScheduleTooDense { interval: f64, limit: u64 },

    #[error("dimension must be 2 or 3, got {0}")]
    InvalidDimension(u32),

    #[error("malformed trace line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
}

/// The simulator report did not match the fixed layout.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedReportError {
    #[error("report segment '{segment}' not found")]
    MissingSegment { segment: &'static str },

    #[error("field '{field}' holds '{text}', which is not a valid number")]
    InvalidNumber { field: &'static str, text: String },

    #[error("report lists zero incoming packets; completion rate is undefined")]
    ZeroTotalPackets,
}

#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("failed to launch simulator '{}': {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error while talking to the simulator: {0}")]
    Io(#[from] io::Error),

    #[error("simulator did not finish within {limit:?} and was killed")]
    Timeout { limit: Duration },

    #[error("simulator exited with {}: {stderr}", describe_exit(.code))]
    Failed { code: Option<i32>, stderr: String },

    #[error("simulator output reader thread panicked")]
    OutputReader,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("{values} independent values but {reports} reports")]
    LengthMismatch { values: usize, reports: usize },
}
