//! Writing traces in the simulator's input layout, and reading them back.

use crate::packet::{Coordinate, Dimension, Packet};
use crate::trace::{parse_trace, Trace};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Attempts at wiping and recreating the trace directory before giving up.
const RESET_ATTEMPTS: usize = 3;

/// Paths written for one trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFiles {
    /// File holding every packet; this is what the simulator is pointed at.
    pub combined: PathBuf,
    pub per_source: Vec<PathBuf>,
}

/// Replaces the contents of `dir` with `trace`: one `<base>.<x>.<y>[.<z>]`
/// file per source plus the combined `<base>` file.
///
/// The directory is deleted first. Callers must not share `dir` between
/// concurrent builds.
pub fn materialize(trace: &Trace, dir: &Path, base_name: &str) -> Result<TraceFiles> {
    reset_directory(dir)?;

    let mut per_source = Vec::with_capacity(trace.per_source.len());
    for (source, packets) in &trace.per_source {
        let path = source_path(dir, base_name, source);
        write_packets(&path, packets)?;
        per_source.push(path);
    }

    let combined = dir.join(base_name);
    write_packets(&combined, &trace.packets)?;
    debug!(
        "Wrote {} packets to {} and {} per-source files",
        trace.len(),
        combined.display(),
        per_source.len()
    );
    Ok(TraceFiles { combined, per_source })
}

/// Reads a trace file written by [`materialize`] (or any file in the same layout).
pub fn read_trace(path: &Path) -> Result<Trace> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file '{}'", path.display()))?;
    parse_trace(&text).with_context(|| format!("Failed to parse trace file '{}'", path.display()))
}

/// Splits an existing combined trace into per-source files next to it.
///
/// Every coordinate of the grid spanned by the trace (largest address seen on
/// each axis, sources and destinations alike) gets a file, even when it sends
/// nothing. The combined file itself is left untouched.
pub fn split_trace(combined: &Path) -> Result<TraceFiles> {
    let trace = read_trace(combined)?;
    let dir = combined.parent().unwrap_or_else(|| Path::new("."));
    let base_name = combined
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("'{}' does not name a trace file", combined.display()))?;

    let mut per_source = Vec::new();
    for source in spanned_grid(&trace) {
        let path = source_path(dir, base_name, &source);
        let packets = trace.per_source.get(&source).map(Vec::as_slice).unwrap_or_default();
        write_packets(&path, packets)?;
        per_source.push(path);
    }
    info!(
        "Split {} packets from {} into {} per-source files",
        trace.len(),
        combined.display(),
        per_source.len()
    );
    Ok(TraceFiles { combined: combined.to_path_buf(), per_source })
}

fn spanned_grid(trace: &Trace) -> Vec<Coordinate> {
    let mut max = [0u32; 3];
    for packet in &trace.packets {
        for coord in [packet.source, packet.destination] {
            max[0] = max[0].max(coord.x);
            max[1] = max[1].max(coord.y);
            max[2] = max[2].max(coord.z.unwrap_or(0));
        }
    }
    let mut grid = Vec::new();
    for x in 0..=max[0] {
        for y in 0..=max[1] {
            match trace.dimension {
                Dimension::Two => grid.push(Coordinate::new_2d(x, y)),
                Dimension::Three => grid.extend((0..=max[2]).map(|z| Coordinate::new_3d(x, y, z))),
            }
        }
    }
    grid
}

fn source_path(dir: &Path, base_name: &str, source: &Coordinate) -> PathBuf {
    dir.join(format!("{}.{}", base_name, source.file_suffix()))
}

/// Newline-separated packet lines with a trailing newline. An empty list
/// still produces a single newline.
fn write_packets(path: &Path, packets: &[Packet]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create trace file '{}'", path.display()))?;
    write_lines(BufWriter::new(file), packets)
        .with_context(|| format!("Failed to write trace file '{}'", path.display()))
}

fn write_lines<W: Write>(mut writer: W, packets: &[Packet]) -> io::Result<()> {
    if packets.is_empty() {
        writeln!(writer)?;
    }
    for packet in packets {
        writeln!(writer, "{}", packet)?;
    }
    writer.flush()
}

/// Deletes and recreates `dir`, retrying from a clean state when an earlier
/// (possibly interrupted) run left it half removed.
fn reset_directory(dir: &Path) -> Result<()> {
    if dir.file_name().is_none() {
        anyhow::bail!("Refusing to wipe '{}' as a trace directory", dir.display());
    }
    let mut attempt = 1;
    loop {
        match try_reset(dir) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < RESET_ATTEMPTS => {
                warn!(
                    "Resetting trace directory '{}' failed (attempt {}/{}): {}. Retrying.",
                    dir.display(),
                    attempt,
                    RESET_ATTEMPTS,
                    e
                );
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to reset trace directory '{}'", dir.display())
                })
            }
        }
    }
}

fn try_reset(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::InjectionTime;
    use noc_sweep_common::TimeNotation;

    fn packet(time: f64, source: Coordinate, destination: Coordinate) -> Packet {
        Packet {
            time: InjectionTime::new(time, TimeNotation::Native),
            source,
            destination,
            size: 5,
        }
    }

    #[test]
    fn materialize_replaces_directory_contents() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("trace");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("stale"), "old").expect("write stale file");

        let trace = Trace::from_packets(
            Dimension::Two,
            vec![
                packet(3.0, Coordinate::new_2d(0, 0), Coordinate::new_2d(1, 1)),
                packet(1.5, Coordinate::new_2d(0, 0), Coordinate::new_2d(0, 1)),
                packet(2.0, Coordinate::new_2d(0, 1), Coordinate::new_2d(0, 0)),
            ],
        );
        let files = materialize(&trace, &dir, "bench").expect("materialize");

        assert!(!dir.join("stale").exists());
        assert_eq!(files.combined, dir.join("bench"));
        assert_eq!(files.per_source, vec![dir.join("bench.0.0"), dir.join("bench.0.1")]);
        assert_eq!(
            fs::read_to_string(dir.join("bench")).expect("combined"),
            "1.5 0 0 0 1 5\n2 0 1 0 0 5\n3 0 0 1 1 5\n"
        );
        assert_eq!(
            fs::read_to_string(dir.join("bench.0.0")).expect("source file"),
            "1.5 0 0 0 1 5\n3 0 0 1 1 5\n"
        );
    }

    #[test]
    fn refuses_to_wipe_root() {
        let trace = Trace::from_packets(Dimension::Two, Vec::new());
        assert!(materialize(&trace, Path::new("/"), "bench").is_err());
    }

    #[test]
    fn reset_gives_up_after_retries() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("trace");
        fs::write(&dir, "not a directory").expect("write file");

        let trace = Trace::from_packets(
            Dimension::Two,
            vec![packet(1.0, Coordinate::new_2d(0, 0), Coordinate::new_2d(0, 1))],
        );
        let err = materialize(&trace, &dir, "bench").unwrap_err();
        assert!(err.to_string().starts_with("Failed to reset trace directory"), "{:#}", err);
        assert_eq!(fs::read_to_string(&dir).expect("file left alone"), "not a directory");
    }

    #[test]
    fn split_fills_the_spanned_grid() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let combined = tmp.path().join("bench");
        fs::write(&combined, "4 1 0 0 0 5\n1 1 0 1 1 5\n2 0 0 1 0 5\n").expect("write trace");

        let files = split_trace(&combined).expect("split");
        assert_eq!(files.per_source.len(), 4);
        assert_eq!(
            fs::read_to_string(tmp.path().join("bench.1.0")).expect("source file"),
            "1 1 0 1 1 5\n4 1 0 0 0 5\n"
        );
        assert_eq!(fs::read_to_string(tmp.path().join("bench.0.1")).expect("empty source"), "\n");
        assert_eq!(
            fs::read_to_string(&combined).expect("combined untouched"),
            "4 1 0 0 0 5\n1 1 0 1 1 5\n2 0 0 1 0 5\n"
        );
    }
}
