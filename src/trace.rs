//! Trace construction: per-source injection schedules merged into one
//! chronologically ordered stream.

use crate::error::TraceError;
use crate::packet::{synthesize, Coordinate, DestinationPin, Dimension, InjectionTime, Packet};
use log::debug;
use noc_sweep_common::{
    packets_per_source, SimulatorParams, TimeNotation, TraceConfig, MAX_PACKETS_PER_SOURCE,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Shape of one synthetic workload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSpec {
    pub array_size: u32,
    pub dimension: Dimension,
    pub injection_rate: f64,
    /// Flits per packet.
    pub packet_size: u32,
    /// Last cycle at which a packet may be scheduled (before jitter).
    pub cycles: u64,
    pub add_jitter: bool,
    pub notation: TimeNotation,
}

impl TraceSpec {
    /// Combines the trace settings with the mesh shape of `params`.
    pub fn from_config(config: &TraceConfig, params: &SimulatorParams) -> Result<Self, TraceError> {
        let spec = TraceSpec {
            array_size: params.array_size,
            dimension: Dimension::try_from(params.dimension)?,
            injection_rate: config.injection_rate,
            packet_size: config.packet_size,
            cycles: config.cycles,
            add_jitter: config.add_jitter,
            notation: config.notation,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        if self.array_size == 0 {
            return Err(TraceError::InvalidArraySize(self.array_size));
        }
        if !(self.injection_rate > 0.0 && self.injection_rate.is_finite()) {
            return Err(TraceError::InvalidInjectionRate(self.injection_rate));
        }
        if self.packet_size == 0 {
            return Err(TraceError::InvalidPacketSize(self.packet_size));
        }
        if self.cycles < 1 {
            return Err(TraceError::InvalidCycles(self.cycles));
        }
        if packets_per_source(self.packet_size, self.injection_rate, self.cycles) > MAX_PACKETS_PER_SOURCE as f64 {
            return Err(TraceError::ScheduleTooDense {
                interval: self.interval(),
                limit: MAX_PACKETS_PER_SOURCE,
            });
        }
        Ok(())
    }

    /// Cycles between two consecutive injections from the same source.
    pub fn interval(&self) -> f64 {
        self.packet_size as f64 / self.injection_rate
    }

    /// Nominal injection times `1, 1 + interval, ...` up to and including `cycles`.
    pub fn nominal_times(&self) -> impl Iterator<Item = f64> {
        let interval = self.interval();
        let last = self.cycles as f64;
        (0u64..)
            .map(move |k| 1.0 + k as f64 * interval)
            .take_while(move |&t| t <= last)
    }
}

/// A complete workload: the global stream plus one stream per source.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub dimension: Dimension,
    /// All packets, ascending by injection time; ties keep input order.
    pub packets: Vec<Packet>,
    /// Packets grouped by source, each group ascending by injection time.
    pub per_source: BTreeMap<Coordinate, Vec<Packet>>,
}

impl Trace {
    /// Groups `packets` by source and sorts both views. Input order breaks ties.
    pub fn from_packets(dimension: Dimension, mut packets: Vec<Packet>) -> Self {
        let mut per_source: BTreeMap<Coordinate, Vec<Packet>> = BTreeMap::new();
        for packet in &packets {
            per_source.entry(packet.source).or_default().push(*packet);
        }
        for group in per_source.values_mut() {
            sort_by_time(group);
        }
        sort_by_time(&mut packets);
        Trace { dimension, packets, per_source }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

/// Stable ascending sort on the numeric injection time.
pub fn sort_by_time(packets: &mut [Packet]) {
    packets.sort_by(|a, b| a.time.value().total_cmp(&b.time.value()));
}

/// Builds the trace described by `spec`.
///
/// Each source gets its own generator seeded from one draw of `rng`, so a
/// seeded `rng` reproduces the trace exactly, jitter included.
pub fn build_trace<R: Rng>(spec: &TraceSpec, rng: &mut R) -> Result<Trace, TraceError> {
    spec.validate()?;
    let interval = spec.interval();

    let mut packets = Vec::new();
    let mut per_source = BTreeMap::new();
    for source in Coordinate::grid(spec.array_size, spec.dimension) {
        let mut source_rng = StdRng::seed_from_u64(rng.random());
        let mut source_packets = Vec::new();
        for nominal in spec.nominal_times() {
            let jitter = if spec.add_jitter {
                source_rng.random::<f64>() * interval
            } else {
                0.0
            };
            source_packets.push(synthesize(
                &mut source_rng,
                spec.array_size,
                nominal + jitter,
                source,
                DestinationPin::default(),
                spec.packet_size,
                spec.notation,
            )?);
        }
        sort_by_time(&mut source_packets);
        packets.extend_from_slice(&source_packets);
        per_source.insert(source, source_packets);
    }
    sort_by_time(&mut packets);

    debug!(
        "Built trace: {} sources, {} packets, interval {:.3} cycles",
        per_source.len(),
        packets.len(),
        interval
    );
    Ok(Trace { dimension: spec.dimension, packets, per_source })
}

/// Parses one trace line (`time sx sy [sz] dx dy [dz] size`).
/// `line` is the 1-based line number used in error messages.
pub fn parse_trace_line(line: usize, text: &str) -> Result<Packet, TraceError> {
    let malformed = |reason: String| TraceError::MalformedLine { line, reason };
    let fields: Vec<&str> = text.split_whitespace().collect();
    let dimension = match fields.len() {
        6 => Dimension::Two,
        8 => Dimension::Three,
        n => return Err(malformed(format!("expected 6 or 8 fields, found {}", n))),
    };

    let time_text = fields[0];
    let raw_time: f64 = time_text
        .parse()
        .map_err(|_| malformed(format!("invalid injection time '{}'", time_text)))?;
    if !raw_time.is_finite() || raw_time < 0.0 {
        return Err(malformed(format!("invalid injection time '{}'", time_text)));
    }
    let notation = if time_text.contains(['e', 'E']) {
        TimeNotation::Scientific
    } else {
        TimeNotation::Native
    };

    let numbers = fields[1..]
        .iter()
        .map(|field| {
            field
                .parse::<u32>()
                .map_err(|_| malformed(format!("'{}' is not a non-negative integer", field)))
        })
        .collect::<Result<Vec<u32>, TraceError>>()?;
    let (source, destination, size) = match dimension {
        Dimension::Two => (
            Coordinate::new_2d(numbers[0], numbers[1]),
            Coordinate::new_2d(numbers[2], numbers[3]),
            numbers[4],
        ),
        Dimension::Three => (
            Coordinate::new_3d(numbers[0], numbers[1], numbers[2]),
            Coordinate::new_3d(numbers[3], numbers[4], numbers[5]),
            numbers[6],
        ),
    };
    Ok(Packet { time: InjectionTime::new(raw_time, notation), source, destination, size })
}

/// Parses a whole trace file. Blank lines are skipped; mixing 2D and 3D
/// lines is an error.
pub fn parse_trace(text: &str) -> Result<Trace, TraceError> {
    let mut dimension = None;
    let mut packets = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let packet = parse_trace_line(idx + 1, raw)?;
        let packet_dimension = packet.source.dimension();
        match dimension {
            None => dimension = Some(packet_dimension),
            Some(d) if d != packet_dimension => {
                return Err(TraceError::MalformedLine {
                    line: idx + 1,
                    reason: "2D and 3D packets mixed in one trace".to_string(),
                })
            }
            Some(_) => {}
        }
        packets.push(packet);
    }
    Ok(Trace::from_packets(dimension.unwrap_or(Dimension::Two), packets))
}
