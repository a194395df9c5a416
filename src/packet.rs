//! Packet descriptors and the packet synthesizer.

use crate::error::TraceError;
use noc_sweep_common::TimeNotation;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of axes of the router mesh. Fixed for a whole trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Two,
    Three,
}

impl Dimension {
    pub fn axes(self) -> u32 {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }
}

impl TryFrom<u32> for Dimension {
    type Error = TraceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Dimension::Two),
            3 => Ok(Dimension::Three),
            other => Err(TraceError::InvalidDimension(other)),
        }
    }
}

/// Router address. `z` is present exactly when the mesh is 3D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
    pub z: Option<u32>,
}

impl Coordinate {
    pub fn new_2d(x: u32, y: u32) -> Self {
        Coordinate { x, y, z: None }
    }

    pub fn new_3d(x: u32, y: u32, z: u32) -> Self {
        Coordinate { x, y, z: Some(z) }
    }

    pub fn dimension(&self) -> Dimension {
        if self.z.is_some() {
            Dimension::Three
        } else {
            Dimension::Two
        }
    }

    /// Every coordinate of an `array_size`-wide grid, x-major then y then z.
    pub fn grid(array_size: u32, dimension: Dimension) -> Vec<Coordinate> {
        let mut coords = Vec::with_capacity((array_size as usize).pow(dimension.axes()));
        for x in 0..array_size {
            for y in 0..array_size {
                match dimension {
                    Dimension::Two => coords.push(Coordinate::new_2d(x, y)),
                    Dimension::Three => {
                        coords.extend((0..array_size).map(|z| Coordinate::new_3d(x, y, z)))
                    }
                }
            }
        }
        coords
    }

    /// File-name suffix used for per-source traces: `x.y` or `x.y.z`.
    pub fn file_suffix(&self) -> String {
        match self.z {
            Some(z) => format!("{}.{}.{}", self.x, self.y, z),
            None => format!("{}.{}", self.x, self.y),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.z {
            Some(z) => write!(f, "{} {} {}", self.x, self.y, z),
            None => write!(f, "{} {}", self.x, self.y),
        }
    }
}

/// Injection time as it appears in a trace file.
///
/// `value` is always the numeric value of the rendered text, so ordering by
/// `value` is the same as ordering by the parsed text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InjectionTime {
    value: f64,
    notation: TimeNotation,
}

impl InjectionTime {
    pub fn new(raw: f64, notation: TimeNotation) -> Self {
        let value = match notation {
            TimeNotation::Native => raw,
            TimeNotation::Cycle => raw.trunc(),
            TimeNotation::Scientific => format_scientific(raw).parse().unwrap_or(raw),
        };
        InjectionTime { value, notation }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn notation(&self) -> TimeNotation {
        self.notation
    }
}

impl fmt::Display for InjectionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.notation {
            TimeNotation::Native => write!(f, "{}", self.value),
            TimeNotation::Cycle => write!(f, "{}", self.value as u64),
            TimeNotation::Scientific => f.write_str(&format_scientific(self.value)),
        }
    }
}

/// Formats `value` with four fractional mantissa digits and a signed,
/// at least two-digit exponent: `12.34567` becomes `1.2346e+01`.
pub fn format_scientific(value: f64) -> String {
    let rendered = format!("{:.4e}", value);
    match rendered.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{}e{}{:02}", mantissa, sign, exp.abs())
            }
            Err(_) => rendered,
        },
        None => rendered,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub time: InjectionTime,
    pub source: Coordinate,
    pub destination: Coordinate,
    /// Packet length in flits.
    pub size: u32,
}

impl fmt::Display for Packet {
    /// One trace line: `time sx sy [sz] dx dy [dz] size`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.time, self.source, self.destination, self.size)
    }
}

/// Destination axes fixed by the caller; unpinned axes are drawn uniformly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestinationPin {
    pub x: Option<u32>,
    pub y: Option<u32>,
    pub z: Option<u32>,
}

/// Produces one packet injected by `source` at `time`.
///
/// The dimension follows the source: a pinned `z` is dropped for 2D sources.
/// Destinations may coincide with the source.
pub fn synthesize<R: Rng>(
    rng: &mut R,
    array_size: u32,
    time: f64,
    source: Coordinate,
    pin: DestinationPin,
    packet_size: u32,
    notation: TimeNotation,
) -> Result<Packet, TraceError> {
    if array_size == 0 {
        return Err(TraceError::InvalidArraySize(array_size));
    }
    let x = pin.x.unwrap_or_else(|| rng.random_range(0..array_size));
    let y = pin.y.unwrap_or_else(|| rng.random_range(0..array_size));
    let z = match source.dimension() {
        Dimension::Two => None,
        Dimension::Three => Some(pin.z.unwrap_or_else(|| rng.random_range(0..array_size))),
    };
    Ok(Packet {
        time: InjectionTime::new(time, notation),
        source,
        destination: Coordinate { x, y, z },
        size: packet_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn scientific_matches_printf_style() {
        assert_eq!(format_scientific(12.345678), "1.2346e+01");
        assert_eq!(format_scientific(1.0), "1.0000e+00");
        assert_eq!(format_scientific(0.00123), "1.2300e-03");
        assert_eq!(format_scientific(20001.0), "2.0001e+04");
        assert_eq!(format_scientific(1.5e123), "1.5000e+123");
    }

    #[test]
    fn injection_time_value_matches_text() {
        let t = InjectionTime::new(12.345678, TimeNotation::Scientific);
        assert_eq!(t.to_string(), "1.2346e+01");
        assert_eq!(t.value(), 12.346);

        let t = InjectionTime::new(51.0, TimeNotation::Native);
        assert_eq!(t.to_string(), "51");
        let t = InjectionTime::new(51.75, TimeNotation::Native);
        assert_eq!(t.to_string(), "51.75");

        let t = InjectionTime::new(51.75, TimeNotation::Cycle);
        assert_eq!(t.to_string(), "51");
        assert_eq!(t.value(), 51.0);
    }

    #[test]
    fn pinned_axes_are_honoured() {
        let mut rng = StdRng::seed_from_u64(7);
        let pin = DestinationPin { x: Some(3), y: None, z: Some(1) };
        for _ in 0..50 {
            let packet = synthesize(
                &mut rng,
                4,
                10.0,
                Coordinate::new_3d(0, 1, 2),
                pin,
                5,
                TimeNotation::Native,
            )
            .expect("valid array size");
            assert_eq!(packet.destination.x, 3);
            assert!(packet.destination.y < 4);
            assert_eq!(packet.destination.z, Some(1));
        }
    }

    #[test]
    fn pinned_z_is_dropped_for_2d_sources() {
        let mut rng = StdRng::seed_from_u64(7);
        let pin = DestinationPin { z: Some(2), ..Default::default() };
        let packet = synthesize(&mut rng, 3, 1.0, Coordinate::new_2d(1, 1), pin, 5, TimeNotation::Native)
            .expect("valid array size");
        assert_eq!(packet.destination.z, None);
        assert_eq!(packet.to_string().split(' ').count(), 6);
    }

    #[test]
    fn zero_array_size_is_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let err = synthesize(
            &mut rng,
            0,
            1.0,
            Coordinate::new_2d(0, 0),
            DestinationPin::default(),
            5,
            TimeNotation::Native,
        )
        .unwrap_err();
        assert_eq!(err, TraceError::InvalidArraySize(0));
    }

    #[test]
    fn line_layout_3d() {
        let packet = Packet {
            time: InjectionTime::new(3.0, TimeNotation::Native),
            source: Coordinate::new_3d(0, 1, 2),
            destination: Coordinate::new_3d(2, 1, 0),
            size: 5,
        };
        assert_eq!(packet.to_string(), "3 0 1 2 2 1 0 5");
    }

    #[test]
    fn grid_enumerates_in_source_order() {
        let grid = Coordinate::grid(2, Dimension::Two);
        assert_eq!(
            grid,
            vec![
                Coordinate::new_2d(0, 0),
                Coordinate::new_2d(0, 1),
                Coordinate::new_2d(1, 0),
                Coordinate::new_2d(1, 1),
            ]
        );
        assert_eq!(Coordinate::grid(3, Dimension::Three).len(), 27);
        let mut sorted = grid.clone();
        sorted.sort();
        assert_eq!(sorted, grid);
    }
}
