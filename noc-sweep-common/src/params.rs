use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the flags the external interconnect simulator accepts.
///
/// The declaration order is the order the flags are passed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    ArraySize,
    Dimension,
    #[serde(alias = "channel")]
    VirtualChannels,
    #[serde(alias = "i_buffer")]
    InputBuffer,
    #[serde(alias = "o_buffer")]
    OutputBuffer,
    FlitSize,
    LinkLength,
    Cycles,
    Seed,
    #[serde(alias = "algo")]
    RoutingAlgorithm,
}

impl ParamKey {
    pub const ALL: [ParamKey; 10] = [
        ParamKey::ArraySize,
        ParamKey::Dimension,
        ParamKey::VirtualChannels,
        ParamKey::InputBuffer,
        ParamKey::OutputBuffer,
        ParamKey::FlitSize,
        ParamKey::LinkLength,
        ParamKey::Cycles,
        ParamKey::Seed,
        ParamKey::RoutingAlgorithm,
    ];

    /// Command-line flag understood by the simulator.
    pub fn flag(self) -> &'static str {
        match self {
            ParamKey::ArraySize => "-A",
            ParamKey::Dimension => "-c",
            ParamKey::VirtualChannels => "-V",
            ParamKey::InputBuffer => "-B",
            ParamKey::OutputBuffer => "-O",
            ParamKey::FlitSize => "-F",
            ParamKey::LinkLength => "-L",
            ParamKey::Cycles => "-T",
            ParamKey::Seed => "-r",
            ParamKey::RoutingAlgorithm => "-R",
        }
    }

    /// Snake-case name, identical to the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            ParamKey::ArraySize => "array_size",
            ParamKey::Dimension => "dimension",
            ParamKey::VirtualChannels => "virtual_channels",
            ParamKey::InputBuffer => "input_buffer",
            ParamKey::OutputBuffer => "output_buffer",
            ParamKey::FlitSize => "flit_size",
            ParamKey::LinkLength => "link_length",
            ParamKey::Cycles => "cycles",
            ParamKey::Seed => "seed",
            ParamKey::RoutingAlgorithm => "routing_algorithm",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ParamKey::ArraySize => "array size, the size of the network in each dimension.",
            ParamKey::Dimension => "cube dimension, WARNING: 3D is not supported yet.",
            ParamKey::VirtualChannels => "virtual channel number",
            ParamKey::InputBuffer => "input buffer size",
            ParamKey::OutputBuffer => "output buffer size",
            ParamKey::FlitSize => "flit size (64-bit)",
            ParamKey::LinkLength => "link length in um",
            ParamKey::Cycles => "simulation cycles",
            ParamKey::Seed => "random seed",
            ParamKey::RoutingAlgorithm => "routing algorithm: 0-dimension 1-opty",
        }
    }

    /// Plot label: the first clause of the description followed by the flag,
    /// e.g. `array size [-A]`.
    pub fn axis_title(self) -> String {
        let head = self
            .description()
            .split(':')
            .next()
            .and_then(|s| s.split('(').next())
            .and_then(|s| s.split(',').next())
            .unwrap_or_default()
            .trim();
        format!("{} [{}]", head, self.flag())
    }

    /// Whether changing this parameter changes the shape of the trace itself
    /// (and therefore requires regenerating it).
    pub fn shapes_trace(self) -> bool {
        matches!(self, ParamKey::ArraySize | ParamKey::Dimension)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Values for every simulator flag. Treated as an immutable value: sweeps derive
/// per-point copies with [`SimulatorParams::with`] instead of mutating a shared table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorParams {
    pub array_size: u32,
    pub dimension: u32,
    #[serde(alias = "channel")]
    pub virtual_channels: u32,
    #[serde(alias = "i_buffer")]
    pub input_buffer: u32,
    #[serde(alias = "o_buffer")]
    pub output_buffer: u32,
    /// Flit size in 64-bit units.
    pub flit_size: u32,
    /// Link length in um.
    pub link_length: u32,
    pub cycles: u32,
    pub seed: u32,
    /// 0 = dimension-order routing, 1 = alternate.
    #[serde(alias = "algo")]
    pub routing_algorithm: u32,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        SimulatorParams {
            array_size: 9,
            dimension: 2,
            virtual_channels: 3,
            input_buffer: 12,
            output_buffer: 12,
            flit_size: 4,
            link_length: 1000,
            cycles: 20000,
            seed: 1,
            routing_algorithm: 0,
        }
    }
}

impl SimulatorParams {
    pub fn get(&self, key: ParamKey) -> u32 {
        match key {
            ParamKey::ArraySize => self.array_size,
            ParamKey::Dimension => self.dimension,
            ParamKey::VirtualChannels => self.virtual_channels,
            ParamKey::InputBuffer => self.input_buffer,
            ParamKey::OutputBuffer => self.output_buffer,
            ParamKey::FlitSize => self.flit_size,
            ParamKey::LinkLength => self.link_length,
            ParamKey::Cycles => self.cycles,
            ParamKey::Seed => self.seed,
            ParamKey::RoutingAlgorithm => self.routing_algorithm,
        }
    }

    /// Returns a copy with one parameter overridden.
    pub fn with(mut self, key: ParamKey, value: u32) -> Self {
        let slot = match key {
            ParamKey::ArraySize => &mut self.array_size,
            ParamKey::Dimension => &mut self.dimension,
            ParamKey::VirtualChannels => &mut self.virtual_channels,
            ParamKey::InputBuffer => &mut self.input_buffer,
            ParamKey::OutputBuffer => &mut self.output_buffer,
            ParamKey::FlitSize => &mut self.flit_size,
            ParamKey::LinkLength => &mut self.link_length,
            ParamKey::Cycles => &mut self.cycles,
            ParamKey::Seed => &mut self.seed,
            ParamKey::RoutingAlgorithm => &mut self.routing_algorithm,
        };
        *slot = value;
        self
    }

    /// Flag/value pairs in declaration order, ready to hand to `Command::args`.
    pub fn to_args(&self) -> Vec<String> {
        ParamKey::ALL
            .iter()
            .flat_map(|&key| [key.flag().to_string(), self.get(key).to_string()])
            .collect()
    }
}

/// A declared simulator flag together with the values one sweep axis visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParameter {
    pub key: ParamKey,
    pub description: String,
    pub default: u32,
    pub range: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_follow_declaration_order() {
        let args = SimulatorParams::default().to_args();
        assert_eq!(
            args,
            vec![
                "-A", "9", "-c", "2", "-V", "3", "-B", "12", "-O", "12", "-F", "4", "-L", "1000",
                "-T", "20000", "-r", "1", "-R", "0",
            ]
        );
    }

    #[test]
    fn with_overrides_only_one_field() {
        let defaults = SimulatorParams::default();
        let changed = defaults.with(ParamKey::LinkLength, 300);
        assert_eq!(changed.link_length, 300);
        assert_eq!(changed.with(ParamKey::LinkLength, 1000), defaults);
        assert_eq!(defaults.link_length, 1000);
    }

    #[test]
    fn axis_titles_use_first_clause() {
        assert_eq!(ParamKey::ArraySize.axis_title(), "array size [-A]");
        assert_eq!(ParamKey::FlitSize.axis_title(), "flit size [-F]");
        assert_eq!(ParamKey::RoutingAlgorithm.axis_title(), "routing algorithm [-R]");
        assert_eq!(ParamKey::VirtualChannels.axis_title(), "virtual channel number [-V]");
    }
}
