use serde::{Deserialize, Serialize};

/// The end-of-run summary printed by one simulator invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    /// Packets injected into the network ("Incoming packets").
    pub total_packets: u64,
    /// Packets that reached their destination before the run ended.
    pub finished_packets: u64,
    pub avg_delay: f64,
    pub mem_power: f64,
    pub crossbar_power: f64,
    pub arbiter_power: f64,
    pub link_power: f64,
    pub total_power: f64,
}

impl SimulationReport {
    /// Percentage of injected packets that finished.
    ///
    /// Decoded reports always carry a non-zero `total_packets`.
    pub fn completion_rate(&self) -> f64 {
        self.finished_packets as f64 / self.total_packets as f64 * 100.0
    }

    /// Every exported metric, named and ordered as in [`METRIC_NAMES`](crate::series::METRIC_NAMES).
    pub fn metrics(&self) -> [(&'static str, f64); 9] {
        [
            ("total_packets", self.total_packets as f64),
            ("finished_packets", self.finished_packets as f64),
            ("completion_rate", self.completion_rate()),
            ("avg_delay", self.avg_delay),
            ("mem_power", self.mem_power),
            ("crossbar_power", self.crossbar_power),
            ("arbiter_power", self.arbiter_power),
            ("link_power", self.link_power),
            ("total_power", self.total_power),
        ]
    }
}
