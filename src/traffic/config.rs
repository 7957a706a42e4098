use serde::Deserialize;

use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub seed: u64,
    /// Fresh loads each lane produces before it goes quiet.
    pub requests_per_lane: u32,
    /// Chance a lane with work left submits in a given cycle.
    pub issue_rate: f64,
    pub ordered_ratio: f64,
    pub cacheable_ratio: f64,
    pub fault_ratio: f64,
    pub replay_ratio: f64,
    /// Cycles between random front-end flushes; zero disables them.
    pub flush_period: u64,
    /// Chance a writeback consumer refuses a completion in a given cycle.
    pub consumer_stall_rate: f64,
    pub addr_base: u64,
    pub addr_span: u64,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            requests_per_lane: 64,
            issue_rate: 0.5,
            ordered_ratio: 0.25,
            cacheable_ratio: 0.1,
            fault_ratio: 0.02,
            replay_ratio: 0.02,
            flush_period: 0,
            consumer_stall_rate: 0.1,
            addr_base: 0x3000_0000,
            addr_span: 0x1_0000,
        }
    }
}
