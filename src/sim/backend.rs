use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::sim::config::Config;
use crate::timeq::{Backpressure, Cycle, ServerConfig, ServiceRequest, TimedServer};
use crate::uncache::{BackendRequest, BackendResponse};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub latency: Cycle,
    /// Extra latency drawn uniformly from `0..=jitter`; lets responses overtake each other.
    pub jitter: Cycle,
    pub max_inflight: usize,
    pub error_rate: f64,
    pub seed: u64,
}

impl Config for BackendConfig {}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            latency: 12,
            jitter: 4,
            max_inflight: 4,
            error_rate: 0.0,
            seed: 0,
        }
    }
}

/// Memory responder on the far side of the single external channel.  Accepts one request per
/// cycle, answers one per cycle, and never looks at cancellations.
pub struct BackendModel {
    server: TimedServer<BackendResponse>,
    rng: StdRng,
    jitter: Cycle,
    error_rate: f64,
}

impl BackendModel {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            server: TimedServer::new(ServerConfig {
                base_latency: config.latency,
                issue_interval: 1,
                queue_capacity: config.max_inflight.max(1),
            }),
            rng: StdRng::seed_from_u64(config.seed),
            jitter: config.jitter,
            error_rate: config.error_rate.clamp(0.0, 1.0),
        }
    }

    /// Beat returned for any load of the 8-byte word holding `addr`.
    pub fn data_for(addr: u64) -> u64 {
        mix64(addr & !0x7)
    }

    pub fn ready(&self, now: Cycle) -> bool {
        self.server.can_accept(now)
    }

    pub fn accept(&mut self, now: Cycle, request: &BackendRequest) -> Result<()> {
        let response = BackendResponse {
            tag: request.tag,
            data: Self::data_for(request.addr),
            error: self.error_rate > 0.0 && self.rng.gen_bool(self.error_rate),
        };
        let extra = if self.jitter > 0 {
            self.rng.gen_range(0..=self.jitter)
        } else {
            0
        };
        match self
            .server
            .try_enqueue(now, ServiceRequest::with_extra_latency(response, extra))
        {
            Ok(_) => Ok(()),
            Err(Backpressure::QueueFull { capacity, .. }) => {
                bail!("backend accepted slot {} with {} requests outstanding", request.tag, capacity)
            }
            Err(Backpressure::Busy { available_at, .. }) => {
                bail!("backend accepted slot {} before cycle {}", request.tag, available_at)
            }
        }
    }

    pub fn response(&mut self, now: Cycle) -> Option<BackendResponse> {
        self.server.pop_ready(now).map(|result| result.payload)
    }

    pub fn outstanding(&self) -> usize {
        self.server.outstanding()
    }

    pub fn reset(&mut self) {
        self.server.clear();
    }
}

fn mix64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uncache::MemCommand;

    fn request(tag: usize, addr: u64) -> BackendRequest {
        BackendRequest { addr, mask: 0xff, cmd: MemCommand::Read, tag, atomic: false }
    }

    #[test]
    fn answers_after_latency_with_tag() {
        let config = BackendConfig { latency: 3, jitter: 0, ..BackendConfig::default() };
        let mut backend = BackendModel::new(&config);
        assert!(backend.ready(0));
        backend.accept(0, &request(5, 0x1004)).unwrap();
        assert!(!backend.ready(0));
        assert!(backend.response(2).is_none());
        let resp = backend.response(3).unwrap();
        assert_eq!(5, resp.tag);
        assert_eq!(BackendModel::data_for(0x1000), resp.data);
        assert!(!resp.error);
    }

    #[test]
    fn full_backend_refuses() {
        let config = BackendConfig { latency: 10, jitter: 0, max_inflight: 1, ..BackendConfig::default() };
        let mut backend = BackendModel::new(&config);
        backend.accept(0, &request(0, 0)).unwrap();
        assert!(!backend.ready(1));
        assert!(backend.accept(1, &request(1, 8)).is_err());
    }

    #[test]
    fn error_rate_one_always_errors() {
        let config = BackendConfig { latency: 0, jitter: 0, error_rate: 1.0, ..BackendConfig::default() };
        let mut backend = BackendModel::new(&config);
        backend.accept(0, &request(1, 0x40)).unwrap();
        assert!(backend.response(0).unwrap().error);
    }
}
