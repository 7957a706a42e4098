use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::traffic::config::TrafficConfig;
use crate::uncache::{
    AgeKey, ExceptionSet, LoadCandidate, LoadWidth, MemClass, RestartInfo, SizeInfo,
};

const WIDTHS: [LoadWidth; 4] = [LoadWidth::Byte, LoadWidth::Half, LoadWidth::Word, LoadWidth::Double];

/// Seeded producer of load candidates for every lane.  Re-queued loads go out again before any
/// fresh ones and every submission gets a new age, so ages stay in program order.
pub struct TrafficGenerator {
    config: TrafficConfig,
    rng: StdRng,
    next_age: u64,
    next_lq_idx: u32,
    remaining: Vec<u32>,
    requeued: VecDeque<LoadCandidate>,
}

impl TrafficGenerator {
    pub fn new(config: TrafficConfig, num_lanes: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            remaining: vec![config.requests_per_lane; num_lanes],
            next_age: 1,
            next_lq_idx: 0,
            requeued: VecDeque::new(),
            config,
        }
    }

    /// Start over from the seed.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone(), self.remaining.len());
    }

    pub fn is_exhausted(&self) -> bool {
        self.requeued.is_empty() && self.remaining.iter().all(|&left| left == 0)
    }

    pub fn requeued(&self) -> usize {
        self.requeued.len()
    }

    /// Send these loads again later, oldest first.
    pub fn requeue(&mut self, loads: impl IntoIterator<Item = LoadCandidate>) {
        self.requeued.extend(loads);
    }

    fn take_age(&mut self) -> AgeKey {
        let age = AgeKey(self.next_age);
        self.next_age += 1;
        age
    }

    fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    fn fresh(&mut self) -> LoadCandidate {
        let width = WIDTHS[self.rng.gen_range(0..WIDTHS.len())];
        let span = self.config.addr_span.max(8);
        let offset = self.rng.gen_range(0..span) & !(width.bytes() as u64 - 1);
        let addr = self.config.addr_base.wrapping_add(offset);
        let class = if self.chance(self.config.cacheable_ratio) {
            MemClass::Cacheable
        } else if self.chance(self.config.ordered_ratio) {
            MemClass::Mmio
        } else {
            MemClass::Nc
        };
        let signed = width != LoadWidth::Double && self.rng.gen_bool(0.5);
        let mut candidate = LoadCandidate::new(AgeKey(0), addr, SizeInfo::new(width, signed), class);
        candidate.lq_idx = self.next_lq_idx;
        self.next_lq_idx = self.next_lq_idx.wrapping_add(1);
        if self.chance(self.config.fault_ratio) {
            candidate.exceptions = ExceptionSet::LOAD_PAGE_FAULT;
        }
        candidate.needs_replay = self.chance(self.config.replay_ratio);
        candidate.restart = RestartInfo {
            pc: 0x8000_0000 + 4 * u64::from(candidate.lq_idx),
            is_compressed: self.rng.gen_bool(0.25),
        };
        candidate
    }

    /// Submissions for one cycle, lane 0 first.
    pub fn next_cycle(&mut self) -> Vec<Option<LoadCandidate>> {
        let num_lanes = self.remaining.len();
        let mut lanes = Vec::with_capacity(num_lanes);
        for lane in 0..num_lanes {
            let candidate = if let Some(mut again) = self.requeued.pop_front() {
                again.needs_replay = false;
                Some(again)
            } else if self.remaining[lane] > 0 && self.chance(self.config.issue_rate) {
                self.remaining[lane] -= 1;
                Some(self.fresh())
            } else {
                None
            };
            lanes.push(candidate.map(|mut candidate| {
                candidate.age = self.take_age();
                candidate
            }));
        }
        lanes
    }

    pub fn flush_due(&self, now: u64) -> bool {
        self.config.flush_period > 0 && now > 0 && now % self.config.flush_period == 0
    }

    pub fn pick(&mut self, bound: usize) -> usize {
        if bound == 0 {
            0
        } else {
            self.rng.gen_range(0..bound)
        }
    }

    pub fn consumer_ready(&mut self) -> bool {
        !self.chance(self.config.consumer_stall_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ages_increase_in_lane_order() {
        let config = TrafficConfig { issue_rate: 1.0, requests_per_lane: 2, ..TrafficConfig::default() };
        let mut traffic = TrafficGenerator::new(config, 3);
        let mut last = AgeKey(0);
        for _ in 0..2 {
            for candidate in traffic.next_cycle().into_iter().flatten() {
                assert!(last.is_before(candidate.age));
                last = candidate.age;
            }
        }
        assert!(traffic.is_exhausted());
        assert!(traffic.next_cycle().iter().all(Option::is_none));
    }

    #[test]
    fn requeued_loads_go_first_with_new_age() {
        let config = TrafficConfig { issue_rate: 1.0, requests_per_lane: 1, ..TrafficConfig::default() };
        let mut traffic = TrafficGenerator::new(config, 1);
        let first = traffic.next_cycle()[0].clone().unwrap();
        traffic.requeue([first.clone()]);
        assert!(!traffic.is_exhausted());
        let again = traffic.next_cycle()[0].clone().unwrap();
        assert_eq!(first.addr, again.addr);
        assert!(first.age.is_before(again.age));
        assert!(!again.needs_replay);
        assert_eq!(0, traffic.requeued());
    }

    #[test]
    fn addresses_are_aligned_to_width() {
        let config = TrafficConfig { issue_rate: 1.0, requests_per_lane: 200, ..TrafficConfig::default() };
        let mut traffic = TrafficGenerator::new(config, 2);
        while !traffic.is_exhausted() {
            for candidate in traffic.next_cycle().into_iter().flatten() {
                assert_eq!(0, candidate.addr % candidate.size.width.bytes() as u64);
            }
        }
    }
}
