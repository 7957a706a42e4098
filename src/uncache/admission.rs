use serde::Serialize;

use super::request::{LoadCandidate, Request, RestartInfo};
use super::types::{need_flush, ExceptionSet, Flush, SlotId};

/// Why a lane's candidate never competed for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterReason {
    Cancelled,
    Exception,
    Replay,
    Cacheable,
}

/// What happened to a lane's stage-2 candidate this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnqueueOutcome {
    Allocated(SlotId),
    /// Trackable but no slot was free; a rollback candidate.
    Rejected,
    Filtered(FilterReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LaneStage {
    Empty,
    Filtered(FilterReason),
    /// Wants a slot; `prefix` counts the enqueuing lanes ahead of this one.
    Enqueue {
        request: Request,
        restart: RestartInfo,
        prefix: usize,
    },
}

#[derive(Debug, Clone)]
struct Staged {
    candidate: LoadCandidate,
    cancelled: bool,
}

/// Two-stage per-lane pipeline in front of the free list.  A candidate is checked against the
/// flush of the cycle it arrives in and again against the flush of the cycle after.
#[derive(Debug)]
pub struct AdmissionFilter {
    stage2: Vec<Option<Staged>>,
}

impl AdmissionFilter {
    pub fn new(num_lanes: usize) -> Self {
        Self {
            stage2: vec![None; num_lanes],
        }
    }

    pub fn num_lanes(&self) -> usize {
        self.stage2.len()
    }

    pub fn is_idle(&self) -> bool {
        self.stage2.iter().all(Option::is_none)
    }

    fn judge(staged: &Staged, flush: Option<&Flush>) -> Result<Request, FilterReason> {
        let candidate = &staged.candidate;
        if staged.cancelled || need_flush(flush, candidate.age) {
            return Err(FilterReason::Cancelled);
        }
        if candidate.exceptions.intersects(ExceptionSet::LOAD_UNIT) {
            return Err(FilterReason::Exception);
        }
        if candidate.needs_replay {
            return Err(FilterReason::Replay);
        }
        Request::from_candidate(candidate).ok_or(FilterReason::Cacheable)
    }

    /// Stage-2 decisions for this cycle, lane 0 first.
    pub fn evaluate(&self, flush: Option<&Flush>) -> Vec<LaneStage> {
        let mut prefix = 0;
        self.stage2
            .iter()
            .map(|slot| match slot {
                None => LaneStage::Empty,
                Some(staged) => match Self::judge(staged, flush) {
                    Ok(request) => {
                        let stage = LaneStage::Enqueue {
                            request,
                            restart: staged.candidate.restart,
                            prefix,
                        };
                        prefix += 1;
                        stage
                    }
                    Err(reason) => LaneStage::Filtered(reason),
                },
            })
            .collect()
    }

    /// Move this cycle's submissions into stage 2.
    pub fn advance(&mut self, incoming: &[Option<LoadCandidate>], flush: Option<&Flush>) {
        for (lane, reg) in self.stage2.iter_mut().enumerate() {
            *reg = incoming.get(lane).cloned().flatten().map(|candidate| Staged {
                cancelled: need_flush(flush, candidate.age),
                candidate,
            });
        }
    }

    pub fn reset(&mut self) {
        self.stage2.iter_mut().for_each(|reg| *reg = None);
    }
}
