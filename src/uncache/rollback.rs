use serde::Serialize;

use super::request::RestartInfo;
use super::types::{need_flush, AgeKey, Flush, FlushLevel, LaneId};

/// A lane whose trackable load found no free slot this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RollbackCandidate {
    pub lane: LaneId,
    pub age: AgeKey,
    pub restart: RestartInfo,
}

/// Re-fetch directive for the front end: flush `age` and everything younger and restart at
/// `restart.pc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rollback {
    pub lane: LaneId,
    pub age: AgeKey,
    pub level: FlushLevel,
    pub restart: RestartInfo,
}

impl Rollback {
    pub fn as_flush(&self) -> Flush {
        Flush { age: self.age, level: self.level }
    }
}

impl From<RollbackCandidate> for Rollback {
    fn from(candidate: RollbackCandidate) -> Self {
        Self {
            lane: candidate.lane,
            age: candidate.age,
            level: FlushLevel::Itself,
            restart: candidate.restart,
        }
    }
}

/// Oldest valid candidate, found with a full pairwise comparison.  Lane order breaks ties,
/// which unique age keys should never need.
pub fn select_oldest(candidates: &[Option<RollbackCandidate>]) -> Option<RollbackCandidate> {
    let beats = |i: usize, j: usize| -> bool {
        match (&candidates[i], &candidates[j]) {
            (Some(a), Some(b)) => {
                if i < j {
                    !b.age.is_before(a.age)
                } else {
                    a.age.is_before(b.age)
                }
            }
            (Some(_), None) => true,
            (None, _) => false,
        }
    };
    (0..candidates.len())
        .find(|&i| {
            candidates[i].is_some() && (0..candidates.len()).filter(|&j| j != i).all(|j| beats(i, j))
        })
        .and_then(|i| candidates[i])
}

/// Elects one rollback per cycle and holds it for a cycle so it can be checked against the
/// flushes of the cycle it is emitted in and the two before.
///
/// A candidate rejected in cycle t is elected in t and emitted in t+1. It is dropped if the
/// flush of t+1, t or t-1 cancels it, which is why the last two flushes are kept.
#[derive(Debug, Default)]
pub struct RollbackSelector {
    staged: Option<RollbackCandidate>,
    last_flush: Option<Flush>,
    last_last_flush: Option<Flush>,
}

impl RollbackSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staged(&self) -> Option<&RollbackCandidate> {
        self.staged.as_ref()
    }

    fn already_flushed(&self, age: AgeKey, flush: Option<&Flush>) -> bool {
        need_flush(flush, age)
            || need_flush(self.last_flush.as_ref(), age)
            || need_flush(self.last_last_flush.as_ref(), age)
    }

    pub fn tick(
        &mut self,
        candidates: &[Option<RollbackCandidate>],
        flush: Option<&Flush>,
    ) -> Option<Rollback> {
        let emitted = self
            .staged
            .take()
            .filter(|candidate| !self.already_flushed(candidate.age, flush))
            .map(Rollback::from);

        self.staged = select_oldest(candidates);
        self.last_last_flush = self.last_flush;
        self.last_flush = flush.copied();
        emitted
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
