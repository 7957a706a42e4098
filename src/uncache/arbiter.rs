use super::types::{OrderClass, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    pub slot: SlotId,
    pub class: OrderClass,
}

/// Picks the one slot that drives the external channel this cycle.
///
/// An eligible ordered request always wins; the lowest index is taken if more than one claims
/// eligibility, which the head token should never allow.  Otherwise unordered requests share the
/// channel round-robin, and the pointer only moves past a slot whose request was accepted.
#[derive(Debug)]
pub struct BackendArbiter {
    num_slots: usize,
    rr_next: SlotId,
}

impl BackendArbiter {
    pub fn new(num_slots: usize) -> Self {
        Self { num_slots, rr_next: 0 }
    }

    pub fn select(&self, ordered: &[bool], unordered: &[bool]) -> Option<Grant> {
        debug_assert_eq!(ordered.len(), self.num_slots);
        debug_assert_eq!(unordered.len(), self.num_slots);
        debug_assert!(
            ordered.iter().filter(|&&want| want).count() <= 1,
            "more than one ordered request holds the head token"
        );

        if let Some(slot) = ordered.iter().position(|&want| want) {
            return Some(Grant { slot, class: OrderClass::Ordered });
        }

        (0..self.num_slots)
            .map(|offset| (self.rr_next + offset) % self.num_slots)
            .find(|&slot| unordered[slot])
            .map(|slot| Grant { slot, class: OrderClass::Unordered })
    }

    pub fn on_fire(&mut self, grant: Grant) {
        if grant.class == OrderClass::Unordered {
            self.rr_next = (grant.slot + 1) % self.num_slots;
        }
    }

    pub fn reset(&mut self) {
        self.rr_next = 0;
    }
}
