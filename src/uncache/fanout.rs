use super::types::SlotId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FanoutSelection {
    pub ordered: Option<SlotId>,
    /// One entry per unordered port.
    pub unordered: Vec<Option<SlotId>>,
}

/// Maps completed slots onto the writeback ports.
///
/// Ordered completions own a dedicated port.  Unordered slots are split into one group per
/// remaining port by `slot % ports`, and each port offers the lowest ready index of its group.
/// Nothing is stored between cycles, so a crowded group can keep its high indices waiting.
#[derive(Debug)]
pub struct WritebackFanout {
    num_slots: usize,
    unordered_ports: usize,
}

impl WritebackFanout {
    pub fn new(num_slots: usize, num_ports: usize) -> Self {
        assert!(num_ports >= 2, "need an ordered port and at least one unordered port");
        Self {
            num_slots,
            unordered_ports: num_ports - 1,
        }
    }

    pub fn unordered_ports(&self) -> usize {
        self.unordered_ports
    }

    pub fn partition(&self, slot: SlotId) -> usize {
        slot % self.unordered_ports
    }

    pub fn select(&self, ordered_ready: &[bool], unordered_ready: &[bool]) -> FanoutSelection {
        debug_assert_eq!(ordered_ready.len(), self.num_slots);
        debug_assert_eq!(unordered_ready.len(), self.num_slots);

        let ordered = ordered_ready.iter().position(|&ready| ready);
        let mut unordered = vec![None; self.unordered_ports];
        for slot in 0..self.num_slots {
            let port = &mut unordered[self.partition(slot)];
            if port.is_none() && unordered_ready[slot] {
                *port = Some(slot);
            }
        }
        FanoutSelection { ordered, unordered }
    }
}
