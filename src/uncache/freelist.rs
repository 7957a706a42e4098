use smallvec::SmallVec;

use super::types::SlotId;

pub type SlotList = SmallVec<[SlotId; 8]>;

/// Pool of free slot indices kept as a circular queue.
///
/// Allocation decisions for a cycle are taken against the pool as it stood at the start of the
/// cycle.  Frees requested during the cycle are parked in a pending mask and returned by
/// `commit`, at most `free_width` per cycle (lowest index first), so they only become
/// allocatable from the next cycle on.
#[derive(Debug)]
pub struct FreeList {
    ring: Vec<SlotId>,
    head: usize,
    tail: usize,
    free_count: usize,
    free_width: usize,
    allocated: Vec<bool>,
    pending_free: Vec<bool>,
    allocs_this_cycle: usize,
}

impl FreeList {
    pub fn new(size: usize, free_width: usize) -> Self {
        assert!(size > 0, "free list needs at least one slot");
        assert!(free_width > 0, "free_width must be > 0");
        Self {
            ring: (0..size).collect(),
            head: 0,
            tail: 0,
            free_count: size,
            free_width,
            allocated: vec![false; size],
            pending_free: vec![false; size],
            allocs_this_cycle: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.ring.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Slots not in the pool, including those whose free is still pending.
    pub fn occupancy(&self) -> usize {
        self.size() - self.free_count
    }

    /// No slot left to hand out.
    pub fn is_exhausted(&self) -> bool {
        self.free_count == 0
    }

    /// Whether the request ranked `prefix` among this cycle's allocations can be served.
    pub fn can_allocate(&self, prefix: usize) -> bool {
        prefix < self.free_count
    }

    pub fn allocate_slot(&self, prefix: usize) -> Option<SlotId> {
        self.can_allocate(prefix)
            .then(|| self.ring[(self.head + prefix) % self.size()])
    }

    /// Take the first `count` slots offered by `allocate_slot` this cycle.
    pub fn do_allocate(&mut self, count: usize) {
        assert!(
            count <= self.free_count,
            "allocating {} slots with only {} free",
            count,
            self.free_count
        );
        for prefix in 0..count {
            let slot = self.ring[(self.head + prefix) % self.size()];
            assert!(!self.allocated[slot], "slot {} handed out twice", slot);
            self.allocated[slot] = true;
        }
        self.allocs_this_cycle = count;
    }

    pub fn free(&mut self, slot: SlotId) {
        assert!(self.allocated[slot], "freeing slot {} that was never allocated", slot);
        assert!(!self.pending_free[slot], "slot {} freed twice", slot);
        self.pending_free[slot] = true;
    }

    /// Close the cycle: retire this cycle's allocations and return up to `free_width` pending
    /// frees to the pool.  Returns the reclaimed slots.
    pub fn commit(&mut self) -> SlotList {
        let size = self.size();
        self.head = (self.head + self.allocs_this_cycle) % size;
        self.free_count -= self.allocs_this_cycle;
        self.allocs_this_cycle = 0;

        let mut reclaimed = SlotList::new();
        for slot in 0..size {
            if reclaimed.len() >= self.free_width {
                break;
            }
            if self.pending_free[slot] {
                self.pending_free[slot] = false;
                self.allocated[slot] = false;
                self.ring[self.tail] = slot;
                self.tail = (self.tail + 1) % size;
                reclaimed.push(slot);
            }
        }
        self.free_count += reclaimed.len();
        debug_assert_eq!(
            self.free_count + self.allocated.iter().filter(|&&a| a).count(),
            size,
            "free list lost track of a slot"
        );
        reclaimed
    }

    pub fn reset(&mut self) {
        let size = self.size();
        self.ring = (0..size).collect();
        self.head = 0;
        self.tail = 0;
        self.free_count = size;
        self.allocated.iter_mut().for_each(|a| *a = false);
        self.pending_free.iter_mut().for_each(|p| *p = false);
        self.allocs_this_cycle = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::FreeList;

    #[test]
    fn allocations_follow_prefix_order() {
        let mut list = FreeList::new(4, 4);
        assert_eq!(Some(0), list.allocate_slot(0));
        assert_eq!(Some(1), list.allocate_slot(1));
        list.do_allocate(2);
        assert!(list.commit().is_empty());
        assert_eq!(2, list.occupancy());
        assert_eq!(Some(2), list.allocate_slot(0));
    }
}
