use std::collections::BTreeMap;

use crate::uncache::{AgeKey, Flush, LoadCandidate, MemClass};

/// Stand-in for the commit tracker: remembers every submitted load until it is written back,
/// filtered out, or flushed, and derives the head-of-program-order token from the oldest one.
#[derive(Debug, Default)]
pub struct RetireModel {
    outstanding: BTreeMap<AgeKey, LoadCandidate>,
}

impl RetireModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, candidate: LoadCandidate) {
        let age = candidate.age;
        let previous = self.outstanding.insert(age, candidate);
        debug_assert!(previous.is_none(), "{} submitted twice", age);
    }

    pub fn remove(&mut self, age: AgeKey) -> Option<LoadCandidate> {
        self.outstanding.remove(&age)
    }

    pub fn contains(&self, age: AgeKey) -> bool {
        self.outstanding.contains_key(&age)
    }

    pub fn len(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// The oldest outstanding load, if it is MMIO.
    pub fn head_token(&self) -> Option<AgeKey> {
        self.outstanding
            .first_key_value()
            .filter(|(_, candidate)| candidate.class == MemClass::Mmio)
            .map(|(age, _)| *age)
    }

    /// Pick the `nth` outstanding age (modulo the count), oldest first.
    pub fn nth_age(&self, nth: usize) -> Option<AgeKey> {
        if self.outstanding.is_empty() {
            return None;
        }
        self.outstanding.keys().nth(nth % self.outstanding.len()).copied()
    }

    /// Remove and return every load the flush cancels, oldest first.
    pub fn drain_flushed(&mut self, flush: &Flush) -> Vec<LoadCandidate> {
        let cancelled: Vec<AgeKey> = self
            .outstanding
            .keys()
            .filter(|age| flush.cancels(**age))
            .copied()
            .collect();
        cancelled
            .into_iter()
            .filter_map(|age| self.outstanding.remove(&age))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uncache::{LoadWidth, SizeInfo};

    fn load(age: u64, class: MemClass) -> LoadCandidate {
        LoadCandidate::new(AgeKey(age), 0x100 * age, SizeInfo::new(LoadWidth::Word, false), class)
    }

    #[test]
    fn head_token_only_for_mmio() {
        let mut rob = RetireModel::new();
        rob.insert(load(2, MemClass::Mmio));
        rob.insert(load(1, MemClass::Nc));
        assert_eq!(None, rob.head_token());
        rob.remove(AgeKey(1));
        assert_eq!(Some(AgeKey(2)), rob.head_token());
    }

    #[test]
    fn flush_drains_younger() {
        let mut rob = RetireModel::new();
        for age in 1..=5 {
            rob.insert(load(age, MemClass::Nc));
        }
        let drained = rob.drain_flushed(&Flush::itself(AgeKey(3)));
        let ages: Vec<u64> = drained.iter().map(|c| c.age.0).collect();
        assert_eq!(vec![3, 4, 5], ages);
        assert_eq!(2, rob.len());
        assert!(rob.contains(AgeKey(2)));
        assert_eq!(Some(AgeKey(1)), rob.nth_age(2));
    }
}
