use serde::Serialize;

use super::types::{AgeKey, ExceptionSet, MemClass, OrderClass, SizeInfo, SlotId};

/// Where the front end restarts when a load has to be re-fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RestartInfo {
    pub pc: u64,
    pub is_compressed: bool,
}

/// A load offered by one producer lane, before the buffer decides whether to track it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCandidate {
    pub age: AgeKey,
    pub lq_idx: u32,
    pub addr: u64,
    /// Byte enables over a 16-byte window.
    pub mask: u16,
    pub size: SizeInfo,
    pub class: MemClass,
    pub atomic: bool,
    pub exceptions: ExceptionSet,
    pub needs_replay: bool,
    pub restart: RestartInfo,
}

impl LoadCandidate {
    pub fn new(age: AgeKey, addr: u64, size: SizeInfo, class: MemClass) -> Self {
        Self {
            age,
            lq_idx: 0,
            addr,
            mask: size.width.mask_at(addr),
            size,
            class,
            atomic: matches!(class, MemClass::Mmio),
            exceptions: ExceptionSet::NONE,
            needs_replay: false,
            restart: RestartInfo::default(),
        }
    }
}

/// The record a slot owns from capture until it is freed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Request {
    pub age: AgeKey,
    pub lq_idx: u32,
    pub addr: u64,
    pub mask: u16,
    pub size: SizeInfo,
    pub class: OrderClass,
    pub atomic: bool,
    pub exceptions: ExceptionSet,
}

impl Request {
    /// `None` for loads that are not uncached and therefore never tracked here.
    pub fn from_candidate(candidate: &LoadCandidate) -> Option<Self> {
        let class = candidate.class.order_class()?;
        Some(Self {
            age: candidate.age,
            lq_idx: candidate.lq_idx,
            addr: candidate.addr,
            mask: candidate.mask,
            size: candidate.size,
            class,
            atomic: candidate.atomic,
            exceptions: candidate.exceptions,
        })
    }

    /// Byte enables for the 8-byte beat addressed by bit 3 of the address.
    pub fn beat_mask(&self) -> u8 {
        if self.addr & 0x8 != 0 {
            (self.mask >> 8) as u8
        } else {
            self.mask as u8
        }
    }
}

/// Loads are the only traffic this buffer puts on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemCommand {
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendRequest {
    pub addr: u64,
    pub mask: u8,
    pub cmd: MemCommand,
    /// Slot index; echoed back on the response.
    pub tag: SlotId,
    pub atomic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendResponse {
    pub tag: SlotId,
    pub data: u64,
    pub error: bool,
}

/// A finished load as seen by a writeback consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Writeback {
    pub age: AgeKey,
    pub lq_idx: u32,
    pub addr: u64,
    pub class: OrderClass,
    /// Sub-word selected and extended.
    pub data: u64,
    pub exceptions: ExceptionSet,
}

impl Writeback {
    pub fn has_fault(&self) -> bool {
        !self.exceptions.is_empty()
    }
}

/// Ordered completions also carry the whole response beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderedWriteback {
    pub writeback: Writeback,
    pub raw_data: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultReport {
    pub slot: SlotId,
    pub age: AgeKey,
    pub lq_idx: u32,
    pub addr: u64,
    pub exceptions: ExceptionSet,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uncache::types::LoadWidth;

    #[test]
    fn cacheable_loads_are_not_tracked() {
        let size = SizeInfo::new(LoadWidth::Word, false);
        let candidate = LoadCandidate::new(AgeKey(1), 0x1000, size, MemClass::Cacheable);
        assert!(Request::from_candidate(&candidate).is_none());
        let candidate = LoadCandidate::new(AgeKey(1), 0x1000, size, MemClass::Nc);
        let request = Request::from_candidate(&candidate).unwrap();
        assert_eq!(OrderClass::Unordered, request.class);
        assert!(!request.atomic);
    }

    #[test]
    fn beat_mask_uses_address_bit_three() {
        let size = SizeInfo::new(LoadWidth::Half, false);
        let low = Request::from_candidate(&LoadCandidate::new(AgeKey(0), 0x2002, size, MemClass::Mmio))
            .unwrap();
        assert_eq!(0b0000_1100, low.beat_mask());
        assert!(low.atomic);
        let high = Request::from_candidate(&LoadCandidate::new(AgeKey(0), 0x200a, size, MemClass::Mmio))
            .unwrap();
        assert_eq!(0b0000_1100, high.beat_mask());
        assert_eq!(0x0c00, high.mask);
    }
}
