use std::fmt::{Display, Formatter};
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

pub type SlotId = usize;
pub type LaneId = usize;

/// Program-order position of an instruction.  Smaller is older; keys are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct AgeKey(pub u64);

impl AgeKey {
    pub fn is_before(self, other: AgeKey) -> bool {
        self.0 < other.0
    }

    pub fn is_after(self, other: AgeKey) -> bool {
        self.0 > other.0
    }
}

impl Display for AgeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "age#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlushLevel {
    /// Cancels everything strictly younger than the flush age.
    After,
    /// Cancels the flush age itself and everything younger.
    Itself,
}

/// Global age-keyed cancellation, broadcast to every stage for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Flush {
    pub age: AgeKey,
    pub level: FlushLevel,
}

impl Flush {
    pub fn after(age: AgeKey) -> Self {
        Self { age, level: FlushLevel::After }
    }

    pub fn itself(age: AgeKey) -> Self {
        Self { age, level: FlushLevel::Itself }
    }

    pub fn cancels(&self, age: AgeKey) -> bool {
        age.is_after(self.age) || (self.level == FlushLevel::Itself && age == self.age)
    }
}

/// Shorthand used at every stage: does the (optional) flush of some cycle cancel `age`.
pub fn need_flush(flush: Option<&Flush>, age: AgeKey) -> bool {
    flush.is_some_and(|flush| flush.cancels(age))
}

/// Load-side exception bits carried with a request, indexed by trap cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExceptionSet(u32);

impl ExceptionSet {
    pub const NONE: ExceptionSet = ExceptionSet(0);
    pub const LOAD_ADDR_MISALIGNED: ExceptionSet = ExceptionSet(1 << 4);
    pub const LOAD_ACCESS_FAULT: ExceptionSet = ExceptionSet(1 << 5);
    pub const LOAD_PAGE_FAULT: ExceptionSet = ExceptionSet(1 << 13);
    pub const LOAD_GUEST_PAGE_FAULT: ExceptionSet = ExceptionSet(1 << 21);
    pub const BREAKPOINT: ExceptionSet = ExceptionSet(1 << 3);
    pub const HARDWARE_ERROR: ExceptionSet = ExceptionSet(1 << 19);

    /// The subset the load unit can raise.
    pub const LOAD_UNIT: ExceptionSet = ExceptionSet(
        Self::LOAD_ADDR_MISALIGNED.0
            | Self::LOAD_ACCESS_FAULT.0
            | Self::LOAD_PAGE_FAULT.0
            | Self::LOAD_GUEST_PAGE_FAULT.0
            | Self::BREAKPOINT.0
            | Self::HARDWARE_ERROR.0,
    );

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: ExceptionSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: ExceptionSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: ExceptionSet) {
        self.0 |= other.0;
    }
}

impl BitOr for ExceptionSet {
    type Output = ExceptionSet;

    fn bitor(self, rhs: Self) -> Self::Output {
        ExceptionSet(self.0 | rhs.0)
    }
}

/// How a load was classified before it reached the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MemClass {
    Cacheable,
    /// Memory-mapped IO; issued strictly in program order.
    Mmio,
    /// Non-cacheable memory; no ordering among themselves.
    Nc,
}

impl MemClass {
    pub fn order_class(self) -> Option<OrderClass> {
        match self {
            MemClass::Cacheable => None,
            MemClass::Mmio => Some(OrderClass::Ordered),
            MemClass::Nc => Some(OrderClass::Unordered),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderClass {
    Ordered,
    Unordered,
}

impl OrderClass {
    pub fn is_ordered(self) -> bool {
        matches!(self, OrderClass::Ordered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LoadWidth {
    Byte,
    Half,
    #[default]
    Word,
    Double,
}

impl LoadWidth {
    pub fn bytes(self) -> u32 {
        match self {
            LoadWidth::Byte => 1,
            LoadWidth::Half => 2,
            LoadWidth::Word => 4,
            LoadWidth::Double => 8,
        }
    }

    fn bits(self) -> u32 {
        self.bytes() * 8
    }

    /// Byte-enable pattern for an access of this width at the low bits of `addr`, placed in
    /// a 16-byte window.
    pub fn mask_at(self, addr: u64) -> u16 {
        let lanes = (1u32 << self.bytes()) - 1;
        ((lanes << (addr & 0xf)) & 0xffff) as u16
    }
}

/// Size decode for a load: width plus sign extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SizeInfo {
    pub width: LoadWidth,
    pub signed: bool,
}

impl SizeInfo {
    pub fn new(width: LoadWidth, signed: bool) -> Self {
        Self { width, signed }
    }

    /// Pick the addressed bytes out of a 64-bit beat and extend them to 64 bits.
    pub fn select(self, beat: u64, addr: u64) -> u64 {
        let shifted = beat >> (8 * (addr & 0x7));
        let bits = self.width.bits();
        if bits == 64 {
            return shifted;
        }
        let value = shifted & ((1u64 << bits) - 1);
        if self.signed {
            let shift = 64 - bits;
            (((value << shift) as i64) >> shift) as u64
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_levels() {
        let flush = Flush::after(AgeKey(10));
        assert!(!flush.cancels(AgeKey(9)));
        assert!(!flush.cancels(AgeKey(10)));
        assert!(flush.cancels(AgeKey(11)));

        let flush = Flush::itself(AgeKey(10));
        assert!(flush.cancels(AgeKey(10)));
        assert!(!need_flush(None, AgeKey(10)));
        assert!(need_flush(Some(&flush), AgeKey(12)));
    }

    #[test]
    fn subword_select_extends() {
        let beat = 0x8877_6655_4433_2211u64;
        assert_eq!(0x33, SizeInfo::new(LoadWidth::Byte, false).select(beat, 0x1002));
        assert_eq!(0xffff_ffff_ffff_ff88, SizeInfo::new(LoadWidth::Byte, true).select(beat, 0x7));
        assert_eq!(0x6655, SizeInfo::new(LoadWidth::Half, true).select(beat, 0x4));
        assert_eq!(0xffff_ffff_8877_6655, SizeInfo::new(LoadWidth::Word, true).select(beat, 0x4));
        assert_eq!(0x8877_6655, SizeInfo::new(LoadWidth::Word, false).select(beat, 0xc));
        assert_eq!(beat, SizeInfo::new(LoadWidth::Double, false).select(beat, 0x8));
    }

    #[test]
    fn width_masks() {
        assert_eq!(0x000f, LoadWidth::Word.mask_at(0x0));
        assert_eq!(0x0f00, LoadWidth::Word.mask_at(0x8));
        assert_eq!(0xff00, LoadWidth::Double.mask_at(0x8));
        assert_eq!(0x0040, LoadWidth::Byte.mask_at(0x6));
    }

    #[test]
    fn exception_set_ops() {
        let mut set = ExceptionSet::NONE;
        assert!(set.is_empty());
        set.insert(ExceptionSet::LOAD_ACCESS_FAULT);
        assert!(set.contains(ExceptionSet::LOAD_ACCESS_FAULT));
        assert!(set.intersects(ExceptionSet::LOAD_UNIT));
        assert!(!set.contains(ExceptionSet::LOAD_PAGE_FAULT));
        let both = set | ExceptionSet::LOAD_PAGE_FAULT;
        assert_eq!((1 << 5) | (1 << 13), both.bits());
    }
}
