use crate::uncache::admission::{AdmissionFilter, FilterReason, LaneStage};
use crate::uncache::request::LoadCandidate;
use crate::uncache::types::{AgeKey, ExceptionSet, Flush, LoadWidth, MemClass, SizeInfo};

fn load(age: u64, class: MemClass) -> LoadCandidate {
    LoadCandidate::new(AgeKey(age), 0x1000 + 8 * age, SizeInfo::new(LoadWidth::Word, false), class)
}

fn filtered(stage: &LaneStage) -> Option<FilterReason> {
    match stage {
        LaneStage::Filtered(reason) => Some(*reason),
        _ => None,
    }
}

#[test]
fn prefix_counts_enqueuing_lanes_only() {
    let mut filter = AdmissionFilter::new(3);
    assert!(filter.is_idle());
    filter.advance(&[Some(load(1, MemClass::Nc)), Some(load(2, MemClass::Cacheable)), Some(load(3, MemClass::Mmio))], None);
    assert!(!filter.is_idle());

    let stages = filter.evaluate(None);
    match &stages[0] {
        LaneStage::Enqueue { request, prefix, .. } => {
            assert_eq!(AgeKey(1), request.age);
            assert_eq!(0, *prefix);
        }
        other => panic!("lane 0 should enqueue, got {:?}", other),
    }
    assert_eq!(Some(FilterReason::Cacheable), filtered(&stages[1]));
    match &stages[2] {
        LaneStage::Enqueue { request, prefix, .. } => {
            assert_eq!(AgeKey(3), request.age);
            assert_eq!(1, *prefix);
        }
        other => panic!("lane 2 should enqueue, got {:?}", other),
    }
}

#[test]
fn flush_on_arrival_cancels() {
    let mut filter = AdmissionFilter::new(2);
    filter.advance(&[Some(load(4, MemClass::Nc)), Some(load(5, MemClass::Nc))], Some(&Flush::after(AgeKey(4))));
    let stages = filter.evaluate(None);
    assert!(matches!(stages[0], LaneStage::Enqueue { .. }));
    assert_eq!(Some(FilterReason::Cancelled), filtered(&stages[1]));
}

#[test]
fn flush_in_stage_two_cancels() {
    let mut filter = AdmissionFilter::new(1);
    filter.advance(&[Some(load(4, MemClass::Mmio))], None);
    let stages = filter.evaluate(Some(&Flush::itself(AgeKey(4))));
    assert_eq!(Some(FilterReason::Cancelled), filtered(&stages[0]));
}

#[test]
fn exceptions_and_replays_are_filtered() {
    let mut faulting = load(1, MemClass::Nc);
    faulting.exceptions = ExceptionSet::LOAD_PAGE_FAULT;
    let mut replay = load(2, MemClass::Nc);
    replay.needs_replay = true;
    let mut both = load(3, MemClass::Mmio);
    both.exceptions = ExceptionSet::LOAD_ADDR_MISALIGNED;
    both.needs_replay = true;

    let mut filter = AdmissionFilter::new(4);
    filter.advance(&[Some(faulting), Some(replay), Some(both), None], None);
    let stages = filter.evaluate(None);
    assert_eq!(Some(FilterReason::Exception), filtered(&stages[0]));
    assert_eq!(Some(FilterReason::Replay), filtered(&stages[1]));
    assert_eq!(Some(FilterReason::Exception), filtered(&stages[2]));
    assert_eq!(LaneStage::Empty, stages[3]);
}

#[test]
fn candidates_stay_one_cycle() {
    let mut filter = AdmissionFilter::new(1);
    filter.advance(&[Some(load(1, MemClass::Nc))], None);
    filter.advance(&[None], None);
    assert!(filter.is_idle());
    filter.advance(&[Some(load(2, MemClass::Nc))], None);
    filter.reset();
    assert!(filter.is_idle());
}
