use crate::uncache::fanout::WritebackFanout;

#[test]
fn slots_are_partitioned_by_index() {
    let fanout = WritebackFanout::new(8, 4);
    assert_eq!(3, fanout.unordered_ports());
    assert_eq!(0, fanout.partition(3));
    assert_eq!(1, fanout.partition(7));
}

#[test]
fn each_port_takes_its_lowest_ready_slot() {
    let fanout = WritebackFanout::new(6, 4);
    let ordered = [false; 6];
    let unordered = [false, true, true, false, true, false];
    let selection = fanout.select(&ordered, &unordered);
    assert_eq!(None, selection.ordered);
    assert_eq!(vec![None, Some(1), Some(2)], selection.unordered);
}

#[test]
fn ordered_port_is_separate() {
    let fanout = WritebackFanout::new(4, 2);
    let selection = fanout.select(&[false, false, true, false], &[true, false, false, true]);
    assert_eq!(Some(2), selection.ordered);
    assert_eq!(vec![Some(0)], selection.unordered);
}

#[test]
#[should_panic]
fn needs_an_unordered_port() {
    WritebackFanout::new(4, 1);
}
