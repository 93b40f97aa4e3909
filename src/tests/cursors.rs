// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Cursor behaviour over a reconstructed trace

use super::*;

use crate::cursor::CallCursor;

/// main calls foo, foo's trace breaks with a gap, main resumes
fn gapped_call_trace() -> ThreadTrace<u32> {
    let arch = TestArch::default()
        .with_linear(0x100, 0x108)
        .with_insn(0x103, 1, Class::Call)
        .with_insn(0x200, 1, Class::Other)
        .with_insn(0x201, 4, Class::Other);
    let syms = TestSyms::default()
        .with_fn("main", "main.c", 0x100, 0x1ff)
        .with_fn("foo", "foo.c", 0x200, 0x2ff);

    build(
        arch,
        syms,
        vec![
            Block {
                begin: 0x104,
                end: 0x108,
            },
            Block {
                begin: 0x200,
                end: 0x202,
            },
            Block {
                begin: 0x100,
                end: 0x103,
            },
        ],
    )
}

#[test]
fn insn_numbers_are_dense_across_the_gap() {
    let th = gapped_call_trace();
    let trace = th.trace();

    let mut it = InsnCursor::begin(trace).unwrap();
    let mut numbers = Vec::new();
    loop {
        numbers.push(it.number());
        if it.next(1) == 0 {
            break;
        }
    }

    // main: 1..=4, foo: 5..=6, the gap: 0, main again: 7..
    assert_eq!(numbers, [1, 2, 3, 4, 5, 6, 0, 7, 8, 9, 10, 11]);
}

#[test]
fn insn_round_trip_across_segments_and_gaps() {
    // stepping forward and back by the same amount returns to the start
    let th = gapped_call_trace();
    let trace = th.trace();

    for k in 0..12 {
        let begin = InsnCursor::begin(trace).unwrap();
        let mut it = begin;
        let steps = it.next(k);
        assert_eq!(it.prev(steps), steps);
        assert_eq!(it.pos(), begin.pos(), "round trip of {k} steps");
    }
}

#[test]
fn insn_comparison_is_a_total_order_along_the_walk() {
    let th = gapped_call_trace();
    let trace = th.trace();

    let mut cursors = Vec::new();
    let mut it = InsnCursor::begin(trace).unwrap();
    loop {
        cursors.push(it);
        if it.next(1) == 0 {
            break;
        }
    }

    for (i, a) in cursors.iter().enumerate() {
        for (j, b) in cursors.iter().enumerate() {
            assert_eq!(a.cmp(b), i.cmp(&j), "cursors {i} and {j}");
        }
    }
}

#[test]
fn find_by_number_roundtrips_every_real_instruction() {
    let th = gapped_call_trace();
    let trace = th.trace();

    let mut it = InsnCursor::begin(trace).unwrap();
    loop {
        let number = it.number();
        if number != 0 {
            let found = InsnCursor::find(trace, number).unwrap();
            assert_eq!(found.number(), number);
            assert_eq!(found.get().unwrap().pc, it.get().unwrap().pc);
        }
        if it.next(1) == 0 {
            break;
        }
    }

    assert!(InsnCursor::find(trace, 0).is_none());
    assert!(InsnCursor::find(trace, 12).is_none());
}

#[test]
fn call_cursor_sees_the_nesting() {
    let th = gapped_call_trace();
    let trace = th.trace();

    let mut it = CallCursor::begin(trace).unwrap();
    assert_eq!(it.get().unwrap().function_name(), "main");
    assert_eq!(it.next(1), 1);
    assert_eq!(it.get().unwrap().function_name(), "foo");
    assert_eq!(it.next(1), 1);
    assert!(it.get().unwrap().is_gap());
    assert_eq!(it.next(1), 1);
    assert_eq!(it.get().unwrap().function_name(), "main");
    assert_eq!(it.next(1), 1);
    assert!(it.get().is_none());

    let mut numbers = Vec::new();
    let mut back = it;
    while back.prev(1) != 0 {
        numbers.push(back.number());
    }
    assert_eq!(numbers, [4, 3, 2, 1]);
}

#[test]
fn replay_positions_reseat_after_a_rebuild() {
    // a cursor position saved by number survives a full rebuild of the
    // same execution history
    let mut th = gapped_call_trace();
    let saved = InsnCursor::find(th.trace(), 5).unwrap();
    let number = saved.number();

    let arch = TestArch::default()
        .with_linear(0x100, 0x108)
        .with_insn(0x103, 1, Class::Call)
        .with_insn(0x200, 1, Class::Other)
        .with_insn(0x201, 4, Class::Other);
    let syms = TestSyms::default()
        .with_fn("main", "main.c", 0x100, 0x1ff)
        .with_fn("foo", "foo.c", 0x200, 0x2ff);

    th.clear();
    extend(
        &mut th,
        arch,
        syms,
        vec![
            Block {
                begin: 0x104,
                end: 0x108,
            },
            Block {
                begin: 0x200,
                end: 0x202,
            },
            Block {
                begin: 0x100,
                end: 0x103,
            },
        ],
    );

    let reseated = InsnCursor::find(th.trace(), number).unwrap();
    assert_eq!(reseated.number(), number);
    assert_eq!(reseated.get().unwrap().pc, 0x200);
}
