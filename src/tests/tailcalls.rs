// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Scenarios around tail calls and the dynamic linker trampoline

use super::*;

#[test]
fn jump_to_a_function_entry_is_a_tail_call() {
    let arch = TestArch::default()
        .with_linear(0x300, 0x30f)
        .with_linear(0x400, 0x408)
        .with_insn(0x30f, 1, Class::Jump);
    let syms = TestSyms::default()
        .with_fn("bar", "bar.c", 0x300, 0x3ff)
        .with_fn("baz", "baz.c", 0x400, 0x4ff);

    let th = build(
        arch,
        syms,
        vec![
            Block {
                begin: 0x400,
                end: 0x408,
            },
            Block {
                begin: 0x300,
                end: 0x30f,
            },
        ],
    );

    let trace = th.trace();
    let &[bar, baz] = &segment_ids(trace)[..] else {
        panic!("expected two segments, got {}", trace.len());
    };

    assert_eq!(trace[baz].up(), Some(bar));
    assert!(trace[baz].flags().contains(Flags::UP_LINKS_TO_TAILCALL));
    assert_eq!([depth(trace, bar), depth(trace, baz)], [0, 1]);
    assert_eq!(trace[bar].instance_next(), None);
}

#[test]
fn jump_to_an_unknown_function_is_a_tail_call() {
    // no symbol information for the jump target at all
    let arch = TestArch::default()
        .with_linear(0x300, 0x303)
        .with_linear(0x700, 0x702)
        .with_insn(0x303, 1, Class::Jump);
    let syms = TestSyms::default().with_fn("bar", "bar.c", 0x300, 0x3ff);

    let th = build(
        arch,
        syms,
        vec![
            Block {
                begin: 0x700,
                end: 0x702,
            },
            Block {
                begin: 0x300,
                end: 0x303,
            },
        ],
    );

    let trace = th.trace();
    let &[bar, unknown] = &segment_ids(trace)[..] else {
        panic!("expected two segments, got {}", trace.len());
    };

    assert_eq!(trace[unknown].function_name(), "<unknown>");
    assert_eq!(trace[unknown].up(), Some(bar));
    assert!(trace[unknown].flags().contains(Flags::UP_LINKS_TO_TAILCALL));
}

#[test]
fn jump_into_the_middle_of_a_function_is_a_switch() {
    let arch = TestArch::default()
        .with_linear(0x300, 0x303)
        .with_linear(0x400, 0x408)
        .with_insn(0x303, 1, Class::Jump);
    let syms = TestSyms::default()
        .with_fn("bar", "bar.c", 0x300, 0x3ff)
        .with_fn("baz", "baz.c", 0x400, 0x4ff);

    let th = build(
        arch,
        syms,
        vec![
            Block {
                begin: 0x404,
                end: 0x408,
            },
            Block {
                begin: 0x300,
                end: 0x303,
            },
        ],
    );

    let trace = th.trace();
    let &[bar, baz] = &segment_ids(trace)[..] else {
        panic!("expected two segments, got {}", trace.len());
    };

    // not a tail call: no frame is opened
    assert_eq!(trace[baz].up(), None);
    assert!(trace[baz].flags().is_empty());
    assert_eq!(depth(trace, bar), depth(trace, baz));
}

#[test]
fn jump_within_the_function_stays_in_the_segment() {
    // a loop: the jump goes backwards within the same function
    let arch = TestArch::default()
        .with_linear(0x300, 0x308)
        .with_insn(0x305, 1, Class::Jump);
    let syms = TestSyms::default().with_fn("bar", "bar.c", 0x300, 0x3ff);

    let th = build(
        arch,
        syms,
        vec![
            Block {
                begin: 0x302,
                end: 0x308,
            },
            Block {
                begin: 0x300,
                end: 0x305,
            },
        ],
    );

    let trace = th.trace();
    assert_eq!(trace.len(), 1);
    let bar = trace.begin().unwrap();
    assert_eq!(trace[bar].insns().len(), 13);
    assert_eq!(trace[bar].up(), None);
}

#[test]
fn dynamic_linker_trampoline_returns_into_the_resolved_function() {
    // the resolver returns to the function it resolved; popping a frame
    // would lose the back trace, so this counts as a tail call
    let arch = TestArch::default()
        .with_linear(0x500, 0x50f)
        .with_linear(0x600, 0x604)
        .with_insn(0x50f, 1, Class::Return);
    let syms = TestSyms::default()
        .with_fn("_dl_runtime_resolve", "dl-trampoline.S", 0x500, 0x5ff)
        .with_fn("resolved", "resolved.c", 0x600, 0x6ff);

    let th = build(
        arch,
        syms,
        vec![
            Block {
                begin: 0x600,
                end: 0x604,
            },
            Block {
                begin: 0x500,
                end: 0x50f,
            },
        ],
    );

    let trace = th.trace();
    let &[resolver, resolved] = &segment_ids(trace)[..] else {
        panic!("expected two segments, got {}", trace.len());
    };

    assert_eq!(trace[resolved].function_name(), "resolved");
    assert_eq!(trace[resolved].up(), Some(resolver));
    assert!(trace[resolved].flags().contains(Flags::UP_LINKS_TO_TAILCALL));
    assert_eq!([depth(trace, resolver), depth(trace, resolved)], [0, 1]);
}
