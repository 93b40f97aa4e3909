// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! End-to-end trace reconstruction scenarios

mod cursors;
mod tailcalls;

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use crate::arch::{Arch, NoInstruction};
use crate::builder;
use crate::config::{Config, Format};
use crate::cursor::InsnCursor;
use crate::data::{Block, Data};
use crate::ftrace::Ftrace;
use crate::insn::Class;
use crate::segment::{Flags, SegmentId};
use crate::session::{Error, Session};
use crate::symbol::{self, Cache, FuncSym, MinSym, Symbolizer};
use crate::target::{ReadMode, Target, Tid};
use crate::thread::ThreadTrace;

/// Table driven instruction oracle
#[derive(Clone, Debug, Default)]
struct TestArch {
    insns: BTreeMap<u64, (u8, Class)>,
}

impl TestArch {
    /// Add size-one instructions of the given class on `[begin, end]`
    fn with_range(mut self, begin: u64, end: u64, class: Class) -> Self {
        for pc in begin..=end {
            self.insns.insert(pc, (1, class));
        }
        self
    }

    /// Add plain size-one instructions on `[begin, end]`
    fn with_linear(self, begin: u64, end: u64) -> Self {
        self.with_range(begin, end, Class::Other)
    }

    /// Add a single instruction
    fn with_insn(mut self, pc: u64, size: u8, class: Class) -> Self {
        self.insns.insert(pc, (size, class));
        self
    }
}

impl Arch for TestArch {
    type Error = NoInstruction;

    fn classify_insn(&mut self, pc: u64) -> Result<Class, Self::Error> {
        self.insns.get(&pc).map(|(_, class)| *class).ok_or(NoInstruction)
    }

    fn insn_length(&mut self, pc: u64) -> Result<u8, Self::Error> {
        self.insns.get(&pc).map(|(size, _)| *size).ok_or(NoInstruction)
    }
}

/// A function known to the test symbol map
#[derive(Clone, Debug)]
struct TestFn {
    name: &'static str,
    file: &'static str,
    begin: u64,
    end: u64,
    minimal_only: bool,
}

/// Address range based symbol map
#[derive(Clone, Debug, Default)]
struct TestSyms {
    funcs: Vec<TestFn>,
}

impl TestSyms {
    /// Add a fully symbolized function covering `[begin, end]`
    fn with_fn(mut self, name: &'static str, file: &'static str, begin: u64, end: u64) -> Self {
        self.funcs.push(TestFn {
            name,
            file,
            begin,
            end,
            minimal_only: false,
        });
        self
    }

    /// Add a function that only has a minimal symbol
    fn with_msym_only(mut self, name: &'static str, begin: u64, end: u64) -> Self {
        self.funcs.push(TestFn {
            name,
            file: "",
            begin,
            end,
            minimal_only: true,
        });
        self
    }

    fn find(&self, pc: u64) -> Option<&TestFn> {
        self.funcs.iter().find(|f| f.begin <= pc && pc <= f.end)
    }
}

impl Symbolizer for TestSyms {
    fn function_at(&mut self, pc: u64) -> Option<FuncSym> {
        self.find(pc)
            .filter(|f| !f.minimal_only)
            .map(|f| FuncSym::new(f.name, f.file))
    }

    fn minimal_symbol_at(&mut self, pc: u64) -> Option<MinSym> {
        self.find(pc).map(|f| MinSym::new(f.name))
    }

    fn function_entry_pc(&mut self, pc: u64) -> Option<u64> {
        self.find(pc).map(|f| f.begin)
    }
}

/// Producer error used by the scripted target
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct TargetErr;

impl core::error::Error for TargetErr {}

impl core::fmt::Display for TargetErr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "scripted failure")
    }
}

/// A producer replaying a script of expected reads
#[derive(Debug, Default)]
struct TestTarget {
    script: Vec<(ReadMode, Result<Data, TargetErr>)>,
    reads: Vec<ReadMode>,
    enabled: u32,
    refuse: bool,
    conf: Config,
}

impl TestTarget {
    fn scripted(script: Vec<(ReadMode, Result<Data, TargetErr>)>) -> Self {
        Self {
            script,
            ..Default::default()
        }
    }
}

impl Target for TestTarget {
    type Handle = u32;
    type Error = TargetErr;

    fn supports(&self, format: Format) -> bool {
        !self.refuse && format == Format::Bts
    }

    fn enable(&mut self, _: Tid, conf: &Config) -> Result<u32, TargetErr> {
        self.enabled += 1;
        self.conf = *conf;
        Ok(self.enabled)
    }

    fn disable(&mut self, _: u32) {}

    fn teardown(&mut self, _: u32) {}

    fn conf(&self, _: &u32) -> Option<&Config> {
        Some(&self.conf)
    }

    fn read(&mut self, _: &mut u32, mode: ReadMode) -> Result<Data, TargetErr> {
        self.reads.push(mode);
        assert!(!self.script.is_empty(), "unexpected {mode:?} read");
        let (expected, result) = self.script.remove(0);
        assert_eq!(mode, expected, "reads out of order");
        result
    }
}

/// Run the trace builder over a block list, newest block first
fn build(arch: TestArch, syms: TestSyms, blocks: Vec<Block>) -> ThreadTrace<u32> {
    let mut th = ThreadTrace::new();
    extend(&mut th, arch, syms, blocks);
    th
}

/// Run the trace builder over an additional block list
fn extend(th: &mut ThreadTrace<u32>, mut arch: TestArch, syms: TestSyms, blocks: Vec<Block>) {
    let mut symbols = Cache::new(syms);
    builder::compute(th, &Data::Bts(blocks), &mut arch, &mut symbols);
    check_invariants(th.trace());
}

/// Segment ids of the whole trace, in chronological order
fn segment_ids(trace: &Ftrace) -> Vec<SegmentId> {
    trace.segments().map(|(id, _)| id).collect()
}

/// Normalized stack depth of a segment
fn depth(trace: &Ftrace, id: SegmentId) -> i32 {
    trace[id].level() + trace.level_offset()
}

/// Executed instruction addresses of a segment
fn pcs(trace: &Ftrace, id: SegmentId) -> Vec<u64> {
    trace[id].insns().iter().map(|insn| insn.pc).collect()
}

/// Assert the structural trace invariants
fn check_invariants(trace: &Ftrace) {
    let mut expected_number = 1;
    let mut expected_offset = 1;

    for (id, seg) in trace.segments() {
        assert_eq!(seg.number(), expected_number);
        assert_eq!(seg.insn_offset(), expected_offset);
        expected_number += 1;
        expected_offset += seg.insns().len() as u32;

        // a segment without instructions is exactly a gap
        assert_eq!(seg.insns().is_empty(), seg.is_gap());

        if let Some(next) = seg.instance_next() {
            let other = &trace[next];
            assert_eq!(other.instance_prev(), Some(id));
            assert!(!symbol::switched(
                seg.msym(),
                seg.sym(),
                other.msym(),
                other.sym()
            ));
            assert_eq!(seg.up(), other.up());
        }

        if let Some(up) = seg.up() {
            assert!(!trace[up].is_gap());
            // only a synthesized return caller may point forward in time
            if !seg.flags().contains(Flags::UP_LINKS_TO_RET) {
                assert!(up < id);
            }
        }
    }

    if let Some(begin) = trace.begin() {
        assert!(!trace[begin].is_gap());
    }

    // Levels normalize to a minimum of zero. An end segment holding only
    // the current instruction has not executed yet and does not count.
    let end = trace.end();
    let min = trace
        .segments()
        .filter(|(id, seg)| {
            !seg.is_gap() && !(Some(*id) == end && seg.insns().len() == 1)
        })
        .map(|(id, _)| depth(trace, id))
        .min();
    if let Some(min) = min {
        assert_eq!(min, 0);
    }
}

/// Number of executed instructions, not counting the current one
fn executed_insns(trace: &Ftrace) -> usize {
    let (Some(mut it), Some(end)) = (InsnCursor::begin(trace), InsnCursor::end(trace)) else {
        return 0;
    };

    let mut count = 0;
    while it < end {
        count += 1;
        if it.next(1) == 0 {
            break;
        }
    }
    count
}
