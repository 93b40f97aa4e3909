// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace reconstruction
//!
//! This module folds a raw block stream into the function-call trace. The
//! block list arrives newest-first; reconstruction walks it oldest-first
//! and decides for every instruction whether execution stayed within the
//! current function segment or moved to a new one via call, return, tail
//! call or an unexplained switch.

use log::{debug, trace, warn};

use crate::arch::{self, Arch};
use crate::data::{Block, Data};
use crate::ftrace::Ftrace;
use crate::insn::{Class, Insn};
use crate::segment::{Flags, GapCode, SegmentId};
use crate::symbol::{self, Cache, FuncSym, MinSym, Resolved, Symbolizer};
use crate::thread::ThreadTrace;

/// Functions with this name hand control to the function they resolved
/// rather than returning to their caller.
const DL_RUNTIME_RESOLVE: &str = "_dl_runtime_resolve";

/// Fold raw trace data into the thread's function-call trace
pub(crate) fn compute<H, A: Arch, S: Symbolizer>(
    th: &mut ThreadTrace<H>,
    data: &Data,
    arch: &mut A,
    symbols: &mut Cache<S>,
) {
    debug!("compute ftrace");

    match data {
        Data::None => {}
        Data::Bts(blocks) => compute_bts(th.trace_mut(), blocks, arch, symbols),
    }
}

/// Fold a BTS block list into the trace
///
/// Maintains the running minimum of segment levels, excluding the last
/// instruction of the newest block: that instruction is the current one
/// and has not been executed yet.
fn compute_bts<A: Arch, S: Symbolizer>(
    trace: &mut Ftrace,
    blocks: &[Block],
    arch: &mut A,
    symbols: &mut Cache<S>,
) {
    let mut level = if trace.is_empty() {
        i32::MAX
    } else {
        -trace.level_offset()
    };

    for (blk, block) in blocks.iter().enumerate().rev() {
        let newest = blk == 0;
        let mut pc = block.begin;

        loop {
            // We should hit the end of the block. If we went past it, the
            // recorded block was malformed.
            if block.end < pc {
                // there must not be a gap at the very beginning
                if !trace.is_empty() {
                    warn!("recorded trace may be corrupted around {pc:#x}");
                    trace.push_gap(GapCode::Overflow);
                }
                break;
            }

            let cur = update_function(trace, symbols, pc);

            // Maintain the minimum level. For all but the newest block we
            // do it here.
            if !newest {
                level = level.min(trace[cur].level());
            }

            let size = arch::length(arch, pc);
            let insn = Insn {
                pc,
                size,
                class: arch::classify(arch, pc),
            };
            trace.push_insn(cur, insn);

            // We are done once we pushed the instruction at the end.
            if block.end == pc {
                break;
            }

            // We cannot continue without the instruction size.
            if size == 0 {
                warn!("recorded trace may be incomplete around {pc:#x}");
                trace.push_gap(GapCode::InsnSize);
                break;
            }

            pc += u64::from(size);

            // For the newest block the minimum level is maintained here so
            // that the final, still to be executed instruction does not
            // contribute.
            if newest {
                level = level.min(trace[cur].level());
            }
        }
    }

    trace.set_level_offset(-level);
}

/// Advance the trace to the function containing the given address
///
/// Decides, based on the last recorded instruction, whether the address
/// continues the current segment or starts a new one, and returns the
/// segment the instruction at the address belongs to.
fn update_function<S: Symbolizer>(
    trace: &mut Ftrace,
    symbols: &mut Cache<S>,
    pc: u64,
) -> SegmentId {
    let Resolved { msym, sym } = symbols.resolve(pc);
    if msym.is_none() && sym.is_none() {
        trace!("no symbol at {pc:#x}");
    }

    // Without a current function, and after a gap, we start a new one.
    let cur = match trace.end() {
        Some(end) if !trace[end].is_gap() => end,
        _ => return trace.append_new(msym, sym),
    };

    // Check the last instruction, if there is one. This check comes first
    // since it allows filling in caller links in addition to the flow
    // links.
    let last = trace[cur].insns().last().copied();
    if let Some(last) = last {
        match last.class {
            Class::Return => {
                // On some systems, the dynamic linker's resolver returns
                // into the resolved function instead of jumping to it.
                // Treating that as a return would lose the current back
                // trace; it behaves like a tail call.
                if trace[cur].function_name() == DL_RUNTIME_RESOLVE {
                    return new_tailcall(trace, cur, msym, sym);
                }

                return new_return(trace, cur, msym, sym);
            }
            Class::Call => {
                // Calls to the next instruction are used for position
                // independent code; they do not open a frame.
                if last.pc + u64::from(last.size) != pc {
                    return new_call(trace, cur, msym, sym);
                }
            }
            Class::Jump => {
                // A jump to a function entry is a tail call. If the entry
                // is unknown, we assume a tail call as well.
                match symbols.entry_pc(pc) {
                    Some(start) if start != pc => {}
                    _ => return new_tailcall(trace, cur, msym, sym),
                }
            }
            Class::Other => {}
        }
    }

    // Check if we switched functions for some other reason, e.g. because
    // the trace missed a call or return.
    if symbol::switched(
        trace[cur].msym(),
        trace[cur].sym(),
        msym.as_ref(),
        sym.as_ref(),
    ) {
        trace!(
            "switching from {} at {pc:#x}",
            trace[cur].function_name()
        );
        return trace.append_new(msym, sym);
    }

    cur
}

/// Open a new frame for a call
fn new_call(
    trace: &mut Ftrace,
    caller: SegmentId,
    msym: Option<MinSym>,
    sym: Option<FuncSym>,
) -> SegmentId {
    let id = trace.append_new(msym, sym);

    trace.set_caller(id, Some(caller), Flags::NONE);
    let level = trace[id].level() + 1;
    trace.set_level(id, level);
    trace!("new call into {}", trace[id].function_name());

    id
}

/// Open a new frame for a tail call
///
/// The new function runs on the caller's stack frame; the caller link is
/// tagged accordingly.
fn new_tailcall(
    trace: &mut Ftrace,
    caller: SegmentId,
    msym: Option<MinSym>,
    sym: Option<FuncSym>,
) -> SegmentId {
    let id = trace.append_new(msym, sym);

    trace.set_caller(id, Some(caller), Flags::UP_LINKS_TO_TAILCALL);
    let level = trace[id].level() + 1;
    trace.set_level(id, level);
    trace!("new tail call into {}", trace[id].function_name());

    id
}

/// Continue the function instance we return into
fn new_return(
    trace: &mut Ftrace,
    prev: SegmentId,
    msym: Option<MinSym>,
    sym: Option<FuncSym>,
) -> SegmentId {
    let id = trace.append_new(msym, sym);

    // It is important to start at PREV's caller: for a recursive function
    // we would otherwise find PREV itself.
    if let Some(caller) = find_caller(trace, trace[prev].up(), id) {
        // The caller is the preceding segment of the instance we return
        // into.
        trace.link_instance(caller, id);
        trace.set_level(id, trace[caller].level());
        let (up, flags) = (trace[caller].up(), trace[caller].flags());
        trace.set_caller(id, up, flags);
        trace!("new return into {}", trace[id].function_name());
    } else if find_call(trace, trace[prev].up()).is_some() {
        // There is a call on the back trace we should have returned to,
        // just not the matching one. Remain at this level.
        trace.set_level(id, trace[prev].level());
        trace!("new return, unknown caller");
    } else {
        // The back trace does not contain any call; the trace must have
        // started after it. Synthesize the caller relation: the topmost
        // known segment, tail calls skipped, is declared to be called by
        // the segment we return into.
        let mut top = prev;
        while let Some(up) = trace[top].up() {
            top = up;
        }

        // Successive returns without calls stack at ever more negative
        // levels; starting below zero also keeps tail calls correct.
        let level = 0.min(trace[top].level()) - 1;
        trace.set_level(id, level);
        trace.fixup_caller(top, id, Flags::UP_LINKS_TO_RET);
        trace!("new return, no caller");
    }

    id
}

/// Find the innermost caller on the back trace with matching symbols
fn find_caller(trace: &Ftrace, start: Option<SegmentId>, target: SegmentId) -> Option<SegmentId> {
    let (msym, sym) = (trace[target].msym(), trace[target].sym());

    let mut it = start;
    while let Some(id) = it {
        // skip frames with incompatible symbol information
        if !symbol::switched(trace[id].msym(), trace[id].sym(), msym, sym) {
            return Some(id);
        }

        it = trace[id].up();
    }

    None
}

/// Find the innermost caller on the back trace that actually ends with a
/// call instruction
///
/// This skips tail calls, which end with a jump, as well as gaps.
fn find_call(trace: &Ftrace, start: Option<SegmentId>) -> Option<SegmentId> {
    let mut it = start;
    while let Some(id) = it {
        if !trace[id].is_gap() {
            if let Some(last) = trace[id].insns().last() {
                if last.class == Class::Call {
                    return Some(id);
                }
            }
        }

        it = trace[id].up();
    }

    None
}
