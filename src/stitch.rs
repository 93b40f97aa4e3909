// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Delta trace stitching
//!
//! A delta read only covers execution since the last stop. Before the
//! builder may consume it, the delta has to be anchored to the existing
//! trace: its oldest block is adjusted to start at the last recorded
//! address, and the last recorded instruction is dropped so the rebuild
//! regenerates it.

use alloc::vec::Vec;
use core::fmt;

use log::{debug, warn};

use crate::data::{Block, Data};
use crate::thread::ThreadTrace;

/// The delta trace could not be anchored to the existing trace
///
/// The caller is expected to fall back to re-reading the trace.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct StitchError;

impl core::error::Error for StitchError {}

impl fmt::Display for StitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delta trace does not extend the recorded trace")
    }
}

/// Stitch a delta trace onto the thread's existing trace
///
/// May modify both the delta and the existing trace. On success, the delta
/// is ready for the trace builder; it may have become empty, in which case
/// no rebuild is needed.
pub(crate) fn stitch<H>(data: &mut Data, th: &mut ThreadTrace<H>) -> Result<(), StitchError> {
    if data.is_empty() {
        return Ok(());
    }

    match data {
        Data::None => Ok(()),
        Data::Bts(blocks) => stitch_bts(blocks, th),
    }
}

/// Stitch a BTS block list
///
/// Block lists are newest-first, so the chronologically first block of the
/// delta is the last element.
fn stitch_bts<H>(blocks: &mut Vec<Block>, th: &mut ThreadTrace<H>) -> Result<(), StitchError> {
    let trace = th.trace_mut();
    let Some(last_seg) = trace.end() else {
        debug_assert!(false, "stitching requires an existing trace");
        return Ok(());
    };

    let last_pc = match trace[last_seg].insns().last() {
        Some(insn) => insn.pc,
        None => {
            // The existing trace ends with a gap; the oldest delta block
            // cannot be anchored to a known address, so it is dropped and
            // the traces are simply glued together.
            blocks.pop();
            return Ok(());
        }
    };

    let Some(first_new) = blocks.last().copied() else {
        return Ok(());
    };

    // If the delta consists of a single block ending at the last recorded
    // address, the thread made no progress: that block only covers the
    // current instruction. Drop it.
    if first_new.end == last_pc && blocks.len() == 1 {
        blocks.pop();
        return Ok(());
    }

    // A delta ending before our trace cannot be right.
    if first_new.end < last_pc {
        warn!("error while trying to read delta trace, falling back to a full read");
        return Err(StitchError);
    }

    debug!("stitching {last_pc:#x} to {:#x}", first_new.end);

    // Anchor the oldest block at the last recorded address and drop the
    // last instruction; the rebuild regenerates it. Since cursors address
    // instructions by index, nothing is left dangling.
    if let Some(block) = blocks.last_mut() {
        block.begin = last_pc;
    }
    let _ = trace.pop_insn(last_seg);

    // If that was the only instruction of the only segment, the rebuild
    // would turn the now empty segment into a leading gap. Start over
    // instead.
    if Some(last_seg) == trace.begin() && trace[last_seg].insns().is_empty() {
        th.clear();
    }

    Ok(())
}
