// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Instruction cursors

use core::cmp::Ordering;

use crate::ftrace::Ftrace;
use crate::insn::Insn;
use crate::segment::{Segment, SegmentId};

/// A persistent instruction position
///
/// Positions are plain values and may be stored across trace rebuilds,
/// but they are only meaningful for the trace they were taken from. After
/// a rebuild, re-validate with [`InsnCursor::with_pos`] or re-seat by
/// number with [`InsnCursor::find`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InsnPos {
    pub(crate) seg: SegmentId,
    pub(crate) index: usize,
}

/// Cursor over individual traced instructions
///
/// A gap counts as a single instruction. The chronologically last
/// instruction of the trace is the current, not yet executed one; it marks
/// the end position and is excluded from iteration.
#[derive(Copy, Clone, Debug)]
pub struct InsnCursor<'a> {
    trace: &'a Ftrace,
    seg: SegmentId,
    index: usize,
}

impl<'a> InsnCursor<'a> {
    /// Cursor at the chronologically first instruction
    ///
    /// Returns `None` if there is no trace.
    pub fn begin(trace: &'a Ftrace) -> Option<Self> {
        let seg = trace.begin()?;
        Some(Self {
            trace,
            seg,
            index: 0,
        })
    }

    /// Cursor one past the last executed instruction
    ///
    /// Returns `None` if there is no trace.
    pub fn end(trace: &'a Ftrace) -> Option<Self> {
        let seg = trace.end()?;
        // The last segment either is a gap or it contains the current
        // instruction, which is one past the end of the execution history.
        let index = trace[seg].insns().len().saturating_sub(1);
        Some(Self { trace, seg, index })
    }

    /// Re-create a cursor from a saved position
    ///
    /// Returns `None` if the position does not exist in this trace.
    pub fn with_pos(trace: &'a Ftrace, pos: InsnPos) -> Option<Self> {
        let seg = trace.get(pos.seg)?;
        let limit = seg.insns().len().max(1);
        (pos.index < limit).then_some(Self {
            trace,
            seg: pos.seg,
            index: pos.index,
        })
    }

    /// The persistent position of this cursor
    pub fn pos(&self) -> InsnPos {
        InsnPos {
            seg: self.seg,
            index: self.index,
        }
    }

    /// The segment the cursor currently rests in
    pub fn segment(&self) -> &'a Segment {
        &self.trace[self.seg]
    }

    /// Identifier of the segment the cursor currently rests in
    pub fn segment_id(&self) -> SegmentId {
        self.seg
    }

    /// The instruction under the cursor
    ///
    /// Returns `None` if the cursor rests in a gap. At the end position,
    /// this yields the current, not yet executed instruction.
    pub fn get(&self) -> Option<&'a Insn> {
        let seg = &self.trace[self.seg];
        if seg.is_gap() {
            return None;
        }

        debug_assert!(self.index < seg.insns().len());
        seg.insns().get(self.index)
    }

    /// Global number of the instruction under the cursor
    ///
    /// Numbers start at one; a gap contributes number zero.
    pub fn number(&self) -> u32 {
        let seg = &self.trace[self.seg];
        if seg.is_gap() {
            return 0;
        }

        seg.insn_offset() + self.index as u32
    }

    /// Advance by at most `stride` instructions
    ///
    /// Returns the number of steps actually taken. The cursor never moves
    /// past the end position.
    pub fn next(&mut self, mut stride: usize) -> usize {
        let mut steps = 0;

        while stride != 0 {
            let end = self.trace[self.seg].insns().len();

            // An empty segment is a gap; it counts as one instruction.
            if end == 0 {
                let Some(next) = self.trace.flow_next(self.seg) else {
                    break;
                };

                stride -= 1;
                steps += 1;

                self.seg = next;
                self.index = 0;
                continue;
            }

            // Advance as far as possible within this segment.
            let space = end - self.index;
            let adv = space.min(stride);
            stride -= adv;
            self.index += adv;
            steps += adv;

            // Move to the next segment once this one is exhausted.
            if self.index == end {
                match self.trace.flow_next(self.seg) {
                    Some(next) => {
                        self.seg = next;
                        self.index = 0;
                    }
                    None => {
                        // We stepped past the end; back up onto the last
                        // instruction.
                        self.index -= 1;
                        steps -= 1;
                        break;
                    }
                }
            }

            debug_assert!(adv > 0);
        }

        steps
    }

    /// Step back by at most `stride` instructions
    ///
    /// Returns the number of steps actually taken.
    pub fn prev(&mut self, mut stride: usize) -> usize {
        let mut steps = 0;

        while stride != 0 {
            // Move to the previous segment when at the start of this one.
            if self.index == 0 {
                let Some(prev) = self.trace.flow_prev(self.seg) else {
                    break;
                };

                self.seg = prev;
                self.index = self.trace[prev].insns().len();

                // An empty segment is a gap; it counts as one instruction.
                if self.index == 0 {
                    stride -= 1;
                    steps += 1;
                    continue;
                }
            }

            let adv = self.index.min(stride);
            stride -= adv;
            self.index -= adv;
            steps += adv;

            debug_assert!(adv > 0);
        }

        steps
    }

    /// Find the instruction with the given number
    ///
    /// Returns `None` if no instruction carries that number; gaps are
    /// skipped.
    pub fn find(trace: &'a Ftrace, number: u32) -> Option<Self> {
        let mut it = trace.end();
        let seg = loop {
            let id = it?;
            let seg = &trace[id];

            if !seg.is_gap() && seg.insn_offset() <= number {
                break id;
            }

            it = trace.flow_prev(id);
        };

        let end = trace[seg].insn_offset() + trace[seg].insns().len() as u32;
        if end <= number {
            return None;
        }

        Some(Self {
            trace,
            seg,
            index: (number - trace[seg].insn_offset()) as usize,
        })
    }
}

impl PartialEq for InsnCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for InsnCursor<'_> {}

impl PartialOrd for InsnCursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InsnCursor<'_> {
    /// Compare two cursor positions within the same trace
    ///
    /// Cursors compare by instruction number. Gaps carry number zero, so
    /// their position is taken from the segment's instruction offset, the
    /// number of the first instruction after the gap; a gap orders
    /// strictly before that instruction.
    fn cmp(&self, other: &Self) -> Ordering {
        let mut lnum = self.number();
        let mut rnum = other.number();

        if lnum == 0 && rnum == 0 {
            lnum = self.trace[self.seg].insn_offset();
            rnum = other.trace[other.seg].insn_offset();
        } else if lnum == 0 {
            lnum = self.trace[self.seg].insn_offset();
            if lnum == rnum {
                lnum -= 1;
            }
        } else if rnum == 0 {
            rnum = other.trace[other.seg].insn_offset();
            if rnum == lnum {
                rnum -= 1;
            }
        }

        lnum.cmp(&rnum)
    }
}
