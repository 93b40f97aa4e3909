// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Call cursors

use core::cmp::Ordering;

use crate::ftrace::Ftrace;
use crate::segment::{Segment, SegmentId};

/// A persistent call position
///
/// Like [`InsnPos`][super::InsnPos], but for call cursors. A position
/// without a segment denotes the end position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallPos {
    pub(crate) seg: Option<SegmentId>,
}

/// Cursor over function segments
///
/// In addition to the recorded segments, the cursor knows an end position
/// one past the chronologically last segment. A last segment that only
/// holds the current instruction does not represent executed code yet and
/// is skipped during iteration.
#[derive(Copy, Clone, Debug)]
pub struct CallCursor<'a> {
    trace: &'a Ftrace,
    seg: Option<SegmentId>,
}

impl<'a> CallCursor<'a> {
    /// Cursor at the chronologically first segment
    ///
    /// Returns `None` if there is no trace.
    pub fn begin(trace: &'a Ftrace) -> Option<Self> {
        let seg = trace.begin()?;
        Some(Self {
            trace,
            seg: Some(seg),
        })
    }

    /// Cursor at the end position
    ///
    /// Returns `None` if there is no trace.
    pub fn end(trace: &'a Ftrace) -> Option<Self> {
        trace.end()?;
        Some(Self { trace, seg: None })
    }

    /// Re-create a cursor from a saved position
    ///
    /// Returns `None` if the position does not exist in this trace.
    pub fn with_pos(trace: &'a Ftrace, pos: CallPos) -> Option<Self> {
        match pos.seg {
            Some(id) => {
                trace.get(id)?;
                Some(Self { trace, seg: Some(id) })
            }
            None => Self::end(trace),
        }
    }

    /// The persistent position of this cursor
    pub fn pos(&self) -> CallPos {
        CallPos { seg: self.seg }
    }

    /// The segment under the cursor, `None` at the end position
    pub fn get(&self) -> Option<&'a Segment> {
        self.seg.map(|id| &self.trace[id])
    }

    /// Identifier of the segment under the cursor
    pub fn segment_id(&self) -> Option<SegmentId> {
        self.seg
    }

    /// Number of the segment under the cursor
    ///
    /// The end position reports one more than the number of the last
    /// segment, unless that segment only holds the current instruction and
    /// is therefore skipped, in which case it reports that segment's
    /// number.
    pub fn number(&self) -> u32 {
        if let Some(id) = self.seg {
            return self.trace[id].number();
        }

        let Some(end) = self.trace.end() else {
            return 1;
        };

        if self.trace[end].insns().len() == 1 {
            self.trace[end].number()
        } else {
            self.trace[end].number() + 1
        }
    }

    /// Advance by at most `stride` segments
    ///
    /// Returns the number of steps actually taken.
    pub fn next(&mut self, stride: usize) -> usize {
        let mut steps = 0usize;
        let mut cur = self.seg;

        while let Some(id) = cur {
            let next = self.trace.flow_next(id);

            // Skip the last segment if it only holds the current
            // instruction; stepping over it is free.
            if next.is_none() && self.trace[id].insns().len() == 1 {
                steps = steps.wrapping_sub(1);
            }

            if stride == steps {
                break;
            }

            cur = next;
            steps = steps.wrapping_add(1);
        }

        self.seg = cur;
        steps
    }

    /// Step back by at most `stride` segments
    ///
    /// Returns the number of steps actually taken.
    pub fn prev(&mut self, stride: usize) -> usize {
        let mut steps = 0;
        let mut cur = self.seg;

        if cur.is_none() {
            let Some(mut end) = self.trace.end() else {
                return 0;
            };

            // Skip the last segment if it only holds the current
            // instruction.
            if self.trace[end].insns().len() == 1 {
                match self.trace.flow_prev(end) {
                    Some(prev) => end = prev,
                    None => return 0,
                }
            }

            cur = Some(end);
            steps += 1;
        }

        while steps < stride {
            let Some(id) = cur else {
                break;
            };

            match self.trace.flow_prev(id) {
                Some(prev) => {
                    cur = Some(prev);
                    steps += 1;
                }
                None => break,
            }
        }

        self.seg = cur;
        steps
    }

    /// Find the segment with the given number
    pub fn find(trace: &'a Ftrace, number: u32) -> Option<Self> {
        let mut it = trace.end();
        while let Some(id) = it {
            if trace[id].number() == number {
                return Some(Self {
                    trace,
                    seg: Some(id),
                });
            }

            it = trace.flow_prev(id);
        }

        None
    }
}

impl PartialEq for CallCursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CallCursor<'_> {}

impl PartialOrd for CallCursor<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CallCursor<'_> {
    /// Compare two cursor positions within the same trace
    fn cmp(&self, other: &Self) -> Ordering {
        self.number().cmp(&other.number())
    }
}
