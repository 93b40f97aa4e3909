// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Function segments
//!
//! A function segment covers one contiguous residence in one function
//! instance. A function that is interrupted by a nested call and resumed by
//! the matching return is represented by multiple segments belonging to the
//! same instance.

use alloc::vec::Vec;
use core::fmt;

use crate::insn::Insn;
use crate::symbol::{FuncSym, MinSym};

/// Stable identifier of a [`Segment`] within its trace
///
/// Identifiers stay valid as long as the trace is not cleared or rebuilt.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub(crate) u32);

impl SegmentId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Decode errors materialized as gaps in the trace
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GapCode {
    /// A block ended before its last instruction was reached
    Overflow,
    /// The length of an instruction could not be determined
    InsnSize,
}

impl fmt::Display for GapCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow => write!(f, "block overflow"),
            Self::InsnSize => write!(f, "unknown instruction size"),
        }
    }
}

/// How a segment's caller link was established
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    /// The caller link is a regular call, or absent
    pub const NONE: Flags = Flags(0);
    /// The caller link was taken from a tail call
    ///
    /// The "callee" continues on the caller's stack frame.
    pub const UP_LINKS_TO_TAILCALL: Flags = Flags(1 << 0);
    /// The caller link was created retroactively for a return whose call
    /// the trace never contained
    ///
    /// Such a link points at the segment the function returned to, which
    /// is chronologically later than the segment carrying the flag.
    pub const UP_LINKS_TO_RET: Flags = Flags(1 << 1);

    /// Check whether all flags in `other` are contained in `self`
    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Check whether no flag is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl core::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

/// One contiguous residence in one function instance
#[derive(Clone, Debug)]
pub struct Segment {
    pub(crate) number: u32,
    pub(crate) insn_offset: u32,
    pub(crate) insns: Vec<Insn>,
    pub(crate) msym: Option<MinSym>,
    pub(crate) sym: Option<FuncSym>,
    pub(crate) instance_prev: Option<SegmentId>,
    pub(crate) instance_next: Option<SegmentId>,
    pub(crate) up: Option<SegmentId>,
    pub(crate) flags: Flags,
    pub(crate) level: i32,
    pub(crate) errcode: Option<GapCode>,
}

impl Segment {
    pub(crate) fn new(msym: Option<MinSym>, sym: Option<FuncSym>) -> Self {
        Self {
            number: 1,
            insn_offset: 1,
            insns: Vec::new(),
            msym,
            sym,
            instance_prev: None,
            instance_next: None,
            up: None,
            flags: Flags::NONE,
            level: 0,
            errcode: None,
        }
    }

    /// Chronological index of this segment, starting at one
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Global number of this segment's first instruction, starting at one
    pub fn insn_offset(&self) -> u32 {
        self.insn_offset
    }

    /// The instructions executed within this segment
    ///
    /// Empty exactly for gaps.
    pub fn insns(&self) -> &[Insn] {
        &self.insns
    }

    /// Minimal symbol of the function, if known
    pub fn msym(&self) -> Option<&MinSym> {
        self.msym.as_ref()
    }

    /// Full symbol of the function, if known
    pub fn sym(&self) -> Option<&FuncSym> {
        self.sym.as_ref()
    }

    /// Preceding segment of the same function instance
    pub fn instance_prev(&self) -> Option<SegmentId> {
        self.instance_prev
    }

    /// Following segment of the same function instance
    pub fn instance_next(&self) -> Option<SegmentId> {
        self.instance_next
    }

    /// The caller of this function instance
    pub fn up(&self) -> Option<SegmentId> {
        self.up
    }

    /// How the caller link was established
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Raw stack depth of this segment
    ///
    /// May be negative; add the trace's level offset to obtain the
    /// normalized depth.
    pub fn level(&self) -> i32 {
        self.level
    }

    /// The decode error this segment stands in for, if it is a gap
    pub fn errcode(&self) -> Option<GapCode> {
        self.errcode
    }

    /// Check whether this segment is a gap
    pub fn is_gap(&self) -> bool {
        self.errcode.is_some()
    }

    /// Printable name of the function this segment resides in
    ///
    /// Never empty; unknown functions print as `<unknown>`.
    pub fn function_name(&self) -> &str {
        if let Some(sym) = &self.sym {
            return sym.name();
        }
        if let Some(msym) = &self.msym {
            return msym.name();
        }
        "<unknown>"
    }
}
