// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Per-thread trace state
//!
//! Each traced thread owns exactly one [`ThreadTrace`]. Cross-thread
//! access is not a concern of the engine; callers keep the state with
//! whatever represents a thread on their side.

use crate::cursor::{CallPos, InsnCursor, InsnPos};
use crate::ftrace::Ftrace;

/// A saved instruction cursor range
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InsnRange {
    /// First position of the range
    pub begin: InsnPos,
    /// One past the last position of the range
    pub end: InsnPos,
}

/// A saved call cursor range
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CallRange {
    /// First position of the range
    pub begin: CallPos,
    /// One past the last position of the range
    pub end: CallPos,
}

/// Branch trace state of a single thread
///
/// `H` is the tracing handle of the producer the thread is traced by.
pub struct ThreadTrace<H> {
    trace: Ftrace,
    pub(crate) target: Option<H>,
    replay: Option<InsnPos>,
    insn_history: Option<InsnRange>,
    call_history: Option<CallRange>,
}

impl<H> ThreadTrace<H> {
    /// Create the state for a thread that is not traced yet
    pub fn new() -> Self {
        Self {
            trace: Ftrace::new(),
            target: None,
            replay: None,
            insn_history: None,
            call_history: None,
        }
    }

    /// The reconstructed trace
    pub fn trace(&self) -> &Ftrace {
        &self.trace
    }

    pub(crate) fn trace_mut(&mut self) -> &mut Ftrace {
        &mut self.trace
    }

    /// Check whether tracing is enabled for this thread
    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Check whether the thread is replaying its execution history
    pub fn is_replaying(&self) -> bool {
        self.replay.is_some()
    }

    /// The current replay position, if the thread is replaying
    pub fn replay(&self) -> Option<InsnPos> {
        self.replay
    }

    /// Set or clear the replay position
    ///
    /// While a replay position is set, fetching new trace is suppressed.
    pub fn set_replay(&mut self, replay: Option<InsnPos>) {
        self.replay = replay;
    }

    /// The saved instruction history range
    pub fn insn_history(&self) -> Option<InsnRange> {
        self.insn_history
    }

    /// Save an instruction history range
    pub fn set_insn_history(&mut self, begin: InsnPos, end: InsnPos) {
        self.insn_history = Some(InsnRange { begin, end });
    }

    /// The saved call history range
    pub fn call_history(&self) -> Option<CallRange> {
        self.call_history
    }

    /// Save a call history range
    pub fn set_call_history(&mut self, begin: CallPos, end: CallPos) {
        self.call_history = Some(CallRange { begin, end });
    }

    /// Check whether the trace holds any executed instructions
    ///
    /// A trace that only contains the current instruction is considered
    /// empty.
    pub fn is_empty(&self) -> bool {
        match (InsnCursor::begin(&self.trace), InsnCursor::end(&self.trace)) {
            (Some(begin), Some(end)) => begin == end,
            _ => true,
        }
    }

    /// Discard the trace along with all saved positions
    pub fn clear(&mut self) {
        self.trace.clear();
        self.clear_history();
    }

    /// Discard saved cursor positions, keeping the trace
    ///
    /// Saved positions may refer to instructions that do not survive a
    /// rebuild, so every rebuild discards them.
    pub(crate) fn clear_history(&mut self) {
        self.insn_history = None;
        self.call_history = None;
        self.replay = None;
    }
}

impl<H> Default for ThreadTrace<H> {
    fn default() -> Self {
        Self::new()
    }
}
