// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Cursors over the reconstructed trace
//!
//! Cursors are borrowed views: they cannot outlive a rebuild of the trace
//! they iterate, which the borrow checker enforces. To keep a position
//! across rebuilds, store the cursor's [`pos`][insn::InsnCursor::pos] (a
//! plain value) or its number, and re-seat it afterwards via
//! [`find`][insn::InsnCursor::find].

pub mod call;
pub mod insn;

pub use call::{CallCursor, CallPos};
pub use insn::{InsnCursor, InsnPos};
