// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! # Function-call trace reconstruction from hardware branch trace streams
//!
//! A hardware branch trace records the basic blocks a thread executed,
//! newest first, and nothing else: no functions, no call nesting, no
//! cooperation from the traced program. This crate folds such a block
//! stream into a function-call trace: a chronological chain of function
//! segments carrying per-instruction records, linked across nested calls
//! and annotated with stack depth levels. On top of that it provides
//! cursors over instructions and over calls, incremental trace extension
//! with stitching across successive stops, and recovery around decode
//! gaps.
//!
//! The crate deliberately knows nothing about targets, instruction sets or
//! symbol tables. Those arrive through three traits: [`Target`] delivers
//! raw trace data, [`arch::Arch`] classifies instructions and reports
//! their lengths, and [`symbol::Symbolizer`] maps addresses to functions.
//! A [`Session`] couples the three and drives per-thread tracing through
//! [`ThreadTrace`] values.
//!
//! # no_std
//!
//! This crate does not depend on the standard library, only on `core` and
//! `alloc`.
//!
//! # Example
//!
//! The following example traces a thread through a canned block list
//! covering a function call: a run from `0x100` ending in a call at
//! `0x10c`, followed by a run of the callee at `0x200`.
//!
//! ```
//! use bts_ftrace::symbol::{FuncSym, MinSym, Symbolizer};
//! use bts_ftrace::{arch, cursor};
//! use bts_ftrace::{Block, Class, Config, Data, Format, ReadMode, Session, Target, ThreadTrace, Tid};
//!
//! // A producer would normally talk to a debug stub; this one replays a
//! // canned block list, newest block first.
//! struct Canned(Option<Data>);
//!
//! impl Target for Canned {
//!     type Handle = ();
//!     type Error = &'static str;
//!
//!     fn supports(&self, format: Format) -> bool {
//!         format == Format::Bts
//!     }
//!
//!     fn enable(&mut self, _: Tid, _: &Config) -> Result<(), &'static str> {
//!         Ok(())
//!     }
//!
//!     fn disable(&mut self, _: ()) {}
//!     fn teardown(&mut self, _: ()) {}
//!
//!     fn conf(&self, _: &()) -> Option<&Config> {
//!         None
//!     }
//!
//!     fn read(&mut self, _: &mut (), _: ReadMode) -> Result<Data, &'static str> {
//!         self.0.take().ok_or("no more trace")
//!     }
//! }
//!
//! struct NoSymbols;
//!
//! impl Symbolizer for NoSymbols {
//!     fn function_at(&mut self, _: u64) -> Option<FuncSym> {
//!         None
//!     }
//!
//!     fn minimal_symbol_at(&mut self, _: u64) -> Option<MinSym> {
//!         None
//!     }
//!
//!     fn function_entry_pc(&mut self, _: u64) -> Option<u64> {
//!         None
//!     }
//! }
//!
//! // Every instruction is four bytes; the one at 0x10c calls.
//! let arch = arch::from_fn(
//!     |pc| {
//!         Ok::<_, arch::NoInstruction>(if pc == 0x10c { Class::Call } else { Class::Other })
//!     },
//!     |_| Ok(4),
//! );
//!
//! let blocks = vec![
//!     Block { begin: 0x200, end: 0x204 },
//!     Block { begin: 0x100, end: 0x10c },
//! ];
//! let mut session = Session::new(Canned(Some(Data::Bts(blocks))), arch, NoSymbols);
//! let mut thread = ThreadTrace::new();
//!
//! let conf = Config { format: Format::Bts, ..Default::default() };
//! session.enable(&mut thread, 0, 0x100, &conf).unwrap();
//! session.fetch(&mut thread).unwrap();
//!
//! // The call opened a second segment one level below the first.
//! let trace = thread.trace();
//! assert_eq!(trace.len(), 2);
//! let callee = trace.end().unwrap();
//! assert_eq!(trace[callee].up(), trace.begin());
//! assert_eq!(trace[callee].level() + trace.level_offset(), 1);
//!
//! // Iterate the executed instructions; the current one is excluded.
//! let mut pcs = vec![];
//! let mut it = cursor::InsnCursor::begin(trace).unwrap();
//! let end = cursor::InsnCursor::end(trace).unwrap();
//! while it < end {
//!     pcs.push(it.get().unwrap().pc);
//!     it.next(1);
//! }
//! assert_eq!(pcs, [0x100, 0x104, 0x108, 0x10c, 0x200]);
//! ```
#![no_std]

extern crate alloc;

pub mod arch;
pub mod config;
pub mod cursor;
pub mod data;
pub mod ftrace;
pub mod insn;
pub mod segment;
pub mod session;
pub mod symbol;
pub mod target;
pub mod thread;
pub mod wire;

mod builder;
mod stitch;

#[cfg(test)]
mod tests;

pub use config::{BtsConfig, Config, Format};
pub use data::{Block, Data};
pub use ftrace::Ftrace;
pub use insn::{Class, Insn};
pub use session::{Error, Session};
pub use target::{ReadMode, Target, Tid};
pub use thread::ThreadTrace;
