// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace producers
//!
//! The [`Target`] trait abstracts over whatever actually records branch
//! traces for a thread, typically the stub controlling the traced process.
//! The engine itself never talks to hardware.

use crate::config::{Config, Format};
use crate::data::Data;

/// Identifier of a thread known to the trace producer
pub type Tid = u32;

/// Amount of trace to read
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// The producer's entire trace buffer
    All,
    /// Trace recorded since the last read
    New,
    /// Trace recorded since the last stop
    Delta,
}

/// A producer of branch trace data
pub trait Target {
    /// Per-thread tracing handle
    type Handle;

    /// Error reported by the producer
    type Error;

    /// Check whether the producer can deliver the given trace format
    fn supports(&self, format: Format) -> bool;

    /// Start tracing the given thread
    fn enable(&mut self, tid: Tid, conf: &Config) -> Result<Self::Handle, Self::Error>;

    /// Stop tracing and release the handle
    fn disable(&mut self, handle: Self::Handle);

    /// Release the handle of a thread that is going away
    ///
    /// Unlike [`disable`][Self::disable], the thread may already be gone;
    /// the producer must only drop its own state.
    fn teardown(&mut self, handle: Self::Handle);

    /// The configuration tracing was actually enabled with
    ///
    /// This may differ from the requested configuration, e.g. in the
    /// buffer size the producer ended up allocating.
    fn conf(&self, handle: &Self::Handle) -> Option<&Config>;

    /// Read trace data for the given thread
    fn read(&mut self, handle: &mut Self::Handle, mode: ReadMode) -> Result<Data, Self::Error>;
}
