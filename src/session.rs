// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace session control
//!
//! A [`Session`] couples a trace [`Target`] with the [`Arch`] oracle and
//! the [`Symbolizer`] and drives per-thread tracing: enabling, fetching
//! and rebuilding traces, and disabling.

use alloc::vec;
use core::fmt;

use log::debug;

use crate::arch::Arch;
use crate::builder;
use crate::config::Config;
use crate::data::{Block, Data};
use crate::stitch;
use crate::symbol::{Cache, Symbolizer};
use crate::target::{ReadMode, Target, Tid};
use crate::thread::ThreadTrace;

/// Session errors
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// The producer does not support the requested trace format
    NotSupported,
    /// The producer failed to enable tracing
    Enable(E),
    /// All attempts to read trace data failed
    Read(E),
}

impl<E> core::error::Error for Error<E>
where
    E: fmt::Debug + core::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::NotSupported => None,
            Self::Enable(inner) | Self::Read(inner) => Some(inner),
        }
    }
}

impl<E> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => write!(f, "target does not support branch tracing"),
            Self::Enable(_) => write!(f, "failed to enable branch tracing"),
            Self::Read(_) => write!(f, "failed to read branch trace"),
        }
    }
}

/// Per-thread trace control
pub struct Session<T, A, S> {
    target: T,
    arch: A,
    symbols: Cache<S>,
}

impl<T, A, S> Session<T, A, S> {
    /// Create a new session from the external collaborators
    pub fn new(target: T, arch: A, symbolizer: S) -> Self {
        Self {
            target,
            arch,
            symbols: Cache::new(symbolizer),
        }
    }

    /// The trace producer
    pub fn target(&self) -> &T {
        &self.target
    }

    /// The trace producer
    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// The symbol cache
    pub fn symbols(&self) -> &Cache<S> {
        &self.symbols
    }
}

impl<T: Target, A: Arch, S: Symbolizer> Session<T, A, S> {
    /// Enable tracing for a thread
    ///
    /// Idempotent: enabling an already enabled thread does nothing. `pc`
    /// is the thread's current program counter; on success the trace is
    /// seeded with it so that iteration is defined immediately.
    pub fn enable(
        &mut self,
        th: &mut ThreadTrace<T::Handle>,
        tid: Tid,
        pc: u64,
        conf: &Config,
    ) -> Result<(), Error<T::Error>> {
        if th.target.is_some() {
            return Ok(());
        }

        if !self.target.supports(conf.format) {
            return Err(Error::NotSupported);
        }

        debug!("enable thread {tid}");
        th.target = Some(self.target.enable(tid, conf).map_err(Error::Enable)?);

        // Record the current PC so the trace starts where we enabled it.
        let data = Data::Bts(vec![Block { begin: pc, end: pc }]);
        builder::compute(th, &data, &mut self.arch, &mut self.symbols);

        Ok(())
    }

    /// The configuration a thread's tracing was enabled with
    ///
    /// Returns `None` if the thread is not traced.
    pub fn conf<'a>(&'a self, th: &'a ThreadTrace<T::Handle>) -> Option<&'a Config> {
        th.target.as_ref().and_then(|handle| self.target.conf(handle))
    }

    /// Fetch trace data and rebuild the thread's trace
    ///
    /// A silent no-op if the thread is not traced or currently replaying.
    /// Prefers a delta read stitched onto the existing trace; a delta that
    /// cannot be read or stitched falls back to reading the new trace, and
    /// finally to discarding everything and reading the full trace.
    pub fn fetch(&mut self, th: &mut ThreadTrace<T::Handle>) -> Result<(), Error<T::Error>> {
        let Some(mut handle) = th.target.take() else {
            return Ok(());
        };

        // There is no way to get new trace while replaying. A delta read
        // would also be relative to the replay position rather than the
        // last stop.
        if th.is_replaying() {
            th.target = Some(handle);
            return Ok(());
        }

        let res = self.fetch_enabled(&mut handle, th);
        th.target = Some(handle);
        res
    }

    fn fetch_enabled(
        &mut self,
        handle: &mut T::Handle,
        th: &mut ThreadTrace<T::Handle>,
    ) -> Result<(), Error<T::Error>> {
        debug!("fetch");

        let data = if th.trace().end().is_some() {
            // Try to extend the trace we already have.
            let mut data = None;
            if let Ok(mut delta) = self.target.read(handle, ReadMode::Delta) {
                if stitch::stitch(&mut delta, th).is_ok() {
                    data = Some(delta);
                }
            }

            // No usable delta. Try the new trace; if there is any, discard
            // what we have in its favour.
            if data.is_none() {
                if let Ok(new) = self.target.read(handle, ReadMode::New) {
                    if !new.is_empty() {
                        th.clear();
                    }
                    data = Some(new);
                }
            }

            match data {
                Some(data) => data,
                None => {
                    // Start over with a full read.
                    th.clear();
                    self.target
                        .read(handle, ReadMode::All)
                        .map_err(Error::Read)?
                }
            }
        } else {
            self.target
                .read(handle, ReadMode::All)
                .map_err(Error::Read)?
        };

        if !data.is_empty() {
            // Saved cursor positions may refer to pruned instructions.
            th.clear_history();
            builder::compute(th, &data, &mut self.arch, &mut self.symbols);
        }

        Ok(())
    }

    /// Stop tracing a thread and discard its trace
    ///
    /// A no-op if the thread is not traced.
    pub fn disable(&mut self, th: &mut ThreadTrace<T::Handle>) {
        let Some(handle) = th.target.take() else {
            return;
        };

        debug!("disable");
        self.target.disable(handle);
        th.clear();
    }

    /// Discard the tracing state of a thread that is going away
    ///
    /// A no-op if the thread is not traced.
    pub fn teardown(&mut self, th: &mut ThreadTrace<T::Handle>) {
        let Some(handle) = th.target.take() else {
            return;
        };

        debug!("teardown");
        self.target.teardown(handle);
        th.clear();
    }
}
