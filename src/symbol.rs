// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Symbol lookup
//!
//! The engine identifies functions through an external symbol service. Both
//! symbol flavours may independently be absent for any given address;
//! function identity is decided by [`switched`] over whatever information
//! is available.

use alloc::rc::Rc;
use core::fmt;

/// A minimal symbol covering an address
///
/// Minimal symbols come from the linker's view of the program. Two minimal
/// symbols denote the same function if their linkage names are equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinSym {
    name: Rc<str>,
}

impl MinSym {
    /// Create a new minimal symbol from its linkage name
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// Retrieve the linkage name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for MinSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A full symbol backed by debug information
///
/// Two full symbols denote the same function if both their linkage names
/// and their source files are equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FuncSym {
    name: Rc<str>,
    filename: Rc<str>,
}

impl FuncSym {
    /// Create a new full symbol from its linkage name and source file
    pub fn new(name: impl Into<Rc<str>>, filename: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
        }
    }

    /// Retrieve the linkage name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieve the source file the function is defined in
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

impl fmt::Display for FuncSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A source of symbol information
pub trait Symbolizer {
    /// Full symbol of the function containing the given address
    fn function_at(&mut self, pc: u64) -> Option<FuncSym>;

    /// Minimal symbol covering the given address
    fn minimal_symbol_at(&mut self, pc: u64) -> Option<MinSym>;

    /// Entry address of the function containing the given address
    fn function_entry_pc(&mut self, pc: u64) -> Option<u64>;
}

/// Symbol information resolved for a single address
#[derive(Clone, Debug, Default)]
pub(crate) struct Resolved {
    pub msym: Option<MinSym>,
    pub sym: Option<FuncSym>,
}

/// Check whether two symbol pairs denote different functions
///
/// A pair of symbols only witnesses a function change if the respective
/// flavour is present on both sides. Losing or gaining symbol information
/// entirely also counts as a change.
pub(crate) fn switched(
    old_msym: Option<&MinSym>,
    old_sym: Option<&FuncSym>,
    msym: Option<&MinSym>,
    sym: Option<&FuncSym>,
) -> bool {
    if let (Some(old), Some(new)) = (old_msym, msym) {
        if old.name() != new.name() {
            return true;
        }
    }

    if let (Some(old), Some(new)) = (old_sym, sym) {
        if old.name() != new.name() || old.filename() != new.filename() {
            return true;
        }
    }

    let had = old_msym.is_some() || old_sym.is_some();
    let has = msym.is_some() || sym.is_some();
    had != has
}

const CACHE_LEN: usize = 16;

/// A memoizing wrapper around a [`Symbolizer`]
///
/// Symbols are resolved once per traced instruction. The cache keeps the
/// most recently resolved addresses so loops and straight line code do not
/// hammer the underlying service.
#[derive(Clone, Debug)]
pub struct Cache<S> {
    inner: S,
    addresses: [Option<u64>; CACHE_LEN],
    resolved: [Option<Resolved>; CACHE_LEN],
}

impl<S> Cache<S> {
    /// Create a new, empty cache around the given [`Symbolizer`]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            addresses: [None; CACHE_LEN],
            resolved: core::array::from_fn(|_| None),
        }
    }

    /// Retrieve a reference to the wrapped [`Symbolizer`]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Extract the wrapped [`Symbolizer`]
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Symbolizer> Cache<S> {
    /// Resolve both symbol flavours for the given address
    pub(crate) fn resolve(&mut self, pc: u64) -> Resolved {
        for (i, addr) in self.addresses.iter().enumerate() {
            if *addr == Some(pc) {
                if let Some(res) = &self.resolved[i] {
                    return res.clone();
                }
            }
        }

        let res = Resolved {
            msym: self.inner.minimal_symbol_at(pc),
            sym: self.inner.function_at(pc),
        };

        // evict the least recently stored entry
        for i in 0..CACHE_LEN - 1 {
            self.addresses[i] = self.addresses[i + 1];
            self.resolved[i] = self.resolved[i + 1].take();
        }
        self.addresses[CACHE_LEN - 1] = Some(pc);
        self.resolved[CACHE_LEN - 1] = Some(res.clone());

        res
    }

    /// Entry address of the function containing the given address
    pub(crate) fn entry_pc(&mut self, pc: u64) -> Option<u64> {
        self.inner.function_entry_pc(pc)
    }
}
