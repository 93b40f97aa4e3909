// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Architecture oracles
//!
//! This module defines the [`Arch`] trait through which the engine asks an
//! architecture specific service about individual instructions, as well as
//! a number of adapters for constructing oracles.
//!
//! Oracle failures are never fatal: the trace builder demotes a failed
//! classification to [`Class::Other`] and a failed length lookup to zero,
//! turning the latter into a decode gap.

use core::fmt;

use crate::insn::Class;

/// An oracle answering questions about single instructions
pub trait Arch {
    /// Error type returned by the oracle
    type Error;

    /// Classify the instruction at the given address
    fn classify_insn(&mut self, pc: u64) -> Result<Class, Self::Error>;

    /// Determine the byte length of the instruction at the given address
    fn insn_length(&mut self, pc: u64) -> Result<u8, Self::Error>;
}

/// Classify an instruction, tolerating oracle failure
pub(crate) fn classify<A: Arch>(arch: &mut A, pc: u64) -> Class {
    arch.classify_insn(pc).unwrap_or(Class::Other)
}

/// Determine an instruction length, tolerating oracle failure
pub(crate) fn length<A: Arch>(arch: &mut A, pc: u64) -> u8 {
    arch.insn_length(pc).unwrap_or(0)
}

/// [`Arch`] adapter for a pair of [`FnMut`]s
///
/// This forwards [`classify_insn`][Arch::classify_insn] and
/// [`insn_length`][Arch::insn_length] to the wrapped [`FnMut`]s.
#[derive(Copy, Clone, Debug)]
pub struct Func<C, L, E>
where
    C: FnMut(u64) -> Result<Class, E>,
    L: FnMut(u64) -> Result<u8, E>,
{
    classify: C,
    length: L,
    phantom: core::marker::PhantomData<E>,
}

impl<C, L, E> Arch for Func<C, L, E>
where
    C: FnMut(u64) -> Result<Class, E>,
    L: FnMut(u64) -> Result<u8, E>,
{
    type Error = E;

    fn classify_insn(&mut self, pc: u64) -> Result<Class, Self::Error> {
        (self.classify)(pc)
    }

    fn insn_length(&mut self, pc: u64) -> Result<u8, Self::Error> {
        (self.length)(pc)
    }
}

/// Create a [`Func`] [`Arch`] from a classification and a length [`FnMut`]
pub fn from_fn<C, L, E>(classify: C, length: L) -> Func<C, L, E>
where
    C: FnMut(u64) -> Result<Class, E>,
    L: FnMut(u64) -> Result<u8, E>,
{
    Func {
        classify,
        length,
        phantom: Default::default(),
    }
}

/// An oracle that does not know any instructions
#[derive(Copy, Clone, Default, Debug)]
pub struct Empty;

impl Arch for Empty {
    type Error = NoInstruction;

    fn classify_insn(&mut self, _: u64) -> Result<Class, Self::Error> {
        Err(NoInstruction)
    }

    fn insn_length(&mut self, _: u64) -> Result<u8, Self::Error> {
        Err(NoInstruction)
    }
}

/// An error type expressing absence of an instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct NoInstruction;

impl core::error::Error for NoInstruction {}

impl fmt::Display for NoInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no instruction at this address")
    }
}
