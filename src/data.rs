// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Raw branch trace data

use alloc::vec::Vec;

use crate::config::Format;

/// One straight-line run of executed code
///
/// `end` is the address of the block's last instruction, not one past it.
/// A block covering a single instruction therefore has `begin == end`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Block {
    /// Address of the first instruction in the block
    pub begin: u64,
    /// Address of the last instruction in the block
    pub end: u64,
}

/// Raw trace data as delivered by a producer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Data {
    /// No trace data
    #[default]
    None,
    /// A block list, newest block first
    Bts(Vec<Block>),
}

impl Data {
    /// The format of this trace data
    pub fn format(&self) -> Format {
        match self {
            Self::None => Format::None,
            Self::Bts(_) => Format::Bts,
        }
    }

    /// Check whether there is any trace data at all
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Bts(blocks) => blocks.is_empty(),
        }
    }
}
