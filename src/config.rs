// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Trace configuration
//!
//! A [`Config`] is handed to the trace producer when tracing is enabled
//! and describes the requested trace format along with format specific
//! settings.
//!
//! # Serde
//!
//! If the `serde` feature is enabled, these types support
//! (de)serialization.

use core::fmt;

/// Branch trace format
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    /// No or empty trace
    #[default]
    None,
    /// Block trace: a list of executed basic blocks, newest first
    Bts,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Bts => write!(f, "bts"),
        }
    }
}

/// Requested tracing configuration
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Trace format to request from the producer
    pub format: Format,
    /// Block trace specific settings
    pub bts: BtsConfig,
}

/// Block trace settings
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BtsConfig {
    /// Requested trace buffer size in bytes
    ///
    /// Zero leaves the choice to the producer.
    pub size: u32,
}
