// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

/// Ascending delivery tiers for router publishes.
///
/// | Tier | Delivery |
/// |------|----------|
/// | [`Deferred`] | queued, flushed at the end of the step |
/// | [`Immediate`] | synchronous dispatch |
/// | [`Interrupt`] | synchronous dispatch, then the current step stops after the running strategy |
/// | [`Critical`] | never dispatched; escalated to the executor |
///
/// [`Deferred`]: EventPriority::Deferred
/// [`Immediate`]: EventPriority::Immediate
/// [`Interrupt`]: EventPriority::Interrupt
/// [`Critical`]: EventPriority::Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum EventPriority {
    #[default]
    Deferred = 10,
    Immediate = 20,
    Interrupt = 30,
    Critical = 40,
}

impl EventPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deferred => "DEFERRED",
            Self::Immediate => "IMMEDIATE",
            Self::Interrupt => "INTERRUPT",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for EventPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
