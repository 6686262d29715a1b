// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline state machine types.
//!
//! ```text
//! ┌──────┐ start() ┌─────────┐  pause()  ┌────────┐
//! │ Idle │────────►│ Running │──────────►│ Paused │
//! └──┬───┘         └────┬────┘◄──────────┴───┬────┘
//!    │                  │       resume()     │
//!    │                  │ stop()             │
//!    │                  ▼                    │
//!    └────────────►┌────────────┐◄───────────┘
//!                  │ Terminated │  (absorbing)
//!                  └────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::StageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
    Paused,
    Terminated,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Paused => "PAUSED",
            Self::Terminated => "TERMINATED",
        }
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a pipeline decides whether a `step()` executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Execute exactly one step, then terminate.
    Single,
    /// Execute on every step.
    #[default]
    Loop,
    /// Execute only after an edge-triggered `trigger()`.
    Conditional,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Loop => "LOOP",
            Self::Conditional => "CONDITIONAL",
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineMode {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "loop" => Ok(Self::Loop),
            "conditional" => Ok(Self::Conditional),
            other => Err(StageError::Configuration(format!(
                "unknown pipeline mode '{other}'"
            ))),
        }
    }
}
