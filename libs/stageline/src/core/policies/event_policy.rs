// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::StageError;

/// Basic handling rule for one event topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRule {
    /// Log the publish, then dispatch.
    #[default]
    Normal,
    /// Dispatch without logging (high-frequency topics).
    Silent,
    /// Neither log nor dispatch.
    Drop,
}

/// Per-topic policy applied by the event router before routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventPolicy {
    rule: EventRule,
}

impl EventPolicy {
    pub const fn normal() -> Self {
        Self {
            rule: EventRule::Normal,
        }
    }

    pub const fn silent() -> Self {
        Self {
            rule: EventRule::Silent,
        }
    }

    pub const fn drop() -> Self {
        Self {
            rule: EventRule::Drop,
        }
    }

    pub fn rule(&self) -> EventRule {
        self.rule
    }

    /// No logging for this topic (SILENT or DROP).
    pub fn is_mute(&self) -> bool {
        matches!(self.rule, EventRule::Silent | EventRule::Drop)
    }

    pub fn is_dropped(&self) -> bool {
        self.rule == EventRule::Drop
    }
}

impl FromStr for EventPolicy {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::normal()),
            "silent" | "mute" => Ok(Self::silent()),
            "drop" => Ok(Self::drop()),
            other => Err(StageError::Settings(format!("unknown event policy '{other}'"))),
        }
    }
}
