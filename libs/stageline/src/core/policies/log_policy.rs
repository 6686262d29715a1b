// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Severity masks deciding whether a named component may log.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::core::error::StageError;

bitflags! {
    /// Log severities a component may emit, combinable with `|`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LogLevel: u8 {
        const INFO = 0b001;
        const WARNING = 0b010;
        const ERROR = 0b100;

        const ALL = Self::INFO.bits() | Self::WARNING.bits() | Self::ERROR.bits();
        const ERRORS_ONLY = Self::ERROR.bits();
        const NO_WARNINGS = Self::INFO.bits() | Self::ERROR.bits();
    }
}

impl LogLevel {
    pub const NONE: LogLevel = LogLevel::empty();
}

/// Immutable log gate attached to every loggable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogPolicy {
    allowed: LogLevel,
}

impl LogPolicy {
    pub const fn new(allowed: LogLevel) -> Self {
        Self { allowed }
    }

    pub fn allowed_mask(&self) -> LogLevel {
        self.allowed
    }

    /// Whether `level` may be emitted under this policy.
    #[inline]
    pub fn is_allowed(&self, level: LogLevel) -> bool {
        if self.allowed == LogLevel::ALL {
            return true;
        }
        if self.allowed.is_empty() {
            return false;
        }
        self.allowed.intersects(level)
    }

    pub const fn silent() -> Self {
        Self::new(LogLevel::NONE)
    }

    pub const fn infos_only() -> Self {
        Self::new(LogLevel::INFO)
    }

    pub const fn warnings_only() -> Self {
        Self::new(LogLevel::WARNING)
    }

    pub const fn errors_only() -> Self {
        Self::new(LogLevel::ERROR)
    }

    /// Compact tag used in topology reports: `[ALL]`, `[SILENT]`, `[IE]`...
    pub fn tag(&self) -> String {
        if self.allowed == LogLevel::ALL {
            return "[ALL]".to_string();
        }
        if self.allowed.is_empty() {
            return "[SILENT]".to_string();
        }
        let mut flags = String::new();
        if self.allowed.contains(LogLevel::INFO) {
            flags.push('I');
        }
        if self.allowed.contains(LogLevel::WARNING) {
            flags.push('W');
        }
        if self.allowed.contains(LogLevel::ERROR) {
            flags.push('E');
        }
        format!("[{flags}]")
    }
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self::new(LogLevel::ALL)
    }
}

impl fmt::Display for LogPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Parses `all`, `none`/`silent`, or a `|`-separated list of
/// `info`, `warning`, `error`.
impl FromStr for LogPolicy {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "all" => return Ok(Self::default()),
            "none" | "silent" => return Ok(Self::silent()),
            _ => {}
        }

        let mut mask = LogLevel::NONE;
        for part in normalized.split('|').map(str::trim) {
            mask |= match part {
                "info" => LogLevel::INFO,
                "warning" | "warn" => LogLevel::WARNING,
                "error" => LogLevel::ERROR,
                other => {
                    return Err(StageError::Settings(format!(
                        "unknown log level '{other}' in '{s}'"
                    )));
                }
            };
        }
        Ok(Self::new(mask))
    }
}
