// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Everything a strategy author usually needs in one import.

pub use crate::core::error::{Result, StageError};
pub use crate::core::frames::{Component, ComponentTag, Frame};
pub use crate::core::logging::Loggable;
pub use crate::core::policies::{EventPolicy, LogLevel, LogPolicy};
pub use crate::core::pubsub::{EventPayload, EventPriority, EventTopic, SystemEvent};
pub use crate::core::runtime::{PipelineContext, PipelineMode, PipelineRef, PipelineState};
pub use crate::core::traits::{Strategy, StrategyHandle, StrategyOutcome};
