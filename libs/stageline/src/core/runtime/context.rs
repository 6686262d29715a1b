// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-pipeline runtime context: step counters plus a type-keyed blackboard
//! that strategies use to share non-streaming state.

use std::fmt;

use crate::core::frames::{Component, ComponentMap};

pub struct PipelineContext {
    frame_index: u64,
    delta_time: f64,
    blackboard: ComponentMap,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            delta_time: 0.0,
            blackboard: ComponentMap::new(),
        }
    }

    /// Number of executed steps so far.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Seconds between the starts of the last two executed steps.
    #[inline]
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    pub(crate) fn advance(&mut self, delta_time: f64) {
        self.frame_index += 1;
        self.delta_time = delta_time.max(0.0);
    }

    /// Blackboard entry for `T`, created from `Default` on first access.
    pub fn get_data<T: Component + Default>(&mut self) -> &mut T {
        self.blackboard.entry::<T>().or_insert_with(T::default)
    }

    pub fn get_data_ref<T: Component>(&self) -> Option<&T> {
        self.blackboard.get::<T>()
    }

    /// Stores `value`, replacing any previous entry of the same type.
    pub fn set_data<T: Component>(&mut self, value: T) {
        self.blackboard.insert(value);
    }

    pub fn has_data<T: Component>(&self) -> bool {
        self.blackboard.contains::<T>()
    }

    pub fn clear(&mut self) {
        self.frame_index = 0;
        self.delta_time = 0.0;
        self.blackboard.clear();
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("frame_index", &self.frame_index)
            .field("delta_time", &self.delta_time)
            .field("blackboard_len", &self.blackboard.len())
            .finish()
    }
}
