// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Construction-time configuration for a [`Pipeline`](super::Pipeline).

use std::fmt;
use std::time::Duration;

use crate::core::policies::{EventPolicy, LogPolicy};
use crate::core::pubsub::{EventTopic, RouterFactory};
use crate::core::traits::StrategyHandle;

use super::state::PipelineMode;

pub const DEFAULT_MAX_FPS: f64 = 60.0;

/// Step interval for `max_fps`. `None` when the rate is not positive or so
/// small that the interval overflows a [`Duration`].
pub fn frame_interval(max_fps: f64) -> Option<Duration> {
    if !(max_fps.is_finite() && max_fps > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / max_fps).ok()
}

#[derive(Clone)]
pub struct PipelineConfig {
    pub name: String,
    pub mode: PipelineMode,
    /// Target step rate, used for frame-drop warnings and throttling.
    pub max_fps: f64,
    /// Sleep out the rest of the frame interval after a fast step.
    pub enable_fps_control: bool,
    /// Warn on frame drops and interrupted frames.
    pub enable_profiling: bool,
    pub log_policy: LogPolicy,
    pub strategies: Vec<StrategyHandle>,
    /// Required. Building a pipeline without one fails.
    pub router_factory: Option<RouterFactory>,
    pub event_policies: Vec<(EventTopic, EventPolicy)>,
}

impl PipelineConfig {
    pub fn builder(name: impl Into<String>) -> PipelineConfigBuilder {
        PipelineConfigBuilder::new(name)
    }

    /// Step interval implied by `max_fps`. See [`frame_interval`].
    pub fn target_interval(&self) -> Option<Duration> {
        frame_interval(self.max_fps)
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("max_fps", &self.max_fps)
            .field("enable_fps_control", &self.enable_fps_control)
            .field("enable_profiling", &self.enable_profiling)
            .field("log_policy", &self.log_policy)
            .field("strategies", &self.strategies)
            .field("router_factory", &self.router_factory.is_some())
            .field("event_policies", &self.event_policies)
            .finish()
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: PipelineConfig {
                name: name.into(),
                mode: PipelineMode::Loop,
                max_fps: DEFAULT_MAX_FPS,
                enable_fps_control: false,
                enable_profiling: false,
                log_policy: LogPolicy::default(),
                strategies: Vec::new(),
                router_factory: None,
                event_policies: Vec::new(),
            },
        }
    }

    pub fn mode(mut self, mode: PipelineMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn max_fps(mut self, max_fps: f64) -> Self {
        self.config.max_fps = max_fps;
        self
    }

    pub fn fps_control(mut self, enabled: bool) -> Self {
        self.config.enable_fps_control = enabled;
        self
    }

    pub fn profiling(mut self, enabled: bool) -> Self {
        self.config.enable_profiling = enabled;
        self
    }

    pub fn log_policy(mut self, policy: LogPolicy) -> Self {
        self.config.log_policy = policy;
        self
    }

    pub fn strategy(mut self, strategy: impl Into<StrategyHandle>) -> Self {
        self.config.strategies.push(strategy.into());
        self
    }

    pub fn strategies(mut self, strategies: impl IntoIterator<Item = StrategyHandle>) -> Self {
        self.config.strategies.extend(strategies);
        self
    }

    pub fn router_factory(mut self, factory: RouterFactory) -> Self {
        self.config.router_factory = Some(factory);
        self
    }

    pub fn event_policy(mut self, topic: impl Into<EventTopic>, policy: EventPolicy) -> Self {
        self.config.event_policies.push((topic.into(), policy));
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
