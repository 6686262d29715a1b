// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Declarative runtime layout loaded from TOML.
//!
//! ```toml
//! [[executors]]
//! name = "VisionExecutor"
//!
//! [[executors.pipelines]]
//! name = "vision"
//! mode = "loop"
//! max_fps = 30.0
//! log_policy = "warning|error"
//! strategies = ["TickSource", "FrameCounter"]
//!
//! [executors.pipelines.event_policies]
//! "frame.tick" = "silent"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, StageError};
use crate::core::policies::{EventPolicy, LogPolicy};
use crate::core::pubsub::{EventTopic, RouterFactory};
use crate::core::traits::StrategyHandle;

use super::config::{DEFAULT_MAX_FPS, PipelineConfig, frame_interval};
use super::state::PipelineMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default)]
    pub executors: Vec<ExecutorSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    pub name: String,
    #[serde(default)]
    pub mode: PipelineMode,
    #[serde(default = "default_max_fps")]
    pub max_fps: f64,
    #[serde(default)]
    pub enable_fps_control: bool,
    #[serde(default)]
    pub enable_profiling: bool,
    /// `"all"`, `"silent"`, or a `|`-separated subset of
    /// `info|warning|error`. Absent means the factory default.
    #[serde(default)]
    pub log_policy: Option<String>,
    /// Strategy type names, resolved by the caller's registry.
    #[serde(default)]
    pub strategies: Vec<String>,
    #[serde(default)]
    pub event_policies: BTreeMap<String, EventPolicy>,
}

fn default_max_fps() -> f64 {
    DEFAULT_MAX_FPS
}

impl RuntimeSettings {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| match e {
            StageError::Settings(msg) => {
                StageError::Settings(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Names must be unique: executors among executors, pipelines across the
    /// whole file.
    pub fn validate(&self) -> Result<()> {
        let mut executors = HashSet::new();
        let mut pipelines = HashSet::new();
        for executor in &self.executors {
            if !executors.insert(executor.name.as_str()) {
                return Err(StageError::Settings(format!(
                    "duplicate executor name '{}'",
                    executor.name
                )));
            }
            for pipeline in &executor.pipelines {
                if !pipelines.insert(pipeline.name.as_str()) {
                    return Err(StageError::Settings(format!(
                        "duplicate pipeline name '{}'",
                        pipeline.name
                    )));
                }
                if frame_interval(pipeline.max_fps).is_none() {
                    return Err(StageError::Settings(format!(
                        "pipeline '{}': max_fps must be positive with a representable frame interval, got {}",
                        pipeline.name, pipeline.max_fps
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn pipeline_count(&self) -> usize {
        self.executors.iter().map(|e| e.pipelines.len()).sum()
    }
}

impl PipelineSettings {
    pub fn parsed_log_policy(&self) -> Result<Option<LogPolicy>> {
        self.log_policy.as_deref().map(str::parse::<LogPolicy>).transpose()
    }

    pub fn to_config(
        &self,
        strategies: Vec<StrategyHandle>,
        router_factory: RouterFactory,
    ) -> Result<PipelineConfig> {
        let mut builder = PipelineConfig::builder(&self.name)
            .mode(self.mode)
            .max_fps(self.max_fps)
            .fps_control(self.enable_fps_control)
            .profiling(self.enable_profiling)
            .strategies(strategies)
            .router_factory(router_factory);
        if let Some(policy) = self.parsed_log_policy()? {
            builder = builder.log_policy(policy);
        }
        for (topic, policy) in &self.event_policies {
            builder = builder.event_policy(EventTopic::parse(topic), *policy);
        }
        Ok(builder.build())
    }
}
