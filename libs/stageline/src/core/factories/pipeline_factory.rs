// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::error::Result;
use crate::core::policies::LogPolicy;
use crate::core::pubsub::{EventHub, EventRouter, RouterFactory};
use crate::core::runtime::{
    Pipeline, PipelineConfig, PipelineExecutor, PipelineMode, PipelineSettings,
};
use crate::core::traits::StrategyHandle;

/// Assembles pipelines and executors wired to one [`EventHub`].
pub struct PipelineFactory {
    hub: Arc<EventHub>,
    default_log_policy: RwLock<LogPolicy>,
}

impl PipelineFactory {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self {
            hub,
            default_log_policy: RwLock::new(LogPolicy::default()),
        }
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn default_log_policy(&self) -> LogPolicy {
        *self.default_log_policy.read()
    }

    /// Policy applied to every pipeline built from here on.
    pub fn set_default_log_policy(&self, policy: LogPolicy) {
        *self.default_log_policy.write() = policy;
    }

    /// Router factory bound to this factory's hub.
    pub fn router_factory(&self) -> RouterFactory {
        EventRouter::standard_factory(Arc::clone(&self.hub))
    }

    pub fn create_pipeline(
        &self,
        name: &str,
        strategies: Vec<StrategyHandle>,
        mode: PipelineMode,
    ) -> Result<Arc<Pipeline>> {
        let config = PipelineConfig::builder(name)
            .mode(mode)
            .log_policy(self.default_log_policy())
            .strategies(strategies)
            .router_factory(self.router_factory())
            .build();
        Pipeline::new(config)
    }

    /// Build from a settings entry. An explicit `log_policy` in the entry
    /// overrides the factory default.
    pub fn create_from_settings(
        &self,
        settings: &PipelineSettings,
        strategies: Vec<StrategyHandle>,
    ) -> Result<Arc<Pipeline>> {
        let mut config = settings.to_config(strategies, self.router_factory())?;
        if settings.log_policy.is_none() {
            config.log_policy = self.default_log_policy();
        }
        Pipeline::new(config)
    }

    pub fn create_executor(&self, name: &str, pipelines: Vec<Arc<Pipeline>>) -> PipelineExecutor {
        let executor = PipelineExecutor::new(name, Some(Arc::clone(&self.hub)));
        executor.set_log_policy(self.default_log_policy());
        for pipeline in pipelines {
            executor.add_pipeline(pipeline);
        }
        executor
    }
}
