// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod pipeline_factory;
mod strategy_factory;

pub use pipeline_factory::PipelineFactory;
pub use strategy_factory::{StrategyConstructorFn, StrategyFactory, StrategyRegistry};
