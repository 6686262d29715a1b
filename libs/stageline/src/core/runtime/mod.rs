// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod config;
mod context;
mod executor;
mod handle;
mod layout;
mod pipeline;
mod settings;
mod state;

pub use config::{DEFAULT_MAX_FPS, PipelineConfig, PipelineConfigBuilder};
pub use context::PipelineContext;
pub use executor::PipelineExecutor;
pub use handle::PipelineRef;
pub use layout::{LayoutEntry, PipelineLayout};
pub use pipeline::Pipeline;
pub use settings::{ExecutorSettings, PipelineSettings, RuntimeSettings};
pub use state::{PipelineMode, PipelineState};
