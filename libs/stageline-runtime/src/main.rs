// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stageline Runtime Binary
//!
//! Reads a TOML layout, builds the executors and pipelines it describes,
//! and runs them until Ctrl+C, a CRITICAL alert, or the frame limit.

mod strategies;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use stageline::core::logging;
use stageline::core::{Application, LogPolicy, RuntimeSettings, StrategyHandle, StrategyRegistry};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "stageline-runtime")]
#[command(author, version, about = "Stageline runtime process", long_about = None)]
struct Args {
    /// Layout file to load (TOML). Runs a built-in demo layout when omitted.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Default tracing filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Default log policy for components without one in the layout
    /// (`all`, `silent`, or e.g. `warning|error`)
    #[arg(long, default_value = "all")]
    log_policy: String,

    /// Stop every pipeline once a FrameCounter has seen this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

const DEMO_LAYOUT: &str = r#"
[[executors]]
name = "MainExecutor"

[[executors.pipelines]]
name = "demo"
mode = "loop"
max_fps = 30.0
enable_fps_control = true
strategies = ["TickSource", "FrameCounter"]

[executors.pipelines.event_policies]
"frame.tick" = "silent"
"#;

fn load_settings(path: Option<&PathBuf>) -> Result<RuntimeSettings> {
    let settings = match path {
        Some(path) => RuntimeSettings::from_path(path)
            .with_context(|| format!("Failed to load layout: {}", path.display()))?,
        None => RuntimeSettings::from_toml_str(DEMO_LAYOUT).context("Built-in layout is invalid")?,
    };
    if settings.pipeline_count() == 0 {
        bail!("Layout defines no pipelines");
    }
    Ok(settings)
}

/// Build every executor and pipeline from the layout. An executor named like
/// the application's default executor reuses it.
fn assemble(app: &Application, settings: &RuntimeSettings, registry: &StrategyRegistry) -> Result<()> {
    for executor_settings in &settings.executors {
        let executor = if executor_settings.name == app.default_executor().name() {
            Arc::clone(app.default_executor())
        } else {
            let executor = Arc::new(app.factory().create_executor(&executor_settings.name, Vec::new()));
            app.register_executor(Arc::clone(&executor));
            executor
        };

        for pipeline_settings in &executor_settings.pipelines {
            let strategies = pipeline_settings
                .strategies
                .iter()
                .map(|type_name| registry.create(type_name, None))
                .collect::<stageline::Result<Vec<StrategyHandle>>>()
                .with_context(|| format!("Pipeline '{}'", pipeline_settings.name))?;

            let pipeline = app
                .factory()
                .create_from_settings(pipeline_settings, strategies)
                .with_context(|| format!("Failed to build pipeline '{}'", pipeline_settings.name))?;
            pipeline.print_layout();
            executor.add_pipeline(pipeline);
        }
    }
    Ok(())
}

fn has_live_pipelines(app: &Application) -> bool {
    app.executors().iter().any(|e| !e.pipelines().is_empty())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(&args.log_level);

    let default_policy: LogPolicy = args
        .log_policy
        .parse()
        .with_context(|| format!("Invalid --log-policy '{}'", args.log_policy))?;
    let settings = load_settings(args.config.as_ref())?;
    let registry = strategies::builtin_registry(args.max_frames);

    let app = Application::new();
    app.factory().set_default_log_policy(default_policy);
    assemble(&app, &settings, &registry)?;
    app.install_signal_handlers()
        .context("Failed to install signal handlers")?;
    app.print_topology();

    app.start(false).context("Failed to start application")?;
    println!("Press Ctrl+C to stop");

    // Runs until a signal or CRITICAL alert stops the application, or until
    // every pipeline has terminated and been collected.
    while app.is_running() && has_live_pipelines(&app) {
        std::thread::sleep(Duration::from_millis(100));
    }
    app.stop();

    tracing::info!("Stageline runtime exited");
    Ok(())
}
