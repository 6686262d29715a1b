// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Pipeline: a strategy chain, its router, and the step state machine.
//!
//! One `step()` is one frame cycle:
//!
//! ```text
//! gate (state, trigger) → timing → walk chain → flush deferred → dispose → pace
//! ```
//!
//! The chain is copy-on-write. A step loads the current `Arc<Vec<_>>` once
//! and walks that snapshot, so structural edits from other threads never
//! disturb a walk in progress.

use std::borrow::Cow;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::core::error::{Result, StageError};
use crate::core::frames::Frame;
use crate::core::logging::{self, Loggable};
use crate::core::policies::LogPolicy;
use crate::core::pubsub::EventRouter;
use crate::core::traits::{StrategyHandle, StrategyOutcome};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::handle::PipelineRef;
use super::layout::PipelineLayout;
use super::state::{PipelineMode, PipelineState};

pub struct Pipeline {
    name: Arc<str>,
    mode: PipelineMode,
    frame_interval: Duration,
    enable_fps_control: bool,
    enable_profiling: bool,

    handle: PipelineRef,
    router: EventRouter,
    context: Mutex<PipelineContext>,

    state: Mutex<PipelineState>,
    strategies: RwLock<Arc<Vec<StrategyHandle>>>,
    log_policy: RwLock<LogPolicy>,

    trigger: AtomicBool,
    frame_interrupt: AtomicBool,
    fatal: Mutex<Option<StageError>>,
    last_step: Mutex<Option<Instant>>,

    /// Set for the duration of `step()`. A `stop()` that lands mid-step
    /// leaves cleanup to the end of the step.
    stepping: AtomicBool,
    cleanup_pending: AtomicBool,
}

impl Pipeline {
    /// Build a pipeline from `config`.
    ///
    /// Fails with [`StageError::Configuration`] when the config carries no
    /// router factory or a non-positive frame rate.
    pub fn new(config: PipelineConfig) -> Result<Arc<Self>> {
        let frame_interval = config.target_interval().ok_or_else(|| {
            StageError::Configuration(format!(
                "Pipeline '{}' has invalid max_fps {}",
                config.name, config.max_fps
            ))
        })?;

        let PipelineConfig {
            name,
            mode,
            enable_fps_control,
            enable_profiling,
            log_policy,
            strategies,
            router_factory,
            event_policies,
            ..
        } = config;

        let router_factory = router_factory.ok_or_else(|| {
            StageError::Configuration(format!(
                "Pipeline '{name}' config is missing 'router_factory'. \
                 Use PipelineFactory to create pipelines."
            ))
        })?;

        let name: Arc<str> = Arc::from(name);
        let pipeline = Arc::new_cyclic(|weak| {
            let handle = PipelineRef::new(Arc::clone(&name), weak.clone());
            let router = router_factory(handle.clone());
            Self {
                name: Arc::clone(&name),
                mode,
                frame_interval,
                enable_fps_control,
                enable_profiling,
                handle,
                router,
                context: Mutex::new(PipelineContext::new()),
                state: Mutex::new(PipelineState::Idle),
                strategies: RwLock::new(Arc::new(Vec::new())),
                log_policy: RwLock::new(log_policy),
                trigger: AtomicBool::new(false),
                frame_interrupt: AtomicBool::new(false),
                fatal: Mutex::new(None),
                last_step: Mutex::new(None),
                stepping: AtomicBool::new(false),
                cleanup_pending: AtomicBool::new(false),
            }
        });

        for (topic, policy) in event_policies {
            pipeline.router.set_event_policy(topic, policy);
        }
        pipeline.router.set_log_policy(log_policy);

        for strategy in strategies {
            pipeline.add_strategy(strategy);
        }

        Ok(pipeline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Non-owning reference to this pipeline.
    pub fn handle(&self) -> PipelineRef {
        self.handle.clone()
    }

    /// Lock the runtime context. Held only briefly by the step itself, so
    /// strategies may take it from inside `execute`.
    pub fn context(&self) -> MutexGuard<'_, PipelineContext> {
        self.context.lock()
    }

    pub fn frame_index(&self) -> u64 {
        self.context.lock().frame_index()
    }

    pub fn delta_time(&self) -> f64 {
        self.context.lock().delta_time()
    }

    /// Current chain snapshot.
    pub fn strategies(&self) -> Arc<Vec<StrategyHandle>> {
        Arc::clone(&self.strategies.read())
    }

    // --- Lifecycle ---

    pub fn start(&self) {
        let mut state = self.state.lock();
        let current = *state;
        match current {
            PipelineState::Terminated => {
                drop(state);
                logging::error(self, "Cannot restart a TERMINATED pipeline.");
            }
            PipelineState::Running => {}
            PipelineState::Idle | PipelineState::Paused => {
                if self.mode == PipelineMode::Conditional {
                    self.trigger.store(false, Ordering::SeqCst);
                }
                *state = PipelineState::Running;
                drop(state);
                logging::info(self, format!("Pipeline started in {} mode.", self.mode));
            }
        }
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if *state == PipelineState::Running {
            *state = PipelineState::Paused;
            drop(state);
            logging::info(self, "Pipeline PAUSED.");
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state == PipelineState::Paused {
            *state = PipelineState::Running;
            drop(state);
            logging::info(self, "Pipeline RESUMED.");
        }
    }

    /// Terminate and release every strategy. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if state.is_terminated() {
                return;
            }
            *state = PipelineState::Terminated;
        }
        logging::warn(self, "Pipeline TERMINATED. Cleaning up...");

        if self.stepping.load(Ordering::SeqCst) {
            self.cleanup_pending.store(true, Ordering::SeqCst);
            // The step may have finished between the two loads; whoever
            // takes the pending flag runs cleanup.
            if self.stepping.load(Ordering::SeqCst)
                || !self.cleanup_pending.swap(false, Ordering::SeqCst)
            {
                return;
            }
        }
        self.cleanup();
    }

    /// Arm the next step of a CONDITIONAL pipeline. Multiple triggers before
    /// the next step collapse into one.
    pub fn trigger(&self) {
        if self.mode == PipelineMode::Conditional {
            self.trigger.store(true, Ordering::SeqCst);
        }
    }

    /// Stop the current walk after the strategy in progress.
    pub fn request_frame_interrupt(&self) {
        self.frame_interrupt.store(true, Ordering::SeqCst);
    }

    pub(crate) fn raise_fatal(&self, err: StageError) {
        let mut slot = self.fatal.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    // --- Execution ---

    /// Run one frame cycle. Returns whether any strategy did work.
    ///
    /// Only a critical escalation is returned as `Err`; stage errors are
    /// logged and contained.
    pub fn step(&self) -> Result<bool> {
        // Raised before the state gate: a concurrent stop() either sees the
        // step in flight or the gate sees TERMINATED.
        self.stepping.store(true, Ordering::SeqCst);
        let ran = self.gated_step();
        self.stepping.store(false, Ordering::SeqCst);

        if self.cleanup_pending.swap(false, Ordering::SeqCst) {
            self.cleanup();
        }
        let Some(result) = ran else {
            return Ok(false);
        };
        if self.mode == PipelineMode::Single {
            self.stop();
        }
        result
    }

    /// Gate, walk and pace. `None` when the gate turned the step away.
    fn gated_step(&self) -> Option<Result<bool>> {
        if self.state() != PipelineState::Running {
            return None;
        }
        if self.mode == PipelineMode::Conditional && !self.trigger.swap(false, Ordering::SeqCst) {
            return None;
        }

        let started = Instant::now();
        let result = self.run_frame(started);
        self.pace(started.elapsed());
        Some(result)
    }

    fn run_frame(&self, started: Instant) -> Result<bool> {
        let delta = {
            let mut last = self.last_step.lock();
            let delta = last.map_or(0.0, |prev| {
                started.saturating_duration_since(prev).as_secs_f64()
            });
            *last = Some(started);
            delta
        };
        let frame_index = {
            let mut ctx = self.context.lock();
            ctx.advance(delta);
            ctx.frame_index()
        };
        self.frame_interrupt.store(false, Ordering::SeqCst);

        let chain = self.strategies();
        let mut did_work = false;
        let mut current: Option<Frame> = None;
        let mut escalation: Option<StageError> = None;

        for strategy in chain.iter() {
            if self.state().is_terminated() {
                did_work = true;
                break;
            }
            if self.fatal.lock().is_some() {
                break;
            }
            if self.frame_interrupt.load(Ordering::SeqCst) {
                if self.enable_profiling {
                    logging::warn(self, format!("Frame {frame_index} interrupted logic flow."));
                }
                break;
            }

            let input = current.take();
            match catch_unwind(AssertUnwindSafe(|| strategy.lock().execute(input))) {
                Ok(Ok(StrategyOutcome {
                    success: true,
                    frame,
                })) => {
                    did_work = true;
                    current = frame;
                }
                Ok(Ok(StrategyOutcome {
                    success: false,
                    frame,
                })) => {
                    release(frame);
                    break;
                }
                Ok(Err(err)) if err.is_critical() => {
                    escalation = Some(err);
                    break;
                }
                Ok(Err(err)) => {
                    logging::error(self, format!("Strategy Error [{}]: {err}", strategy.name()));
                    break;
                }
                Err(_) => {
                    logging::error(
                        self,
                        format!("Unexpected Error [{}]: strategy panicked", strategy.name()),
                    );
                    break;
                }
            }
        }

        self.router.process_deferred();
        release(current);

        // A critical publish fills the slot even when the strategy swallowed
        // the returned error.
        let pending = self.fatal.lock().take();
        match escalation.or(pending) {
            Some(err) => Err(err),
            None => Ok(did_work),
        }
    }

    fn pace(&self, elapsed: Duration) {
        let target = self.frame_interval;
        if elapsed > target {
            if self.enable_profiling {
                logging::warn(
                    self,
                    format!(
                        "Frame Drop! Cost: {:.2}ms > {:.2}ms",
                        elapsed.as_secs_f64() * 1000.0,
                        target.as_secs_f64() * 1000.0
                    ),
                );
            }
        } else if self.enable_fps_control {
            thread::sleep(target - elapsed);
        }
    }

    // --- Chain editing (copy-on-write) ---

    pub fn add_strategy(&self, strategy: impl Into<StrategyHandle>) {
        let strategy = strategy.into();
        self.bind(&strategy);
        let name = strategy.name().to_string();
        self.edit_chain(|chain| chain.push(strategy));
        logging::info(self, format!("Strategy added: {name}"));
    }

    /// Insert at `index`, clamped to the chain length.
    pub fn insert_strategy(&self, index: usize, strategy: impl Into<StrategyHandle>) {
        let strategy = strategy.into();
        self.bind(&strategy);
        let name = strategy.name().to_string();
        let at = self.edit_chain(|chain| {
            let at = index.min(chain.len());
            chain.insert(at, strategy);
            at
        });
        logging::info(self, format!("Strategy inserted at {at}: {name}"));
    }

    /// Remove by identity. Runs the removed strategy's cleanup. Must not be
    /// called by the strategy being removed from inside its own `execute`.
    pub fn remove_strategy(&self, strategy: &StrategyHandle) -> bool {
        let removed = self.detach(|chain| chain.iter().position(|s| s.ptr_eq(strategy)));
        if !removed {
            logging::warn(
                self,
                format!("Cannot remove strategy {}: Not found.", strategy.name()),
            );
        }
        removed
    }

    /// Remove the first strategy named `name`.
    pub fn remove_strategy_by_name(&self, name: &str) -> bool {
        let removed = self.detach(|chain| chain.iter().position(|s| s.name() == name));
        if !removed {
            logging::warn(self, format!("Cannot remove strategy '{name}': Name not found."));
        }
        removed
    }

    pub fn remove_strategy_by_index(&self, index: usize) -> bool {
        let removed = self.detach(|chain| (index < chain.len()).then_some(index));
        if !removed {
            logging::warn(
                self,
                format!("Cannot remove strategy at index {index}: Out of bounds."),
            );
        }
        removed
    }

    fn detach(&self, pick: impl FnOnce(&[StrategyHandle]) -> Option<usize>) -> bool {
        let removed = self.edit_chain(|chain| pick(chain).map(|at| chain.remove(at)));
        let Some(strategy) = removed else {
            return false;
        };
        if let Err(e) = strategy.lock().cleanup() {
            logging::error(self, format!("Error cleaning up removed strategy: {e}"));
        }
        logging::info(self, format!("Strategy removed: {}", strategy.name()));
        true
    }

    fn edit_chain<R>(&self, edit: impl FnOnce(&mut Vec<StrategyHandle>) -> R) -> R {
        let mut slot = self.strategies.write();
        let mut next = Vec::clone(&slot);
        let out = edit(&mut next);
        *slot = Arc::new(next);
        out
    }

    fn bind(&self, strategy: &StrategyHandle) {
        strategy.lock().bind_pipeline(self.handle());
        strategy.set_log_policy(self.log_policy());
    }

    // --- Policy, cleanup, inspection ---

    /// Applies to this pipeline, its router and every strategy in the chain.
    pub fn set_log_policy(&self, policy: LogPolicy) {
        *self.log_policy.write() = policy;
        self.router.set_log_policy(policy);
        for strategy in self.strategies().iter() {
            strategy.set_log_policy(policy);
        }
    }

    /// Drain the chain, running each strategy's cleanup, then reset the
    /// context. Cleanup failures are logged.
    pub fn cleanup(&self) {
        let drained = std::mem::take(&mut *self.strategies.write());
        for strategy in drained.iter() {
            if let Err(e) = strategy.lock().cleanup() {
                logging::warn(self, format!("Cleanup error in {}: {e}", strategy.name()));
            }
        }
        self.context.lock().clear();
        *self.last_step.lock() = None;
        logging::info(self, "Pipeline resources cleaned up.");
    }

    pub fn layout(&self) -> PipelineLayout {
        PipelineLayout::from_chain(&self.strategies())
    }

    pub fn layout_report(&self) -> String {
        self.layout().render(&self.name)
    }

    /// Log the layout tree as one INFO record.
    pub fn print_layout(&self) {
        logging::info(self, self.layout_report());
    }
}

fn release(frame: Option<Frame>) {
    if let Some(mut frame) = frame {
        frame.dispose();
    }
}

impl Loggable for Pipeline {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn log_policy(&self) -> LogPolicy {
        *self.log_policy.read()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("strategies", &self.strategies().len())
            .finish_non_exhaustive()
    }
}
