// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Thread-backed scheduler for a group of pipelines.
//!
//! One worker thread per executor steps every attached pipeline in turn.
//! Pipelines on the same executor never run concurrently with each other.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::{Mutex, RwLock};

use crate::core::error::{Result, StageError};
use crate::core::logging::{self, Loggable};
use crate::core::policies::LogPolicy;
use crate::core::pubsub::{
    AlertLevel, ErrorCode, EventHub, EventPayload, SystemAlertPayload, SystemEvent,
};

use super::pipeline::Pipeline;

/// Sleep after a sweep in which no pipeline did any work.
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// How long `stop()` waits for the worker before detaching it.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct PipelineExecutor {
    inner: Arc<ExecutorInner>,
    worker: Mutex<Option<Worker>>,
    /// Worker that was stopped from its own thread and may still be
    /// finishing its sweep. `start()` waits for it before spawning again.
    retired: Mutex<Option<Worker>>,
}

struct ExecutorInner {
    name: Arc<str>,
    hub: Option<Arc<EventHub>>,
    pipelines: Mutex<Vec<Arc<Pipeline>>>,
    log_policy: RwLock<LogPolicy>,
    thread_name: RwLock<String>,
}

struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    done_rx: crossbeam_channel::Receiver<()>,
    thread_id: ThreadId,
}

impl PipelineExecutor {
    pub fn new(name: impl Into<Arc<str>>, hub: Option<Arc<EventHub>>) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                name: name.into(),
                hub,
                pipelines: Mutex::new(Vec::new()),
                log_policy: RwLock::new(LogPolicy::default()),
                thread_name: RwLock::new("Pending...".to_string()),
            }),
            worker: Mutex::new(None),
            retired: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the worker thread, `"Pending..."` until it first runs.
    pub fn thread_name(&self) -> String {
        self.inner.thread_name.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    pub fn log_policy(&self) -> LogPolicy {
        *self.inner.log_policy.read()
    }

    pub fn set_log_policy(&self, policy: LogPolicy) {
        *self.inner.log_policy.write() = policy;
    }

    pub fn add_pipeline(&self, pipeline: Arc<Pipeline>) {
        let name = pipeline.name().to_string();
        self.inner.pipelines.lock().push(pipeline);
        logging::info(&*self.inner, format!("Pipeline attached: {name}"));
    }

    pub fn remove_pipeline(&self, pipeline: &Arc<Pipeline>) -> bool {
        let removed = {
            let mut list = self.inner.pipelines.lock();
            match list.iter().position(|p| Arc::ptr_eq(p, pipeline)) {
                Some(at) => {
                    list.remove(at);
                    true
                }
                None => false,
            }
        };
        if removed {
            logging::info(&*self.inner, format!("Pipeline detached: {}", pipeline.name()));
        } else {
            logging::warn(
                &*self.inner,
                format!("Cannot remove pipeline {}: Not found.", pipeline.name()),
            );
        }
        removed
    }

    pub fn get_pipeline(&self, name: &str) -> Option<Arc<Pipeline>> {
        self.inner
            .pipelines
            .lock()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Snapshot of the attached pipelines.
    pub fn pipelines(&self) -> Vec<Arc<Pipeline>> {
        self.inner.pipelines.lock().clone()
    }

    /// Spawn the worker thread. No-op when already running.
    ///
    /// A worker stopped from its own thread is waited for first. Called from
    /// that worker itself, it is resumed instead of replaced.
    pub fn start(&self) -> Result<()> {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            return Ok(());
        }

        if let Some(old) = self.retired.lock().take() {
            if old.thread_id == thread::current().id() {
                old.running.store(true, Ordering::SeqCst);
                *slot = Some(old);
                drop(slot);
                logging::info(&*self.inner, format!("Executor thread {} resumed.", self.inner.name));
                return Ok(());
            }
            if let Err(old) = self.join_worker(old) {
                *self.retired.lock() = Some(old);
                return Err(StageError::Other(anyhow::anyhow!(
                    "previous worker of executor '{}' is still running",
                    self.inner.name
                )));
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let inner = Arc::clone(&self.inner);
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(format!("Thread-{}", self.inner.name))
            .spawn(move || {
                inner.run_loop(&flag);
                let _ = done_tx.send(());
            })
            .map_err(StageError::Io)?;

        let thread_id = handle.thread().id();
        *slot = Some(Worker {
            running,
            handle,
            done_rx,
            thread_id,
        });
        drop(slot);

        logging::info(&*self.inner, format!("Executor thread {} started.", self.inner.name));
        Ok(())
    }

    /// Clear the running flag and wait up to 2 s for the worker to finish its
    /// current sweep. A worker that does not finish in time is detached.
    ///
    /// Called from the worker thread itself (e.g. an alert handler reacting
    /// to a critical error), it only clears the flag; the loop exits after the
    /// current sweep.
    pub fn stop(&self) {
        let mut slot = self.worker.lock();
        let Some(worker) = slot.take() else {
            drop(slot);
            // A worker retired by a self-stop is still joined when stopped
            // from elsewhere.
            let retired = self.retired.lock().take();
            if let Some(old) = retired {
                if old.thread_id == thread::current().id() {
                    *self.retired.lock() = Some(old);
                } else if self.join_worker(old).is_err() {
                    self.warn_detached();
                }
            }
            return;
        };
        worker.running.store(false, Ordering::SeqCst);

        // Retire under the slot lock so a concurrent start() always sees it.
        if worker.thread_id == thread::current().id() {
            *self.retired.lock() = Some(worker);
            return;
        }
        drop(slot);

        if self.join_worker(worker).is_err() {
            self.warn_detached();
        }
    }

    /// Wait up to [`JOIN_TIMEOUT`] for `worker` to leave its loop, then join
    /// it. Hands the worker back when it is still running.
    fn join_worker(&self, worker: Worker) -> std::result::Result<(), Worker> {
        worker.running.store(false, Ordering::SeqCst);
        match worker.done_rx.recv_timeout(JOIN_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    logging::error(&*self.inner, "Executor thread panicked.");
                }
                logging::info(
                    &*self.inner,
                    format!("Executor thread {} stopped.", self.inner.name),
                );
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(worker),
        }
    }

    fn warn_detached(&self) {
        logging::warn(
            &*self.inner,
            format!(
                "Executor thread {} did not stop within {:?}; detaching it.",
                self.inner.name, JOIN_TIMEOUT
            ),
        );
    }

    /// Run one sweep on the calling thread. Returns whether any pipeline did
    /// work. Meant for driving an executor that has not been started.
    pub fn run_once(&self) -> bool {
        self.inner.sweep()
    }
}

impl ExecutorInner {
    fn run_loop(&self, running: &AtomicBool) {
        if let Some(name) = thread::current().name() {
            *self.thread_name.write() = name.to_string();
        }
        while running.load(Ordering::SeqCst) {
            if !self.sweep() {
                thread::sleep(IDLE_SLEEP);
            }
        }
    }

    fn sweep(&self) -> bool {
        let snapshot = self.pipelines.lock().clone();
        let mut any_work = false;
        let mut dead: Vec<Arc<Pipeline>> = Vec::new();

        for pipeline in snapshot {
            if pipeline.state().is_terminated() {
                dead.push(pipeline);
                continue;
            }

            match pipeline.step() {
                Ok(did_work) => any_work |= did_work,
                Err(err) if err.is_critical() => {
                    logging::critical(format!("CRITICAL ERROR in {}: {err}", pipeline.name()));
                    self.report_critical(&pipeline, &err);
                    pipeline.stop();
                    dead.push(pipeline);
                }
                Err(err) => {
                    logging::error(self, format!("Unhandled Error in {}: {err}", pipeline.name()));
                }
            }
        }

        if !dead.is_empty() {
            let mut list = self.pipelines.lock();
            list.retain(|p| !dead.iter().any(|d| Arc::ptr_eq(p, d)));
            drop(list);
            for pipeline in dead {
                logging::warn(
                    self,
                    format!("Pipeline detached (Terminated): {}", pipeline.name()),
                );
            }
        }

        any_work
    }

    fn report_critical(&self, pipeline: &Pipeline, err: &StageError) {
        let Some(hub) = &self.hub else {
            return;
        };
        let payload = SystemAlertPayload::new(
            AlertLevel::Critical,
            ErrorCode::GenericError,
            format!("{}/{}", self.name, pipeline.name()),
            err.to_string(),
        );
        hub.publish(SystemEvent::SystemAlert, EventPayload::new(payload));
    }
}

impl Loggable for ExecutorInner {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn log_policy(&self) -> LogPolicy {
        *self.log_policy.read()
    }
}

impl Loggable for PipelineExecutor {
    fn name(&self) -> Cow<'_, str> {
        self.inner.name()
    }

    fn log_policy(&self) -> LogPolicy {
        *self.inner.log_policy.read()
    }
}

impl Drop for PipelineExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .field("pipelines", &self.inner.pipelines.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Result;
    use crate::core::frames::Frame;
    use crate::core::pubsub::{EventPriority, EventRouter};
    use crate::core::runtime::{PipelineConfig, PipelineMode, PipelineRef, PipelineState};
    use crate::core::traits::{Strategy, StrategyOutcome};
    use std::time::Instant;

    /// Produces a frame every step; raises CRITICAL on step `fail_on`.
    struct Ticker {
        steps: usize,
        fail_on: Option<usize>,
        pipeline: Option<PipelineRef>,
    }

    impl Loggable for Ticker {
        fn name(&self) -> Cow<'_, str> {
            Cow::Borrowed("Ticker_0")
        }

        fn log_policy(&self) -> LogPolicy {
            LogPolicy::silent()
        }
    }

    impl Strategy for Ticker {
        fn set_log_policy(&mut self, _policy: LogPolicy) {}

        fn bind_pipeline(&mut self, pipeline: PipelineRef) {
            self.pipeline = Some(pipeline);
        }

        fn execute(&mut self, _frame: Option<Frame>) -> Result<StrategyOutcome> {
            self.steps += 1;
            if Some(self.steps) == self.fail_on {
                if let Some(pipeline) = &self.pipeline {
                    pipeline.publish(
                        "sensor.lost",
                        EventPayload::empty(),
                        Some("Ticker_0"),
                        EventPriority::Critical,
                    )?;
                }
            }
            Ok(StrategyOutcome::ok(Frame::new()))
        }
    }

    fn pipeline(name: &str, fail_on: Option<usize>, hub: &Arc<EventHub>) -> Arc<Pipeline> {
        let config = PipelineConfig::builder(name)
            .mode(PipelineMode::Loop)
            .max_fps(10_000.0)
            .log_policy(LogPolicy::silent())
            .strategy(Ticker {
                steps: 0,
                fail_on,
                pipeline: None,
            })
            .router_factory(EventRouter::standard_factory(Arc::clone(hub)))
            .build();
        let p = Pipeline::new(config).unwrap();
        p.start();
        p
    }

    #[test]
    fn test_critical_detaches_only_offender() {
        let hub = Arc::new(EventHub::new());
        let alerts = Arc::new(Mutex::new(Vec::<SystemAlertPayload>::new()));
        let sink = Arc::clone(&alerts);
        hub.subscribe(SystemEvent::SystemAlert, move |payload| {
            if let Some(alert) = payload.downcast_ref::<SystemAlertPayload>() {
                sink.lock().push(alert.clone());
            }
            Ok(())
        });

        let executor = PipelineExecutor::new("Exec", Some(Arc::clone(&hub)));
        let healthy = pipeline("healthy", None, &hub);
        let faulty = pipeline("faulty", Some(2), &hub);
        executor.add_pipeline(Arc::clone(&healthy));
        executor.add_pipeline(Arc::clone(&faulty));

        assert!(executor.run_once());
        assert!(executor.run_once());

        assert_eq!(faulty.state(), PipelineState::Terminated);
        assert!(executor.get_pipeline("faulty").is_none());
        assert_eq!(executor.pipelines().len(), 1);

        let alerts = alerts.lock();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].source, "Exec/faulty");

        assert!(executor.run_once());
        assert_eq!(healthy.frame_index(), 3);
    }

    #[test]
    fn test_terminated_pipelines_are_collected() {
        let hub = Arc::new(EventHub::new());
        let executor = PipelineExecutor::new("Exec", None);
        let p = pipeline("p", None, &hub);
        executor.add_pipeline(Arc::clone(&p));
        p.stop();
        assert!(!executor.run_once());
        assert!(executor.pipelines().is_empty());
    }

    #[test]
    fn test_add_remove_get() {
        let hub = Arc::new(EventHub::new());
        let executor = PipelineExecutor::new("Exec", None);
        let p = pipeline("p", None, &hub);
        executor.add_pipeline(Arc::clone(&p));
        assert!(executor.get_pipeline("p").is_some());
        assert!(executor.remove_pipeline(&p));
        assert!(!executor.remove_pipeline(&p));
        assert!(executor.get_pipeline("p").is_none());
    }

    #[test]
    fn test_worker_thread_lifecycle() {
        let hub = Arc::new(EventHub::new());
        let executor = PipelineExecutor::new("Worker", None);
        let p = pipeline("p", None, &hub);
        executor.add_pipeline(Arc::clone(&p));

        assert_eq!(executor.thread_name(), "Pending...");
        executor.start().unwrap();
        executor.start().unwrap();
        assert!(executor.is_running());

        let deadline = Instant::now() + Duration::from_secs(2);
        while p.frame_index() < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        executor.stop();
        executor.stop();
        assert!(!executor.is_running());
        assert!(p.frame_index() >= 5);
        assert_eq!(executor.thread_name(), "Thread-Worker");

        let after = p.frame_index();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(p.frame_index(), after);
    }

    /// On its first step, stops the executor driving it from the worker
    /// thread, optionally restarts it right away, then keeps the sweep busy.
    struct SelfStopper {
        executor: Arc<Mutex<Option<std::sync::Weak<PipelineExecutor>>>>,
        calls: Arc<std::sync::atomic::AtomicUsize>,
        first_finished: Arc<AtomicBool>,
        restart_inline: bool,
    }

    impl Loggable for SelfStopper {
        fn name(&self) -> Cow<'_, str> {
            Cow::Borrowed("SelfStopper_0")
        }

        fn log_policy(&self) -> LogPolicy {
            LogPolicy::silent()
        }
    }

    impl Strategy for SelfStopper {
        fn set_log_policy(&mut self, _policy: LogPolicy) {}

        fn execute(&mut self, _frame: Option<Frame>) -> Result<StrategyOutcome> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                let executor = self.executor.lock().as_ref().and_then(|w| w.upgrade());
                if let Some(executor) = executor {
                    executor.stop();
                    if self.restart_inline {
                        executor.start()?;
                    }
                }
                thread::sleep(Duration::from_millis(100));
                self.first_finished.store(true, Ordering::SeqCst);
            }
            Ok(StrategyOutcome::ok(Frame::new()))
        }
    }

    fn self_stopping_executor(
        restart_inline: bool,
    ) -> (Arc<PipelineExecutor>, Arc<std::sync::atomic::AtomicUsize>, Arc<AtomicBool>) {
        let slot = Arc::new(Mutex::new(None));
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let first_finished = Arc::new(AtomicBool::new(false));
        let hub = Arc::new(EventHub::new());
        let config = PipelineConfig::builder("self-stop")
            .max_fps(10_000.0)
            .log_policy(LogPolicy::silent())
            .strategy(SelfStopper {
                executor: Arc::clone(&slot),
                calls: Arc::clone(&calls),
                first_finished: Arc::clone(&first_finished),
                restart_inline,
            })
            .router_factory(EventRouter::standard_factory(hub))
            .build();
        let p = Pipeline::new(config).unwrap();
        p.start();

        let executor = Arc::new(PipelineExecutor::new("SelfStop", None));
        executor.add_pipeline(p);
        *slot.lock() = Some(Arc::downgrade(&executor));
        (executor, calls, first_finished)
    }

    fn wait_for(timeout: Duration, cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while !cond() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    #[test]
    fn test_restart_waits_for_self_stopped_worker() {
        let (executor, calls, first_finished) = self_stopping_executor(false);
        executor.start().unwrap();
        assert!(wait_for(Duration::from_secs(2), || calls.load(Ordering::SeqCst) >= 1
            && !executor.is_running()));

        // The old worker is still inside its sweep; a restart must not
        // overlap with it.
        executor.start().unwrap();
        assert!(first_finished.load(Ordering::SeqCst));
        assert!(executor.is_running());

        assert!(wait_for(Duration::from_secs(2), || calls.load(Ordering::SeqCst) >= 3));
        executor.stop();
        assert!(!executor.is_running());
    }

    #[test]
    fn test_restart_from_worker_thread_resumes_it() {
        let (executor, calls, first_finished) = self_stopping_executor(true);
        executor.start().unwrap();

        assert!(wait_for(Duration::from_secs(2), || calls.load(Ordering::SeqCst) >= 3));
        assert!(first_finished.load(Ordering::SeqCst));
        assert!(executor.is_running());
        assert_eq!(executor.thread_name(), "Thread-SelfStop");

        executor.stop();
        assert!(!executor.is_running());
        let after = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(calls.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_idle_executor_reports_no_work() {
        let hub = Arc::new(EventHub::new());
        let executor = PipelineExecutor::new("Idle", None);
        assert!(!executor.run_once());

        let p = pipeline("paused", None, &hub);
        p.pause();
        executor.add_pipeline(Arc::clone(&p));
        assert!(!executor.run_once());
        assert_eq!(p.frame_index(), 0);
        assert_eq!(executor.pipelines().len(), 1);
    }
}
