// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Composition root: owns the [`EventHub`], the executors, and the process
//! lifecycle.
//!
//! The application listens on two system topics:
//! - `SYSTEM_ALERT`: a CRITICAL alert (published by an executor after a
//!   pipeline escalated) stops the whole application.
//! - `PIPELINE_CONTROL`: a [`PipelineControlPayload`] is applied to the named
//!   pipeline, or to every pipeline for `"ALL"`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::error::{Result, StageError};
use crate::core::factories::PipelineFactory;
use crate::core::logging::{self, Loggable};
use crate::core::pubsub::{
    AlertLevel, AppLifecycle, EventHub, EventPayload, PipelineControlCommand,
    PipelineControlPayload, SystemAlertPayload, SystemEvent,
};
use crate::core::runtime::{Pipeline, PipelineExecutor, PipelineMode, PipelineState};
use crate::core::traits::StrategyHandle;

const SOURCE: &str = "App";
const DEFAULT_EXECUTOR: &str = "MainExecutor";

/// Poll interval for a blocking `start`/`wait` between shutdown checks.
const WAIT_POLL: Duration = Duration::from_millis(500);

static SIGNAL_HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

pub struct Application {
    inner: Arc<AppInner>,
}

struct AppInner {
    hub: Arc<EventHub>,
    factory: PipelineFactory,
    default_executor: Arc<PipelineExecutor>,
    executors: Mutex<Vec<Arc<PipelineExecutor>>>,
    running: AtomicBool,
    /// Whether the system-topic handlers are currently on the hub. `stop()`
    /// clears the hub, so `start()` re-installs them.
    subscribed: AtomicBool,
    stop_tx: crossbeam_channel::Sender<()>,
    stop_rx: crossbeam_channel::Receiver<()>,
}

/// Cloneable, non-owning way to stop an [`Application`] from anywhere
/// (signal handlers, other threads).
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Weak<AppInner>,
}

impl ShutdownHandle {
    pub fn request_shutdown(&self) {
        if let Some(app) = self.inner.upgrade() {
            app.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|app| app.running.load(Ordering::SeqCst))
    }
}

impl Application {
    pub fn new() -> Self {
        logging::info(SOURCE, "Initializing Application Infrastructure...");
        let hub = Arc::new(EventHub::new());
        let factory = PipelineFactory::new(Arc::clone(&hub));
        let default_executor = Arc::new(factory.create_executor(DEFAULT_EXECUTOR, Vec::new()));
        let (stop_tx, stop_rx) = crossbeam_channel::unbounded();

        let inner = Arc::new(AppInner {
            hub,
            factory,
            default_executor: Arc::clone(&default_executor),
            executors: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            stop_tx,
            stop_rx,
        });
        inner.register_executor(default_executor);
        AppInner::subscribe_system_topics(&inner);
        Self { inner }
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.inner.hub
    }

    pub fn factory(&self) -> &PipelineFactory {
        &self.inner.factory
    }

    pub fn default_executor(&self) -> &Arc<PipelineExecutor> {
        &self.inner.default_executor
    }

    pub fn executors(&self) -> Vec<Arc<PipelineExecutor>> {
        self.inner.executors.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Build a pipeline wired to this application's hub and attach it to the
    /// default executor.
    pub fn add_pipeline(
        &self,
        name: &str,
        strategies: Vec<StrategyHandle>,
        mode: PipelineMode,
    ) -> Result<Arc<Pipeline>> {
        let pipeline = self.inner.factory.create_pipeline(name, strategies, mode)?;
        self.inner.default_executor.add_pipeline(Arc::clone(&pipeline));
        Ok(pipeline)
    }

    /// Register an additional executor. Returns false if this exact executor
    /// is already registered.
    pub fn register_executor(&self, executor: Arc<PipelineExecutor>) -> bool {
        self.inner.register_executor(executor)
    }

    /// Find a pipeline by name across all executors.
    pub fn find_pipeline(&self, name: &str) -> Option<Arc<Pipeline>> {
        self.inner.find_pipeline(name)
    }

    /// Start idle pipelines and every executor. With `block`, returns only
    /// once the application has been stopped.
    pub fn start(&self, block: bool) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        logging::info(SOURCE, ">>> APPLICATION STARTUP SEQUENCE INITIATED...");

        // Drain a stale wakeup left by a previous stop.
        while self.inner.stop_rx.try_recv().is_ok() {}
        AppInner::subscribe_system_topics(&self.inner);

        self.inner
            .hub
            .publish(SystemEvent::PipelineControl, EventPayload::new(AppLifecycle::Start));

        for executor in self.executors() {
            for pipeline in executor.pipelines() {
                if pipeline.state() == PipelineState::Idle {
                    pipeline.start();
                }
            }
            if let Err(e) = executor.start() {
                logging::error(SOURCE, format!("Executor {} failed to start: {e}", executor.name()));
                self.stop();
                return Err(e);
            }
        }
        logging::info(SOURCE, ">>> APPLICATION RUNNING.");

        if block {
            self.wait();
        }
        Ok(())
    }

    /// Block until the application is stopped.
    pub fn wait(&self) {
        while self.is_running() {
            let _ = self.inner.stop_rx.recv_timeout(WAIT_POLL);
        }
    }

    /// Graceful shutdown: announce, stop every executor, clear the hub.
    /// Idempotent. Does not exit the process.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Publish a control command on the hub.
    pub fn send_control(&self, control: PipelineControlPayload) {
        self.inner
            .hub
            .publish(SystemEvent::PipelineControl, EventPayload::new(control));
    }

    /// Route SIGINT/SIGTERM to [`Application::stop`]. Only the first call per
    /// process installs a handler.
    pub fn install_signal_handlers(&self) -> Result<()> {
        if SIGNAL_HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
            logging::warn(SOURCE, "Signal handlers already installed, skipping");
            return Ok(());
        }
        let handle = self.shutdown_handle();
        ctrlc::set_handler(move || {
            logging::warn(SOURCE, "[INTERRUPT] Signal received. Stopping engine...");
            handle.request_shutdown();
        })
        .map_err(|e| StageError::Other(e.into()))?;
        logging::info(SOURCE, "Signal handlers installed (SIGINT, SIGTERM)");
        Ok(())
    }

    /// Text report of executors, pipelines and strategies with their log
    /// policy tags.
    pub fn topology(&self) -> String {
        let mut out = String::new();
        let heavy = "=".repeat(70);
        let light = "-".repeat(70);
        let _ = writeln!(out);
        let _ = writeln!(out, "{heavy}");
        let _ = writeln!(out, "{:^70}", "SYSTEM TOPOLOGY REPORT");
        let _ = writeln!(out, "{heavy}");
        for (i, executor) in self.executors().iter().enumerate() {
            let _ = writeln!(out, "Executor [{i}]: {}", executor.name());
            let _ = writeln!(out, "   └── Thread: {}", executor.thread_name());
            for pipeline in executor.pipelines() {
                let _ = writeln!(
                    out,
                    "       └── Pipeline: {} {}",
                    pipeline.name(),
                    pipeline.log_policy().tag()
                );
                for strategy in pipeline.strategies().iter() {
                    let _ = writeln!(
                        out,
                        "           └── Strategy: {} {}",
                        strategy.name(),
                        strategy.log_policy().tag()
                    );
                }
            }
            let _ = writeln!(out, "{light}");
        }
        out.push_str(&heavy);
        out
    }

    pub fn print_topology(&self) {
        logging::info(SOURCE, self.topology());
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl AppInner {
    fn register_executor(&self, executor: Arc<PipelineExecutor>) -> bool {
        let mut executors = self.executors.lock();
        if executors.iter().any(|e| Arc::ptr_eq(e, &executor)) {
            return false;
        }
        let name = executor.name().to_string();
        executors.push(executor);
        drop(executors);
        logging::info(SOURCE, format!("Executor registered: {name}"));
        true
    }

    fn find_pipeline(&self, name: &str) -> Option<Arc<Pipeline>> {
        let executors = self.executors.lock().clone();
        executors.iter().find_map(|e| e.get_pipeline(name))
    }

    /// Handlers hold a weak reference so the hub never keeps the
    /// application alive.
    fn subscribe_system_topics(this: &Arc<Self>) {
        if this.subscribed.swap(true, Ordering::SeqCst) {
            return;
        }

        let weak = Arc::downgrade(this);
        this.hub.subscribe(SystemEvent::SystemAlert, move |payload| {
            if let (Some(app), Some(alert)) =
                (weak.upgrade(), payload.downcast_ref::<SystemAlertPayload>())
            {
                app.on_system_alert(alert);
            }
            Ok(())
        });

        let weak = Arc::downgrade(this);
        this.hub.subscribe(SystemEvent::PipelineControl, move |payload| {
            if let (Some(app), Some(control)) =
                (weak.upgrade(), payload.downcast_ref::<PipelineControlPayload>())
            {
                app.apply_control(control);
            }
            Ok(())
        });
    }

    fn on_system_alert(&self, alert: &SystemAlertPayload) {
        if alert.level != AlertLevel::Critical {
            return;
        }
        logging::critical(format!(
            "!!! SYSTEM MELTDOWN IMMINENT !!! Source: {}",
            alert.source
        ));
        logging::critical(format!("Reason: {}", alert.message));
        self.stop();
    }

    fn apply_control(&self, control: &PipelineControlPayload) {
        let executors = self.executors.lock().clone();
        let mut matched = false;
        for pipeline in executors.iter().flat_map(|e| e.pipelines()) {
            if !control.targets(pipeline.name()) {
                continue;
            }
            matched = true;
            logging::info(
                SOURCE,
                format!(
                    "{:?} -> {} (reason: {})",
                    control.command,
                    pipeline.name(),
                    control.reason
                ),
            );
            match control.command {
                PipelineControlCommand::Stop => pipeline.stop(),
                PipelineControlCommand::Pause => pipeline.pause(),
                PipelineControlCommand::Resume => pipeline.resume(),
                PipelineControlCommand::Restart => {
                    if pipeline.state().is_terminated() {
                        logging::warn(
                            SOURCE,
                            format!("Cannot restart TERMINATED pipeline {}", pipeline.name()),
                        );
                    } else {
                        pipeline.pause();
                        pipeline.start();
                    }
                }
            }
        }
        if !matched {
            logging::warn(
                SOURCE,
                format!(
                    "No pipeline matches control target '{}'",
                    control.target_pipeline_name
                ),
            );
        }
    }

    fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        logging::info(SOURCE, ">>> APPLICATION SHUTDOWN SEQUENCE INITIATED...");

        self.hub
            .publish(SystemEvent::PipelineControl, EventPayload::new(AppLifecycle::Stop));

        let executors = self.executors.lock().clone();
        for executor in executors {
            executor.stop();
        }

        self.hub.clear();
        self.subscribed.store(false, Ordering::SeqCst);
        let _ = self.stop_tx.send(());
        logging::info(SOURCE, ">>> Application stopped safely.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::Frame;
    use crate::core::policies::LogPolicy;
    use crate::core::traits::{Strategy, StrategyOutcome};
    use std::borrow::Cow;
    use std::thread;
    use std::time::Instant;

    struct Idle;

    impl Loggable for Idle {
        fn name(&self) -> Cow<'_, str> {
            Cow::Borrowed("Idle_0")
        }

        fn log_policy(&self) -> LogPolicy {
            LogPolicy::silent()
        }
    }

    impl Strategy for Idle {
        fn set_log_policy(&mut self, _policy: LogPolicy) {}

        fn execute(&mut self, _frame: Option<Frame>) -> Result<StrategyOutcome> {
            Ok(StrategyOutcome::ok(Frame::new()))
        }
    }

    #[test]
    fn test_control_commands() {
        let app = Application::new();
        let a = app
            .add_pipeline("a", vec![StrategyHandle::new(Idle)], PipelineMode::Loop)
            .unwrap();
        let b = app
            .add_pipeline("b", vec![StrategyHandle::new(Idle)], PipelineMode::Loop)
            .unwrap();
        a.start();
        b.start();

        app.send_control(PipelineControlPayload::new(PipelineControlCommand::Pause, "a"));
        assert_eq!(a.state(), PipelineState::Paused);
        assert_eq!(b.state(), PipelineState::Running);

        app.send_control(PipelineControlPayload::new(
            PipelineControlCommand::Resume,
            PipelineControlPayload::ALL,
        ));
        assert_eq!(a.state(), PipelineState::Running);

        app.send_control(PipelineControlPayload::new(PipelineControlCommand::Restart, "b"));
        assert_eq!(b.state(), PipelineState::Running);

        app.send_control(PipelineControlPayload::new(PipelineControlCommand::Stop, "b"));
        assert_eq!(b.state(), PipelineState::Terminated);
        app.send_control(PipelineControlPayload::new(PipelineControlCommand::Restart, "b"));
        assert_eq!(b.state(), PipelineState::Terminated);
    }

    #[test]
    fn test_register_executor_dedups() {
        let app = Application::new();
        let extra = Arc::new(PipelineExecutor::new("Extra", Some(Arc::clone(app.hub()))));
        assert!(app.register_executor(Arc::clone(&extra)));
        assert!(!app.register_executor(extra));
        assert!(!app.register_executor(Arc::clone(app.default_executor())));
        assert_eq!(app.executors().len(), 2);
    }

    #[test]
    fn test_critical_alert_stops_application() {
        let app = Application::new();
        let p = app
            .add_pipeline("p", vec![StrategyHandle::new(Idle)], PipelineMode::Loop)
            .unwrap();
        app.start(false).unwrap();
        assert!(app.is_running());
        assert_eq!(p.state(), PipelineState::Running);

        app.hub().publish(
            SystemEvent::SystemAlert,
            EventPayload::new(SystemAlertPayload::new(
                AlertLevel::Warning,
                crate::core::pubsub::ErrorCode::PerformanceDegraded,
                "test",
                "slow",
            )),
        );
        assert!(app.is_running());

        app.hub().publish(
            SystemEvent::SystemAlert,
            EventPayload::new(SystemAlertPayload::critical("test", "boom")),
        );
        assert!(!app.is_running());
        assert!(!app.default_executor().is_running());
    }

    #[test]
    fn test_blocking_start_returns_after_shutdown_request() {
        let app = Application::new();
        app.add_pipeline("p", vec![StrategyHandle::new(Idle)], PipelineMode::Loop)
            .unwrap();
        let handle = app.shutdown_handle();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.request_shutdown();
        });

        let began = Instant::now();
        app.start(true).unwrap();
        assert!(!app.is_running());
        assert!(began.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();

        // Stop is idempotent.
        app.stop();
    }

    #[test]
    fn test_restart_after_stop_reinstalls_handlers() {
        let app = Application::new();
        app.start(false).unwrap();
        app.stop();
        assert_eq!(app.hub().subscriber_count(SystemEvent::SystemAlert), 0);

        app.start(false).unwrap();
        assert_eq!(app.hub().subscriber_count(SystemEvent::SystemAlert), 1);
        app.stop();
    }

    #[test]
    fn test_topology_lists_everything() {
        let app = Application::new();
        app.add_pipeline("vision", vec![StrategyHandle::new(Idle)], PipelineMode::Loop)
            .unwrap();
        let report = app.topology();
        assert!(report.contains("SYSTEM TOPOLOGY REPORT"));
        assert!(report.contains("Executor [0]: MainExecutor"));
        assert!(report.contains("Pipeline: vision [ALL]"));
        assert!(report.contains("Strategy: Idle_0 [SILENT]"));
        assert!(app.find_pipeline("vision").is_some());
    }
}
