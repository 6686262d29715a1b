// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

#![allow(dead_code)]

use std::borrow::Cow;
use std::time::{Duration, Instant};

use stageline::core::prelude::*;

type StepFn = Box<dyn FnMut(Option<Frame>, &PipelineRef) -> Result<StrategyOutcome> + Send>;

/// Strategy driven by a closure, with access to its bound pipeline.
pub struct FnStrategy {
    name: String,
    policy: LogPolicy,
    pipeline: PipelineRef,
    step: StepFn,
}

impl FnStrategy {
    pub fn new<F>(name: &str, step: F) -> Self
    where
        F: FnMut(Option<Frame>, &PipelineRef) -> Result<StrategyOutcome> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            policy: LogPolicy::default(),
            pipeline: PipelineRef::detached("unbound"),
            step: Box::new(step),
        }
    }

    pub fn handle<F>(name: &str, step: F) -> StrategyHandle
    where
        F: FnMut(Option<Frame>, &PipelineRef) -> Result<StrategyOutcome> + Send + 'static,
    {
        StrategyHandle::new(Self::new(name, step))
    }
}

impl Loggable for FnStrategy {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn log_policy(&self) -> LogPolicy {
        self.policy
    }
}

impl Strategy for FnStrategy {
    fn set_log_policy(&mut self, policy: LogPolicy) {
        self.policy = policy;
    }

    fn bind_pipeline(&mut self, pipeline: PipelineRef) {
        self.pipeline = pipeline;
    }

    fn execute(&mut self, frame: Option<Frame>) -> Result<StrategyOutcome> {
        (self.step)(frame, &self.pipeline)
    }
}

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
