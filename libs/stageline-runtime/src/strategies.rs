// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Built-in strategies available to settings files.

use std::borrow::Cow;

use stageline::core::logging;
use stageline::core::prelude::*;
use stageline::core::pubsub::{PipelineControlCommand, PipelineControlPayload};
use stageline::core::StrategyRegistry;

/// Sequence number stamped on every frame by [`TickSource`].
#[derive(Debug, Clone, Copy)]
pub struct Tick(pub u64);

pub const TICK_TOPIC: &str = "frame.tick";

/// Chain head: creates a frame per step and announces it.
pub struct TickSource {
    name: String,
    policy: LogPolicy,
    pipeline: PipelineRef,
    next: u64,
}

impl TickSource {
    pub fn new(name: String) -> Self {
        Self {
            name,
            policy: LogPolicy::default(),
            pipeline: PipelineRef::detached("unbound"),
            next: 0,
        }
    }
}

impl Loggable for TickSource {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn log_policy(&self) -> LogPolicy {
        self.policy
    }
}

impl Strategy for TickSource {
    fn set_log_policy(&mut self, policy: LogPolicy) {
        self.policy = policy;
    }

    fn bind_pipeline(&mut self, pipeline: PipelineRef) {
        self.pipeline = pipeline;
    }

    fn execute(&mut self, _frame: Option<Frame>) -> Result<StrategyOutcome> {
        let tick = Tick(self.next);
        self.next += 1;
        self.pipeline.publish(
            TICK_TOPIC,
            EventPayload::new(tick),
            Some(self.name.as_str()),
            EventPriority::Deferred,
        )?;
        Ok(StrategyOutcome::ok(Frame::new().with(tick)))
    }
}

/// Counts frames carrying a [`Tick`]. With a limit, asks every pipeline to
/// stop once the limit is reached.
pub struct FrameCounter {
    name: String,
    policy: LogPolicy,
    pipeline: PipelineRef,
    seen: u64,
    limit: Option<u64>,
    report_every: u64,
}

impl FrameCounter {
    pub fn new(name: String, limit: Option<u64>) -> Self {
        Self {
            name,
            policy: LogPolicy::default(),
            pipeline: PipelineRef::detached("unbound"),
            seen: 0,
            limit,
            report_every: 30,
        }
    }
}

impl Loggable for FrameCounter {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn log_policy(&self) -> LogPolicy {
        self.policy
    }
}

impl Strategy for FrameCounter {
    fn set_log_policy(&mut self, policy: LogPolicy) {
        self.policy = policy;
    }

    fn required_components(&self) -> Vec<ComponentTag> {
        vec![ComponentTag::of::<Tick>()]
    }

    fn bind_pipeline(&mut self, pipeline: PipelineRef) {
        self.pipeline = pipeline;
    }

    fn execute(&mut self, frame: Option<Frame>) -> Result<StrategyOutcome> {
        let Some(tick) = frame.as_ref().and_then(|f| f.get::<Tick>()).copied() else {
            return Ok(StrategyOutcome::fail(frame));
        };
        self.seen += 1;
        if self.seen % self.report_every == 0 {
            logging::info(&*self, format!("{} frames (last tick {})", self.seen, tick.0));
        }

        if self.limit.is_some_and(|limit| self.seen >= limit) {
            logging::warn(&*self, format!("Frame limit {} reached", self.seen));
            let control = PipelineControlPayload::new(
                PipelineControlCommand::Stop,
                PipelineControlPayload::ALL,
            )
            .with_reason("frame limit reached");
            self.pipeline.publish(
                SystemEvent::PipelineControl,
                EventPayload::new(control),
                Some(self.name.as_str()),
                EventPriority::Deferred,
            )?;
        }
        Ok(StrategyOutcome::pass(frame))
    }

    fn cleanup(&mut self) -> Result<()> {
        logging::info(&*self, format!("Counted {} frames", self.seen));
        Ok(())
    }
}

/// Registry holding every built-in strategy type.
pub fn builtin_registry(frame_limit: Option<u64>) -> StrategyRegistry {
    let registry = StrategyRegistry::new();
    registry.register("TickSource", |name| Ok(TickSource::new(name)));
    registry.register("FrameCounter", move |name| Ok(FrameCounter::new(name, frame_limit)));
    registry
}
