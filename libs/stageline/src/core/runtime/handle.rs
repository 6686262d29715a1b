// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::sync::{Arc, Weak};

use crate::core::error::{Result, StageError};
use crate::core::pubsub::{EventPayload, EventPriority, EventTopic};

use super::pipeline::Pipeline;

/// Non-owning reference to a [`Pipeline`].
///
/// Held by the pipeline's router and by pipeline-aware strategies. It never
/// keeps the pipeline alive; every operation degrades to a no-op once the
/// pipeline has been dropped.
#[derive(Clone)]
pub struct PipelineRef {
    name: Arc<str>,
    inner: Weak<Pipeline>,
}

impl PipelineRef {
    pub(crate) fn new(name: Arc<str>, inner: Weak<Pipeline>) -> Self {
        Self { name, inner }
    }

    /// A reference bound to no pipeline. Useful for standalone routers.
    pub fn detached(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            inner: Weak::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upgrade(&self) -> Option<Arc<Pipeline>> {
        self.inner.upgrade()
    }

    pub fn is_bound(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Returns false when no pipeline is bound.
    pub fn request_frame_interrupt(&self) -> bool {
        match self.upgrade() {
            Some(pipeline) => {
                pipeline.request_frame_interrupt();
                true
            }
            None => false,
        }
    }

    /// Publish through the pipeline's router.
    pub fn publish(
        &self,
        topic: impl Into<EventTopic>,
        data: EventPayload,
        sender: Option<&str>,
        priority: EventPriority,
    ) -> Result<()> {
        let pipeline = self
            .upgrade()
            .ok_or_else(|| StageError::NotFound(format!("pipeline '{}' was dropped", self.name)))?;
        pipeline.router().publish(topic, data, sender, priority)
    }

    pub(crate) fn raise_fatal(&self, err: StageError) {
        if let Some(pipeline) = self.upgrade() {
            pipeline.raise_fatal(err);
        }
    }
}

impl fmt::Debug for PipelineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRef")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}
