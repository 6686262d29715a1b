// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-pipeline event router.
//!
//! Strategies publish here with an [`EventPriority`]. The router applies the
//! per-topic [`EventPolicy`] first (DROP short-circuits everything), then:
//!
//! ```text
//! DEFERRED  ──► FIFO queue ──► process_deferred() at end of step ──► subscribers
//! IMMEDIATE ──► subscribers (synchronous)
//! INTERRUPT ──► subscribers (synchronous) ──► pipeline.request_frame_interrupt()
//! CRITICAL  ──► Err(StageError::Critical) + pipeline fatal slot (no delivery)
//! ```
//!
//! System topics ([`EventTopic::System`]) are bridged to the injected
//! [`EventHub`] whenever they are dispatched locally.

use std::borrow::Cow;
use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::hub::EventHub;
use super::payload::{EventCallback, EventPayload};
use super::priority::EventPriority;
use super::topic::EventTopic;
use crate::core::error::{Result, StageError};
use crate::core::logging::{self, Loggable};
use crate::core::policies::{EventPolicy, LogLevel, LogPolicy};
use crate::core::runtime::PipelineRef;

/// Builds the router for a pipeline under construction. Receives a
/// non-owning reference to that pipeline.
pub type RouterFactory = Arc<dyn Fn(PipelineRef) -> EventRouter + Send + Sync>;

pub struct EventRouter {
    pipeline: RwLock<PipelineRef>,
    hub: Option<Arc<EventHub>>,
    subscribers: Mutex<HashMap<EventTopic, Vec<EventCallback>>>,
    deferred: Mutex<VecDeque<(EventTopic, EventPayload)>>,
    policies: RwLock<HashMap<EventTopic, EventPolicy>>,
    log_policy: RwLock<LogPolicy>,
}

impl EventRouter {
    pub fn new(pipeline: PipelineRef, hub: Option<Arc<EventHub>>) -> Self {
        Self {
            pipeline: RwLock::new(pipeline),
            hub,
            subscribers: Mutex::new(HashMap::new()),
            deferred: Mutex::new(VecDeque::new()),
            policies: RwLock::new(HashMap::new()),
            log_policy: RwLock::new(LogPolicy::default()),
        }
    }

    /// Factory producing default routers bridged to `hub`.
    pub fn standard_factory(hub: Arc<EventHub>) -> RouterFactory {
        Arc::new(move |pipeline| EventRouter::new(pipeline, Some(Arc::clone(&hub))))
    }

    /// Re-bind the owning pipeline.
    pub fn set_pipeline(&self, pipeline: PipelineRef) {
        *self.pipeline.write() = pipeline;
    }

    pub fn pipeline(&self) -> PipelineRef {
        self.pipeline.read().clone()
    }

    pub fn hub(&self) -> Option<&Arc<EventHub>> {
        self.hub.as_ref()
    }

    pub fn set_log_policy(&self, policy: LogPolicy) {
        *self.log_policy.write() = policy;
    }

    pub fn set_event_policy(&self, topic: impl Into<EventTopic>, policy: EventPolicy) {
        self.policies.write().insert(topic.into(), policy);
    }

    pub fn event_policy(&self, topic: &EventTopic) -> EventPolicy {
        self.policies.read().get(topic).copied().unwrap_or_default()
    }

    /// Dispatch `topic` without logging it.
    pub fn mute_log_for(&self, topic: impl Into<EventTopic>) {
        self.set_event_policy(topic, EventPolicy::silent());
    }

    pub fn subscribe<F>(&self, topic: impl Into<EventTopic>, callback: F)
    where
        F: Fn(&EventPayload) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe_callback(topic, Arc::new(callback));
    }

    pub fn subscribe_callback(&self, topic: impl Into<EventTopic>, callback: EventCallback) {
        self.subscribers
            .lock()
            .entry(topic.into())
            .or_default()
            .push(callback);
    }

    pub fn subscriber_count(&self, topic: &EventTopic) -> usize {
        self.subscribers.lock().get(topic).map_or(0, Vec::len)
    }

    /// Route one event. Only a CRITICAL publish returns an error; callers
    /// inside a strategy propagate it with `?`.
    pub fn publish(
        &self,
        topic: impl Into<EventTopic>,
        data: EventPayload,
        sender: Option<&str>,
        priority: EventPriority,
    ) -> Result<()> {
        let topic = topic.into();
        let policy = self.event_policy(&topic);

        if policy.is_dropped() {
            return Ok(());
        }

        // Double gate: the router's own INFO permission, or a priority high
        // enough that it must always be visible.
        if !policy.is_mute()
            && (self.log_policy().is_allowed(LogLevel::INFO)
                || priority >= EventPriority::Interrupt)
        {
            tracing::info!(
                "[{}] [PUB] {} from {} (Priority: {})",
                self.name(),
                topic,
                sender.unwrap_or("External"),
                priority
            );
        }

        match priority {
            EventPriority::Critical => {
                let err = StageError::critical(&topic, sender);
                self.pipeline.read().raise_fatal(err.duplicate());
                Err(err)
            }
            EventPriority::Immediate | EventPriority::Interrupt => {
                self.dispatch_now(&topic, &data);
                if priority == EventPriority::Interrupt
                    && !self.pipeline.read().request_frame_interrupt()
                {
                    logging::warn(self, "Interrupt requested but Pipeline is not bound!");
                }
                Ok(())
            }
            EventPriority::Deferred => {
                self.deferred.lock().push_back((topic, data));
                Ok(())
            }
        }
    }

    /// DEFERRED publish with no sender.
    pub fn post(&self, topic: impl Into<EventTopic>, data: EventPayload) {
        // Deferred publishes cannot fail.
        let _ = self.publish(topic, data, None, EventPriority::Deferred);
    }

    /// Forward straight to the global hub, bypassing local policy.
    pub fn publish_global(&self, topic: impl Into<EventTopic>, data: EventPayload) {
        if let Some(hub) = &self.hub {
            hub.publish(topic, data);
        }
    }

    /// End-of-step flush. Drains only the entries queued before the call;
    /// anything handlers enqueue now waits for the next flush.
    pub fn process_deferred(&self) {
        let count = self.deferred.lock().len();
        if count == 0 {
            return;
        }
        logging::info(self, "[FLUSH] Processing deferred event queue...");

        for _ in 0..count {
            let Some((topic, data)) = self.deferred.lock().pop_front() else {
                break;
            };
            self.dispatch_now(&topic, &data);
        }
    }

    pub fn pending_deferred(&self) -> usize {
        self.deferred.lock().len()
    }

    fn dispatch_now(&self, topic: &EventTopic, data: &EventPayload) {
        let callbacks: Vec<EventCallback> = self
            .subscribers
            .lock()
            .get(topic)
            .cloned()
            .unwrap_or_default();

        if self.log_policy().is_allowed(LogLevel::INFO) {
            if callbacks.is_empty() {
                if !topic.is_system() {
                    logging::warn(self, format!("[NO_SUB] {topic} has no subscribers!"));
                }
            } else {
                logging::info(
                    self,
                    format!("[DISPATCH] {topic} -> {} handlers", callbacks.len()),
                );
            }
        }

        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(data))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => logging::error(self, format!("Handler Error in {topic}: {e}")),
                Err(_) => logging::error(self, format!("Handler Error in {topic}: handler panicked")),
            }
        }

        if topic.is_system() {
            self.publish_global(topic, data.clone());
        }
    }
}

impl Loggable for EventRouter {
    fn name(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}.Router", self.pipeline.read().name()))
    }

    fn log_policy(&self) -> LogPolicy {
        *self.log_policy.read()
    }
}
