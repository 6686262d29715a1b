// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide pub/sub for low-frequency control and alert traffic.
//!
//! Owned by the application and injected into pipelines; there is no global
//! singleton. No priorities and no deferral: publish dispatches synchronously
//! on the calling thread.

use std::borrow::Cow;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use parking_lot::{Mutex, RwLock};

use super::payload::{EventCallback, EventPayload};
use super::topic::EventTopic;
use crate::core::error::Result;
use crate::core::logging::{self, Loggable};
use crate::core::policies::LogPolicy;

pub struct EventHub {
    subscribers: Mutex<HashMap<EventTopic, Vec<EventCallback>>>,
    log_policy: RwLock<LogPolicy>,
}

impl EventHub {
    pub fn new() -> Self {
        let hub = Self {
            subscribers: Mutex::new(HashMap::new()),
            log_policy: RwLock::new(LogPolicy::default()),
        };
        logging::info(&hub, "EventHub initialized.");
        hub
    }

    pub fn set_log_policy(&self, policy: LogPolicy) {
        *self.log_policy.write() = policy;
    }

    pub fn subscribe<F>(&self, topic: impl Into<EventTopic>, callback: F)
    where
        F: Fn(&EventPayload) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe_callback(topic, std::sync::Arc::new(callback));
    }

    pub fn subscribe_callback(&self, topic: impl Into<EventTopic>, callback: EventCallback) {
        self.subscribers
            .lock()
            .entry(topic.into())
            .or_default()
            .push(callback);
    }

    /// Deliver `data` to every subscriber of `topic`.
    ///
    /// The subscriber list is snapshotted under the lock and invoked outside
    /// it, so callbacks may subscribe or publish re-entrantly. A failing or
    /// panicking callback is logged and the rest still run.
    pub fn publish(&self, topic: impl Into<EventTopic>, data: EventPayload) {
        let topic = topic.into();
        let callbacks: Vec<EventCallback> = self
            .subscribers
            .lock()
            .get(&topic)
            .cloned()
            .unwrap_or_default();

        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(&data))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => logging::error(self, format!("Dispatch Error [{topic}]: {e}")),
                Err(_) => logging::error(self, format!("Dispatch Error [{topic}]: handler panicked")),
            }
        }
    }

    pub fn subscriber_count(&self, topic: impl Into<EventTopic>) -> usize {
        self.subscribers
            .lock()
            .get(&topic.into())
            .map_or(0, Vec::len)
    }

    /// Remove every subscription (shutdown).
    pub fn clear(&self) {
        self.subscribers.lock().clear();
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Loggable for EventHub {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed("EventHub")
    }

    fn log_policy(&self) -> LogPolicy {
        *self.log_policy.read()
    }
}
