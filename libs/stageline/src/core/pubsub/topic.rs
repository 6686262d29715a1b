// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::protocol::SystemEvent;

/// Key for subscriptions on both the router and the hub.
///
/// A topic is a string token, one of the enumerated [`SystemEvent`]s, or the
/// identity of a Rust type (for events that carry that type as payload).
#[derive(Clone)]
pub enum EventTopic {
    Named(Arc<str>),
    System(SystemEvent),
    Type { id: TypeId, name: &'static str },
}

impl EventTopic {
    pub fn named(name: impl AsRef<str>) -> Self {
        Self::Named(Arc::from(name.as_ref()))
    }

    /// Topic keyed on the type `T`.
    pub fn of<T: 'static>() -> Self {
        Self::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Parse a settings-file key: system topic names map to
    /// [`EventTopic::System`], anything else is a named topic.
    pub fn parse(key: &str) -> Self {
        match SystemEvent::from_name(key) {
            Some(system) => Self::System(system),
            None => Self::named(key),
        }
    }

    /// Topics that are bridged from a pipeline router to the global hub.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System(_))
    }
}

impl PartialEq for EventTopic {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Named(a), Self::Named(b)) => a == b,
            (Self::System(a), Self::System(b)) => a == b,
            (Self::Type { id: a, .. }, Self::Type { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for EventTopic {}

impl Hash for EventTopic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Named(name) => name.hash(state),
            Self::System(system) => system.hash(state),
            Self::Type { id, .. } => id.hash(state),
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::System(system) => f.write_str(system.as_str()),
            Self::Type { name, .. } => f.write_str(name.rsplit("::").next().unwrap_or(name)),
        }
    }
}

impl fmt::Debug for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "Named({name:?})"),
            Self::System(system) => write!(f, "System({system:?})"),
            Self::Type { name, .. } => write!(f, "Type({name})"),
        }
    }
}

impl From<&str> for EventTopic {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for EventTopic {
    fn from(name: String) -> Self {
        Self::Named(Arc::from(name))
    }
}

impl From<SystemEvent> for EventTopic {
    fn from(system: SystemEvent) -> Self {
        Self::System(system)
    }
}

impl From<&EventTopic> for EventTopic {
    fn from(topic: &EventTopic) -> Self {
        topic.clone()
    }
}
