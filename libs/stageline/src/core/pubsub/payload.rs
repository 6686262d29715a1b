// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::error::Result;

/// Shared, type-erased event data. Cloning is cheap.
#[derive(Clone, Default)]
pub struct EventPayload(Option<Arc<dyn Any + Send + Sync>>);

impl EventPayload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    /// A payload carrying nothing.
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|value| value.downcast_ref::<T>())
    }

    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }
}

impl fmt::Debug for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("EventPayload(..)"),
            None => f.write_str("EventPayload(empty)"),
        }
    }
}

/// Subscriber callback. Invoked synchronously on the publishing thread.
pub type EventCallback = Arc<dyn Fn(&EventPayload) -> Result<()> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast() {
        let payload = EventPayload::new(42u32);
        assert_eq!(payload.downcast_ref::<u32>(), Some(&42));
        assert!(payload.downcast_ref::<i64>().is_none());
        assert!(payload.is::<u32>());
        assert!(EventPayload::empty().is_empty());
        assert!(EventPayload::default().downcast_ref::<u32>().is_none());
    }
}
