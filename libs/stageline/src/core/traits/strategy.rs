// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::core::error::Result;
use crate::core::frames::{ComponentTag, Frame};
use crate::core::logging::Loggable;
use crate::core::policies::LogPolicy;
use crate::core::runtime::PipelineRef;

/// Result of one [`Strategy::execute`] call.
///
/// `success == false` truncates the chain for the current step and the
/// returned frame (if any) is disposed.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub success: bool,
    pub frame: Option<Frame>,
}

impl StrategyOutcome {
    pub fn ok(frame: Frame) -> Self {
        Self {
            success: true,
            frame: Some(frame),
        }
    }

    /// Success that hands on whatever came in, frame or not.
    pub fn pass(frame: Option<Frame>) -> Self {
        Self {
            success: true,
            frame,
        }
    }

    pub fn fail(frame: Option<Frame>) -> Self {
        Self {
            success: false,
            frame,
        }
    }
}

/// One stage of a pipeline's processing chain.
///
/// The first strategy in a chain receives `None` and is expected to produce
/// the frame; every later strategy receives the previous one's output.
/// Returning `Err` is a contained stage error, except for
/// [`StageError::Critical`](crate::core::error::StageError::Critical) which
/// escalates out of the step.
pub trait Strategy: Loggable + Send + 'static {
    fn set_log_policy(&mut self, policy: LogPolicy);

    /// Components this stage expects on its input. Informational only.
    fn required_components(&self) -> Vec<ComponentTag> {
        Vec::new()
    }

    /// Called when the strategy joins a pipeline. Pipeline-aware strategies
    /// keep the reference to publish events or request interrupts.
    fn bind_pipeline(&mut self, _pipeline: PipelineRef) {}

    fn execute(&mut self, frame: Option<Frame>) -> Result<StrategyOutcome>;

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Shared, lockable handle to a strategy in a chain.
///
/// The name is captured once at construction and the log policy is mirrored
/// on every [`set_log_policy`](Self::set_log_policy), so chain layout and
/// removal by name never need the strategy lock. Equality is identity.
#[derive(Clone)]
pub struct StrategyHandle {
    name: Arc<str>,
    log_policy: Arc<RwLock<LogPolicy>>,
    inner: Arc<Mutex<dyn Strategy>>,
}

impl StrategyHandle {
    pub fn new<S: Strategy>(strategy: S) -> Self {
        let name: Arc<str> = Arc::from(strategy.name().as_ref());
        let log_policy = Arc::new(RwLock::new(strategy.log_policy()));
        let inner: Arc<Mutex<dyn Strategy>> = Arc::new(Mutex::new(strategy));
        Self {
            name,
            log_policy,
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lock the strategy. Must not be called from inside the same
    /// strategy's `execute`.
    pub fn lock(&self) -> MutexGuard<'_, dyn Strategy> {
        self.inner.lock()
    }

    /// Policy the strategy reported when it was last set through this
    /// handle. Does not lock the strategy.
    pub fn log_policy(&self) -> LogPolicy {
        *self.log_policy.read()
    }

    /// Hand `policy` to the strategy and mirror what it actually keeps.
    /// Locks the strategy.
    pub fn set_log_policy(&self, policy: LogPolicy) {
        let effective = {
            let mut inner = self.inner.lock();
            inner.set_log_policy(policy);
            inner.log_policy()
        };
        *self.log_policy.write() = effective;
    }

    pub fn ptr_eq(&self, other: &StrategyHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for StrategyHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for StrategyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<S: Strategy> From<S> for StrategyHandle {
    fn from(strategy: S) -> Self {
        Self::new(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    struct Noop {
        policy: LogPolicy,
    }

    impl Loggable for Noop {
        fn name(&self) -> Cow<'_, str> {
            Cow::Borrowed("Noop_0")
        }

        fn log_policy(&self) -> LogPolicy {
            self.policy
        }
    }

    impl Strategy for Noop {
        fn set_log_policy(&mut self, policy: LogPolicy) {
            self.policy = policy;
        }

        fn execute(&mut self, frame: Option<Frame>) -> Result<StrategyOutcome> {
            Ok(StrategyOutcome::pass(frame))
        }
    }

    #[test]
    fn test_handle_caches_name_and_compares_by_identity() {
        let a = StrategyHandle::new(Noop {
            policy: LogPolicy::default(),
        });
        let b = StrategyHandle::new(Noop {
            policy: LogPolicy::default(),
        });
        assert_eq!(a.name(), "Noop_0");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_log_policy_through_handle() {
        let h = StrategyHandle::new(Noop {
            policy: LogPolicy::default(),
        });
        h.set_log_policy(LogPolicy::silent());
        assert_eq!(h.log_policy(), LogPolicy::silent());
        assert_eq!(h.lock().log_policy(), LogPolicy::silent());
    }

    #[test]
    fn test_log_policy_readable_while_strategy_locked() {
        let h = StrategyHandle::new(Noop {
            policy: LogPolicy::errors_only(),
        });
        let _guard = h.lock();
        assert_eq!(h.clone().log_policy(), LogPolicy::errors_only());
    }

    #[test]
    fn test_outcome_helpers() {
        assert!(StrategyOutcome::ok(Frame::new()).success);
        assert!(StrategyOutcome::pass(None).frame.is_none());
        assert!(!StrategyOutcome::fail(None).success);
    }
}
