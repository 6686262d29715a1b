// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::{Mutex, RwLock};

use crate::core::error::{Result, StageError};
use crate::core::traits::{Strategy, StrategyHandle};

/// Per-type instance counters behind auto-generated names.
static NAME_COUNTERS: LazyLock<Mutex<HashMap<String, usize>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Names and constructs strategies.
pub struct StrategyFactory;

impl StrategyFactory {
    /// Next `<type_name>_<n>` name. Counters are process-wide and start at 0.
    pub fn next_name(type_name: &str) -> String {
        let mut counters = NAME_COUNTERS.lock();
        let counter = counters.entry(type_name.to_string()).or_insert(0);
        let name = format!("{type_name}_{counter}");
        *counter += 1;
        name
    }

    /// Build a strategy, injecting `custom_name` or an auto-generated one.
    pub fn create<S, F>(type_name: &str, custom_name: Option<&str>, ctor: F) -> Result<StrategyHandle>
    where
        S: Strategy,
        F: FnOnce(String) -> Result<S>,
    {
        let name = match custom_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => Self::next_name(type_name),
        };
        Ok(StrategyHandle::new(ctor(name)?))
    }
}

/// Type-erased constructor: receives the final strategy name.
pub type StrategyConstructorFn = Box<dyn Fn(String) -> Result<StrategyHandle> + Send + Sync>;

/// Maps strategy type names (as written in settings files) to constructors.
#[derive(Default)]
pub struct StrategyRegistry {
    constructors: RwLock<HashMap<String, StrategyConstructorFn>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<S, F>(&self, type_name: &str, ctor: F)
    where
        S: Strategy,
        F: Fn(String) -> Result<S> + Send + Sync + 'static,
    {
        let boxed: StrategyConstructorFn =
            Box::new(move |name: String| -> Result<StrategyHandle> {
                Ok(StrategyHandle::new(ctor(name)?))
            });
        if self
            .constructors
            .write()
            .insert(type_name.to_string(), boxed)
            .is_some()
        {
            tracing::warn!("[StrategyRegistry] '{}' re-registered; previous constructor replaced", type_name);
        }
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.read().contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Construct a registered type, auto-naming it unless `custom_name` is set.
    pub fn create(&self, type_name: &str, custom_name: Option<&str>) -> Result<StrategyHandle> {
        let constructors = self.constructors.read();
        let ctor = constructors.get(type_name).ok_or_else(|| {
            StageError::NotFound(format!("strategy type '{type_name}' is not registered"))
        })?;
        let name = match custom_name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => StrategyFactory::next_name(type_name),
        };
        ctor(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frames::Frame;
    use crate::core::logging::Loggable;
    use crate::core::policies::LogPolicy;
    use crate::core::traits::StrategyOutcome;
    use std::borrow::Cow;

    struct Echo {
        name: String,
    }

    impl Loggable for Echo {
        fn name(&self) -> Cow<'_, str> {
            Cow::Borrowed(&self.name)
        }

        fn log_policy(&self) -> LogPolicy {
            LogPolicy::default()
        }
    }

    impl Strategy for Echo {
        fn set_log_policy(&mut self, _policy: LogPolicy) {}

        fn execute(&mut self, frame: Option<Frame>) -> Result<StrategyOutcome> {
            Ok(StrategyOutcome::pass(frame))
        }
    }

    #[test]
    fn test_auto_names_count_per_type() {
        let a = StrategyFactory::create("FactoryEchoA", None, |name| Ok(Echo { name })).unwrap();
        let b = StrategyFactory::create("FactoryEchoA", None, |name| Ok(Echo { name })).unwrap();
        let c = StrategyFactory::create("FactoryEchoB", None, |name| Ok(Echo { name })).unwrap();
        assert_eq!(a.name(), "FactoryEchoA_0");
        assert_eq!(b.name(), "FactoryEchoA_1");
        assert_eq!(c.name(), "FactoryEchoB_0");
    }

    #[test]
    fn test_custom_name_wins() {
        let s = StrategyFactory::create("FactoryEchoC", Some("Main"), |name| Ok(Echo { name })).unwrap();
        assert_eq!(s.name(), "Main");
        // An explicit name does not consume a counter slot.
        assert_eq!(StrategyFactory::next_name("FactoryEchoC"), "FactoryEchoC_0");
    }

    #[test]
    fn test_constructor_error_propagates() {
        let err = StrategyFactory::create::<Echo, _>("FactoryEchoD", None, |_| {
            Err(StageError::Configuration("no camera".into()))
        })
        .unwrap_err();
        assert!(matches!(err, StageError::Configuration(_)));
    }

    #[test]
    fn test_registry() {
        let registry = StrategyRegistry::new();
        registry.register("RegistryEcho", |name| Ok(Echo { name }));
        assert!(registry.contains("RegistryEcho"));
        assert_eq!(registry.type_names(), vec!["RegistryEcho"]);

        let s = registry.create("RegistryEcho", None).unwrap();
        assert_eq!(s.name(), "RegistryEcho_0");
        let s = registry.create("RegistryEcho", Some("Named")).unwrap();
        assert_eq!(s.name(), "Named");

        assert!(matches!(
            registry.create("Missing", None),
            Err(StageError::NotFound(_))
        ));
    }
}
