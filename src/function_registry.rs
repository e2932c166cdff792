use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::eval::error::EvalError;
use crate::functions;
use crate::functions::types::{Function, FunctionDescriptor};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("function `{0}` is already registered")]
    AlreadyRegistered(String),
}

/// Catalogue of invocable functions, keyed by unique name.
///
/// Constructed explicitly and handed to the interpreter; never ambient
/// global state. Registration happens at process start (or a plugin-load
/// event), after which the registry is only read.
pub struct FunctionRegistry {
    functions: DashMap<String, Arc<dyn Function>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: DashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in function set.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for function in functions::builtins() {
            // builtin names are statically unique
            registry
                .register(function)
                .expect("duplicate builtin function name");
        }
        registry
    }

    pub fn register(&self, function: Arc<dyn Function>) -> Result<(), RegistryError> {
        let name = function.descriptor().name().to_string();
        match self.functions.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::AlreadyRegistered(name))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(function);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).map(|entry| entry.value().clone())
    }

    pub fn resolve_or_err(&self, name: &str) -> Result<Arc<dyn Function>, EvalError> {
        self.resolve(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))
    }

    /// Registered function names, sorted for stable introspection output.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Self-describing metadata for validation and tooling.
    pub fn descriptors(&self) -> Vec<FunctionDescriptor> {
        let mut descriptors: Vec<FunctionDescriptor> = self
            .functions
            .iter()
            .map(|e| e.value().descriptor().clone())
            .collect();
        descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::context::EvaluationContext;
    use crate::eval::error::EvalResult;
    use crate::eval::value::{Value, ValueType};
    use crate::functions::types::FunctionArgs;

    struct Dummy {
        descriptor: FunctionDescriptor,
    }

    impl Dummy {
        fn named(name: &str) -> Arc<dyn Function> {
            Arc::new(Self {
                descriptor: FunctionDescriptor::new(name, ValueType::Long, vec![], "test dummy"),
            })
        }
    }

    impl Function for Dummy {
        fn descriptor(&self) -> &FunctionDescriptor {
            &self.descriptor
        }

        fn evaluate(
            &self,
            _args: &FunctionArgs,
            _context: &mut EvaluationContext,
        ) -> EvalResult<Option<Value>> {
            Ok(Some(Value::Long(1)))
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = FunctionRegistry::new();
        registry.register(Dummy::named("one")).unwrap();

        assert!(registry.resolve("one").is_some());
        assert!(registry.resolve("two").is_none());
        assert_eq!(
            registry.resolve_or_err("two").err().unwrap(),
            EvalError::UnknownFunction("two".into())
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = FunctionRegistry::new();
        registry.register(Dummy::named("one")).unwrap();

        let result = registry.register(Dummy::named("one"));
        assert_eq!(result, Err(RegistryError::AlreadyRegistered("one".into())));
        // the original registration is untouched
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = FunctionRegistry::with_builtins();
        for name in [
            "set_field",
            "has_field",
            "to_long",
            "regex",
            "cidr_match",
            "route_to_stream",
            "drop_message",
            "remove_from_stream_destination",
        ] {
            assert!(registry.resolve(name).is_some(), "missing builtin {name}");
        }
    }

    #[test]
    fn test_names_sorted() {
        let registry = FunctionRegistry::new();
        registry.register(Dummy::named("zeta")).unwrap();
        registry.register(Dummy::named("alpha")).unwrap();
        assert_eq!(registry.names(), vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
