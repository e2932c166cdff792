use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use crate::eval::context::EvaluationContext;
use crate::eval::error::{EvalError, EvalResult};
use crate::eval::value::{Value, ValueType};

/// A pure conversion applied to a parameter value before the function body
/// sees it: parse a CIDR string, compile a regex, and so on. Constant
/// folding applies it once at load time; dynamic arguments go through it on
/// every evaluation.
pub type Transform = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

/// The capability every invocable function implements. New functions are
/// added by registering another implementation, never by touching the
/// evaluator.
pub trait Function: Send + Sync {
    fn descriptor(&self) -> &FunctionDescriptor;

    /// Evaluates the function against bound arguments. `Ok(None)` is a soft
    /// failure or a void return: the function could not (or does not)
    /// produce a value, which is not an error by itself.
    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>>;
}

/// Static metadata describing a callable: unique name, return type, ordered
/// parameters, human-readable description. Immutable after registration.
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    return_type: ValueType,
    params: Vec<ParameterDescriptor>,
    description: String,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        return_type: ValueType,
        params: Vec<ParameterDescriptor>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
            description: description.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> ValueType {
        self.return_type
    }

    pub fn params(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.params.iter().find(|p| p.name() == name)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("return_type", &self.return_type)
            .field("params", &self.params)
            .finish()
    }
}

/// Typed metadata for one function parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    name: String,
    value_type: ValueType,
    target_type: ValueType,
    optional: bool,
    default: Option<Value>,
    transform: Option<Transform>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            target_type: value_type,
            optional: false,
            default: None,
            transform: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::String)
    }

    pub fn long(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Long)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Boolean)
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Any)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.optional = true;
        self.default = Some(default);
        self
    }

    /// Attaches a conversion to `target_type`, applied once at fold time for
    /// constant arguments and per evaluation otherwise.
    pub fn transformed(
        mut self,
        target_type: ValueType,
        transform: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        self.target_type = target_type;
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn target_type(&self) -> ValueType {
        self.target_type
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub(crate) fn apply_transform(&self, function: &str, value: &Value) -> EvalResult<Value> {
        match &self.transform {
            Some(transform) => transform(value).map_err(|message| EvalError::InvalidArgument {
                function: function.to_string(),
                param: self.name.clone(),
                message,
            }),
            None => Ok(value.clone()),
        }
    }

    /// Looks the parameter up in the bound arguments; absence is a hard
    /// "missing required parameter" error.
    pub fn required(&self, args: &FunctionArgs) -> EvalResult<Value> {
        match self.lookup(args)? {
            Some(value) => Ok(value),
            None => Err(EvalError::MissingParameter {
                function: args.function().to_string(),
                param: self.name.clone(),
            }),
        }
    }

    /// Looks the parameter up in the bound arguments; absence falls back to
    /// the declared default, or `None`.
    pub fn optional_value(&self, args: &FunctionArgs) -> EvalResult<Option<Value>> {
        match self.lookup(args)? {
            Some(value) => Ok(Some(value)),
            None => Ok(self.default.clone()),
        }
    }

    /// Required lookup plus a string type check, the most common shape.
    pub fn required_string(&self, args: &FunctionArgs) -> EvalResult<String> {
        match self.required(args)? {
            Value::String(s) => Ok(s),
            other => Err(EvalError::TypeMismatch {
                expected: ValueType::String,
                actual: other.value_type(),
            }),
        }
    }

    pub fn required_bool(&self, args: &FunctionArgs) -> EvalResult<bool> {
        match self.required(args)? {
            Value::Boolean(b) => Ok(b),
            other => Err(EvalError::TypeMismatch {
                expected: ValueType::Boolean,
                actual: other.value_type(),
            }),
        }
    }

    fn lookup(&self, args: &FunctionArgs) -> EvalResult<Option<Value>> {
        match args.get(&self.name) {
            // folded values went through the transform at load time
            Some(BoundValue::Precomputed(value)) => Ok(Some(value.clone())),
            Some(BoundValue::Evaluated(value)) => {
                self.apply_transform(args.function(), value).map(Some)
            }
            None => Ok(None),
        }
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("target_type", &self.target_type)
            .field("optional", &self.optional)
            .field("default", &self.default)
            .field("has_transform", &self.transform.is_some())
            .finish()
    }
}

/// Arguments of one function invocation, bound by name. A bound value is
/// either the precomputed constant cached on the AST or the freshly
/// evaluated argument expression; absent arguments are simply not present.
#[derive(Debug, Clone)]
pub struct FunctionArgs {
    function: String,
    values: HashMap<String, BoundValue>,
}

#[derive(Debug, Clone)]
pub enum BoundValue {
    Precomputed(Value),
    Evaluated(Value),
}

impl FunctionArgs {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            values: HashMap::new(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn bind_precomputed(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), BoundValue::Precomputed(value));
    }

    pub fn bind_evaluated(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), BoundValue::Evaluated(value));
    }

    pub fn get(&self, name: &str) -> Option<&BoundValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
