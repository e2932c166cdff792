//! Regular expression matching.

use std::collections::HashMap;

use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalResult;
use crate::eval::value::{Pattern, Value, ValueType};
use crate::functions::types::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};

/// `regex(pattern, value)` — matches `value` against `pattern` and returns a
/// map with a `matched` boolean and the numbered capture groups.
///
/// The pattern parameter carries a compile transform, so a literal pattern is
/// compiled exactly once when the rule set loads; an invalid literal pattern
/// is a load error, not a per-message one.
pub struct RegexMatch {
    pattern: ParameterDescriptor,
    value: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl RegexMatch {
    pub const NAME: &'static str = "regex";

    pub fn new() -> Self {
        let pattern =
            ParameterDescriptor::string("pattern").transformed(ValueType::Pattern, |value| {
                match value {
                    Value::Pattern(p) => Ok(Value::Pattern(p.clone())),
                    Value::String(s) => Pattern::compile(s)
                        .map(Value::Pattern)
                        .map_err(|e| e.to_string()),
                    other => Err(format!("expected a pattern string, got {}", other.value_type())),
                }
            });
        let value = ParameterDescriptor::string("value");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Map,
            vec![pattern.clone(), value.clone()],
            "Matches a value against a regular expression",
        );
        Self {
            pattern,
            value,
            descriptor,
        }
    }
}

impl Function for RegexMatch {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let pattern = match self.pattern.required(args)? {
            Value::Pattern(pattern) => pattern,
            other => {
                return Err(crate::eval::error::EvalError::TypeMismatch {
                    expected: ValueType::Pattern,
                    actual: other.value_type(),
                })
            }
        };
        let value = self.value.required_string(args)?;

        let mut result = HashMap::new();
        match pattern.regex().captures(&value) {
            Some(captures) => {
                result.insert("matched".to_string(), Value::Boolean(true));
                for (i, group) in captures.iter().enumerate().skip(1) {
                    if let Some(group) = group {
                        result.insert(i.to_string(), Value::String(group.as_str().to_string()));
                    }
                }
            }
            None => {
                result.insert("matched".to_string(), Value::Boolean(false));
            }
        }
        Ok(Some(Value::Map(result)))
    }
}
