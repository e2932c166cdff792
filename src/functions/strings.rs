//! String manipulation functions.

use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalResult;
use crate::eval::value::{Value, ValueType};
use crate::functions::types::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};

pub struct Uppercase {
    value: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl Uppercase {
    pub const NAME: &'static str = "uppercase";

    pub fn new() -> Self {
        let value = ParameterDescriptor::string("value");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::String,
            vec![value.clone()],
            "Uppercases a string",
        );
        Self { value, descriptor }
    }
}

impl Function for Uppercase {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let value = self.value.required_string(args)?;
        Ok(Some(Value::String(value.to_uppercase())))
    }
}

pub struct Lowercase {
    value: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl Lowercase {
    pub const NAME: &'static str = "lowercase";

    pub fn new() -> Self {
        let value = ParameterDescriptor::string("value");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::String,
            vec![value.clone()],
            "Lowercases a string",
        );
        Self { value, descriptor }
    }
}

impl Function for Lowercase {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let value = self.value.required_string(args)?;
        Ok(Some(Value::String(value.to_lowercase())))
    }
}

pub struct Concat {
    first: ParameterDescriptor,
    second: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl Concat {
    pub const NAME: &'static str = "concat";

    pub fn new() -> Self {
        let first = ParameterDescriptor::string("first");
        let second = ParameterDescriptor::string("second");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::String,
            vec![first.clone(), second.clone()],
            "Concatenates two strings",
        );
        Self {
            first,
            second,
            descriptor,
        }
    }
}

impl Function for Concat {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let mut first = self.first.required_string(args)?;
        let second = self.second.required_string(args)?;
        first.push_str(&second);
        Ok(Some(Value::String(first)))
    }
}
