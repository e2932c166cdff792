//! Field access and mutation functions.

use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalResult;
use crate::eval::value::{Value, ValueType};
use crate::functions::types::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};

pub struct HasField {
    field: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl HasField {
    pub const NAME: &'static str = "has_field";

    pub fn new() -> Self {
        let field = ParameterDescriptor::string("field");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Boolean,
            vec![field.clone()],
            "Checks whether the message has the given field",
        );
        Self { field, descriptor }
    }
}

impl Function for HasField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let field = self.field.required_string(args)?;
        Ok(Some(Value::Boolean(context.message().has_field(&field))))
    }
}

pub struct GetField {
    field: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl GetField {
    pub const NAME: &'static str = "get_field";

    pub fn new() -> Self {
        let field = ParameterDescriptor::string("field");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Any,
            vec![field.clone()],
            "Returns the value of a message field, or nothing when absent",
        );
        Self { field, descriptor }
    }
}

impl Function for GetField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let field = self.field.required_string(args)?;
        Ok(context.message().field(&field).cloned())
    }
}

pub struct SetField {
    field: ParameterDescriptor,
    value: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl SetField {
    pub const NAME: &'static str = "set_field";

    pub fn new() -> Self {
        let field = ParameterDescriptor::string("field");
        let value = ParameterDescriptor::any("value");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Void,
            vec![field.clone(), value.clone()],
            "Sets a field on the message",
        );
        Self {
            field,
            value,
            descriptor,
        }
    }
}

impl Function for SetField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let field = self.field.required_string(args)?;
        let value = self.value.required(args)?;
        context.message_mut().set_field(field, value);
        Ok(None)
    }
}

pub struct RemoveField {
    field: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl RemoveField {
    pub const NAME: &'static str = "remove_field";

    pub fn new() -> Self {
        let field = ParameterDescriptor::string("field");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Void,
            vec![field.clone()],
            "Removes a field from the message",
        );
        Self { field, descriptor }
    }
}

impl Function for RemoveField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let field = self.field.required_string(args)?;
        context.message_mut().remove_field(&field);
        Ok(None)
    }
}

pub struct RenameField {
    old_field: ParameterDescriptor,
    new_field: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl RenameField {
    pub const NAME: &'static str = "rename_field";

    pub fn new() -> Self {
        let old_field = ParameterDescriptor::string("old_field");
        let new_field = ParameterDescriptor::string("new_field");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Void,
            vec![old_field.clone(), new_field.clone()],
            "Moves a field's value to a new field name; missing source is a no-op",
        );
        Self {
            old_field,
            new_field,
            descriptor,
        }
    }
}

impl Function for RenameField {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let old_field = self.old_field.required_string(args)?;
        let new_field = self.new_field.required_string(args)?;
        if let Some(value) = context.message_mut().remove_field(&old_field) {
            context.message_mut().set_field(new_field, value);
        }
        Ok(None)
    }
}
