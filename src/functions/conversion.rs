//! Type conversion functions.
//!
//! Conversions fail soft: input that cannot be converted yields the caller's
//! `default` (or nothing) and a diagnostic, never a hard error. The hard
//! "missing parameter" failure belongs to whoever feeds the absent result
//! into a required parameter.

use tracing::debug;

use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalResult;
use crate::eval::value::{IpNetwork, Value, ValueType};
use crate::functions::types::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};

pub struct ToString {
    value: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl ToString {
    pub const NAME: &'static str = "to_string";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value").optional();
        let default = ParameterDescriptor::string("default").optional();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::String,
            vec![value.clone(), default.clone()],
            "Converts a value to its string representation",
        );
        Self {
            value,
            default,
            descriptor,
        }
    }
}

impl Function for ToString {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        match self.value.optional_value(args)? {
            Some(value) => Ok(Some(Value::String(format!("{}", value)))),
            None => Ok(self.default.optional_value(args)?),
        }
    }
}

pub struct ToLong {
    value: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl ToLong {
    pub const NAME: &'static str = "to_long";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value").optional();
        let default = ParameterDescriptor::long("default").optional();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Long,
            vec![value.clone(), default.clone()],
            "Converts a value to an integer",
        );
        Self {
            value,
            default,
            descriptor,
        }
    }

    fn convert(value: &Value) -> Option<i64> {
        match value {
            Value::Long(n) => Some(*n),
            Value::Double(d) => Some(*d as i64),
            Value::String(s) => s.trim().parse().ok(),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl Function for ToLong {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let input = self.value.optional_value(args)?;
        match input.as_ref().and_then(Self::convert) {
            Some(n) => Ok(Some(Value::Long(n))),
            None => {
                if let Some(value) = &input {
                    debug!(%value, "to_long could not convert value");
                }
                Ok(self.default.optional_value(args)?)
            }
        }
    }
}

pub struct ToDouble {
    value: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl ToDouble {
    pub const NAME: &'static str = "to_double";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value").optional();
        let default = ParameterDescriptor::new("default", ValueType::Double).optional();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Double,
            vec![value.clone(), default.clone()],
            "Converts a value to a floating point number",
        );
        Self {
            value,
            default,
            descriptor,
        }
    }

    fn convert(value: &Value) -> Option<f64> {
        match value {
            Value::Double(d) => Some(*d),
            Value::Long(n) => Some(*n as f64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl Function for ToDouble {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let input = self.value.optional_value(args)?;
        match input.as_ref().and_then(Self::convert) {
            Some(d) => Ok(Some(Value::Double(d))),
            None => {
                if let Some(value) = &input {
                    debug!(%value, "to_double could not convert value");
                }
                Ok(self.default.optional_value(args)?)
            }
        }
    }
}

pub struct ToBool {
    value: ParameterDescriptor,
    default: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl ToBool {
    pub const NAME: &'static str = "to_bool";

    pub fn new() -> Self {
        let value = ParameterDescriptor::any("value").optional();
        let default = ParameterDescriptor::boolean("default").optional();
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Boolean,
            vec![value.clone(), default.clone()],
            "Converts a value to a boolean",
        );
        Self {
            value,
            default,
            descriptor,
        }
    }

    fn convert(value: &Value) -> Option<bool> {
        match value {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Value::Long(n) => Some(*n != 0),
            _ => None,
        }
    }
}

impl Function for ToBool {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let input = self.value.optional_value(args)?;
        match input.as_ref().and_then(Self::convert) {
            Some(b) => Ok(Some(Value::Boolean(b))),
            None => {
                if let Some(value) = &input {
                    debug!(%value, "to_bool could not convert value");
                }
                Ok(self.default.optional_value(args)?)
            }
        }
    }
}

pub struct ToIp {
    ip: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl ToIp {
    pub const NAME: &'static str = "to_ip";

    pub fn new() -> Self {
        let ip = ParameterDescriptor::any("ip");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Network,
            vec![ip.clone()],
            "Parses an IP address; unparseable input yields nothing",
        );
        Self { ip, descriptor }
    }
}

impl Function for ToIp {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        match self.ip.required(args)? {
            Value::Network(network) => Ok(Some(Value::Network(network))),
            Value::String(s) => match s.trim().parse() {
                Ok(addr) => Ok(Some(Value::Network(IpNetwork::host(addr)))),
                Err(_) => {
                    debug!(input = %s, "to_ip could not parse address");
                    Ok(None)
                }
            },
            other => {
                debug!(input = %other, "to_ip expects a string or network value");
                Ok(None)
            }
        }
    }
}
