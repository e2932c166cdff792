//! Network address functions.

use tracing::debug;

use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalResult;
use crate::eval::value::{IpNetwork, Value, ValueType};
use crate::functions::types::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};

/// `cidr_match(cidr, ip)` — whether an address lies in a CIDR range.
///
/// The `cidr` parameter carries a parse transform: a literal range like
/// `"10.0.0.0/8"` is parsed once at rule-set load instead of per message,
/// and a malformed literal fails the load. The `ip` side usually comes from
/// `to_ip` on a message field; an unparseable dynamic address is a soft
/// failure.
pub struct CidrMatch {
    cidr: ParameterDescriptor,
    ip: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl CidrMatch {
    pub const NAME: &'static str = "cidr_match";

    pub fn new() -> Self {
        let cidr = ParameterDescriptor::string("cidr").transformed(ValueType::Network, |value| {
            match value {
                Value::Network(network) => Ok(Value::Network(*network)),
                Value::String(s) => s
                    .parse::<IpNetwork>()
                    .map(Value::Network)
                    .map_err(|e| e.to_string()),
                other => Err(format!("expected a CIDR string, got {}", other.value_type())),
            }
        });
        let ip = ParameterDescriptor::any("ip");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Boolean,
            vec![cidr.clone(), ip.clone()],
            "Checks whether an IP address is contained in a CIDR range",
        );
        Self {
            cidr,
            ip,
            descriptor,
        }
    }
}

impl Function for CidrMatch {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        _context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let network = match self.cidr.required(args)? {
            Value::Network(network) => network,
            other => {
                return Err(crate::eval::error::EvalError::TypeMismatch {
                    expected: ValueType::Network,
                    actual: other.value_type(),
                })
            }
        };
        let addr = match self.ip.required(args)? {
            Value::Network(host) => host.addr(),
            Value::String(s) => match s.trim().parse() {
                Ok(addr) => addr,
                Err(_) => {
                    debug!(input = %s, "cidr_match could not parse address");
                    return Ok(None);
                }
            },
            other => {
                debug!(input = %other, "cidr_match expects an address, got {}", other.value_type());
                return Ok(None);
            }
        };
        Ok(Some(Value::Boolean(network.contains(addr))))
    }
}
