//! The built-in function catalogue and the typed function capability.
//!
//! Functions are self-describing: each carries a [`FunctionDescriptor`]
//! naming its typed parameters. The evaluator binds call arguments against
//! the descriptor; the load-time folding pass uses parameter transforms to
//! precompute constant arguments (compile a regex, parse a CIDR range) once
//! per rule-set activation.

pub mod conversion;
pub mod fields;
pub mod messages;
pub mod network;
pub mod pattern;
pub mod strings;
pub mod types;

use std::sync::Arc;

pub use types::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};

/// All built-in functions, ready for registration.
pub fn builtins() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(fields::HasField::new()),
        Arc::new(fields::GetField::new()),
        Arc::new(fields::SetField::new()),
        Arc::new(fields::RemoveField::new()),
        Arc::new(fields::RenameField::new()),
        Arc::new(conversion::ToString::new()),
        Arc::new(conversion::ToLong::new()),
        Arc::new(conversion::ToDouble::new()),
        Arc::new(conversion::ToBool::new()),
        Arc::new(conversion::ToIp::new()),
        Arc::new(strings::Uppercase::new()),
        Arc::new(strings::Lowercase::new()),
        Arc::new(strings::Concat::new()),
        Arc::new(pattern::RegexMatch::new()),
        Arc::new(network::CidrMatch::new()),
        Arc::new(messages::RouteToStream::new()),
        Arc::new(messages::DropMessage::new()),
        Arc::new(messages::RemoveFromStreamDestination::new()),
    ]
}
