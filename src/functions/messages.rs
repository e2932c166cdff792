//! Message routing and gating actions.

use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalResult;
use crate::eval::value::{Value, ValueType};
use crate::functions::types::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};
use crate::routing;

/// `route_to_stream(id)` — assigns the message to an additional stream.
pub struct RouteToStream {
    id: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl RouteToStream {
    pub const NAME: &'static str = "route_to_stream";

    pub fn new() -> Self {
        let id = ParameterDescriptor::string("id");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Void,
            vec![id.clone()],
            "Assigns the message to the given stream",
        );
        Self { id, descriptor }
    }
}

impl Function for RouteToStream {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let id = self.id.required_string(args)?;
        context.message_mut().add_stream(id);
        Ok(None)
    }
}

/// `drop_message()` — marks the message to be discarded after the run. The
/// message still flows through the remaining rules; only the output stage
/// honors the flag.
pub struct DropMessage {
    descriptor: FunctionDescriptor,
}

impl DropMessage {
    pub const NAME: &'static str = "drop_message";

    pub fn new() -> Self {
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Void,
            vec![],
            "Marks the message to be discarded after processing",
        );
        Self { descriptor }
    }
}

impl Function for DropMessage {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        _args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        context.message_mut().set_filter_out(true);
        Ok(None)
    }
}

/// `remove_from_stream_destination(stream_id, destination_type)` — suppresses
/// one output destination for one stream without dropping the message from
/// the pipeline, e.g. "stop indexing but keep forwarding".
pub struct RemoveFromStreamDestination {
    stream_id: ParameterDescriptor,
    destination_type: ParameterDescriptor,
    descriptor: FunctionDescriptor,
}

impl RemoveFromStreamDestination {
    pub const NAME: &'static str = "remove_from_stream_destination";

    pub fn new() -> Self {
        let stream_id = ParameterDescriptor::string("stream_id");
        let destination_type = ParameterDescriptor::string("destination_type");
        let descriptor = FunctionDescriptor::new(
            Self::NAME,
            ValueType::Void,
            vec![stream_id.clone(), destination_type.clone()],
            "Removes a stream from a destination's eligible set on this message",
        );
        Self {
            stream_id,
            destination_type,
            descriptor,
        }
    }
}

impl Function for RemoveFromStreamDestination {
    fn descriptor(&self) -> &FunctionDescriptor {
        &self.descriptor
    }

    fn evaluate(
        &self,
        args: &FunctionArgs,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let stream_id = self.stream_id.required_string(args)?;
        let destination_type = self.destination_type.required_string(args)?;
        routing::remove_destination(context.message_mut(), &destination_type, &stream_id);
        Ok(None)
    }
}
