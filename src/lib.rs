//! floodgate — a pipeline rule processing engine for in-flight log messages.
//!
//! Rules are a small typed DSL, delivered as an AST by an external parser
//! and interpreted against every message: conditions gate side-effecting
//! actions that mutate fields, route messages to streams, and narrow which
//! output destinations a message is still eligible for. Rule sets are
//! validated and constant-folded at load time and swapped in atomically; a
//! single rule's failure is isolated to that rule for that message.

pub mod ast;
pub mod config;
pub mod error;
pub mod eval;
pub mod function_registry;
pub mod functions;
pub mod interpreter;
pub mod message;
pub mod metrics;
pub mod preprocessor;
pub mod routing;
pub mod ruleset;

// Re-exports
pub use ast::{
    CallArgument, ComparisonOp, Expression, FunctionCall, LogicalExpression, MatchMode, Pipeline,
    Rule, Stage, Statement,
};
pub use config::{EngineConfig, StageContinuation};
pub use error::{EngineResult, Error};
pub use eval::{
    EvalError, EvalResult, EvaluationContext, ExpressionEvaluator, IpNetwork, Pattern,
    StatementExecutor, Value, ValueType,
};
pub use function_registry::{FunctionRegistry, RegistryError};
pub use functions::{Function, FunctionArgs, FunctionDescriptor, ParameterDescriptor};
pub use interpreter::{PipelineInterpreter, ProcessingReport, RuleError};
pub use message::{Message, MetadataValue};
pub use metrics::{EngineMetrics, RuleMetricsSnapshot};
pub use preprocessor::ConstantFolder;
pub use routing::Destinations;
pub use ruleset::{LoadError, PipelineDef, RuleSet, StageDef};
