//! Expression and statement evaluation against a per-message context.

pub mod context;
pub mod error;
pub mod expression;
pub mod statement;
pub mod value;

pub use context::EvaluationContext;
pub use error::{EvalError, EvalResult};
pub use expression::ExpressionEvaluator;
pub use statement::StatementExecutor;
pub use value::{IpNetwork, Pattern, Value, ValueType};
