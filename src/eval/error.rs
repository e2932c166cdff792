use thiserror::Error;

use super::value::ValueType;

pub type EvalResult<T> = Result<T, EvalError>;

/// A per-message, per-rule evaluation failure.
///
/// These abort the failing rule's remaining statements for the current
/// message and are recorded against that rule; they never abort the stage or
/// pipeline. Function soft failures (a function that cannot produce a value)
/// are not errors: they surface as an absent value and only become a
/// `MissingParameter` when a required consumer receives them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("missing required parameter `{param}` of `{function}`")]
    MissingParameter { function: String, param: String },

    #[error("invalid argument `{param}` of `{function}`: {message}")]
    InvalidArgument {
        function: String,
        param: String,
        message: String,
    },

    #[error("expected {expected}, got {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },

    #[error("expected a {expected} value, found nothing")]
    MissingValue { expected: ValueType },

    #[error("cannot compare {left} with {right}")]
    Incomparable { left: ValueType, right: ValueType },

    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("{0}")]
    Eval(String),
}
