use crate::eval::error::EvalError;
use crate::eval::value::Value;
use crate::message::Message;

/// Per-message scratch state for one pipeline run.
///
/// The context exclusively borrows the message being processed, so nothing
/// else can observe half-applied rule actions; it carries the local variable
/// bindings and the append-only list of evaluation errors, and is dropped
/// when the run finishes. Never shared across workers or messages.
pub struct EvaluationContext<'m> {
    message: &'m mut Message,
    // insertion-ordered; rule variables are few, linear scan beats hashing
    variables: Vec<(String, Option<Value>)>,
    errors: Vec<EvalError>,
}

impl<'m> EvaluationContext<'m> {
    pub fn new(message: &'m mut Message) -> Self {
        Self {
            message,
            variables: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn message(&self) -> &Message {
        self.message
    }

    pub fn message_mut(&mut self) -> &mut Message {
        self.message
    }

    /// Binds a variable, overwriting an existing binding in place. A binding
    /// may hold an absent value, which is distinct from the name being
    /// undefined.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Option<Value>) {
        let name = name.into();
        match self.variables.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.variables.push((name, value)),
        }
    }

    /// The binding for `name`: `None` if undefined, `Some(None)` if bound to
    /// an absent value.
    pub fn variable(&self, name: &str) -> Option<&Option<Value>> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&str, &Option<Value>)> {
        self.variables.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn push_error(&mut self, error: EvalError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[EvalError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn last_error(&self) -> Option<&EvalError> {
        self.errors.last()
    }
}
