use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::eval::value::Value;

/// How a stage combines its rules' condition outcomes to decide whether the
/// stage matched.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every rule condition must hold.
    #[default]
    All,
    /// At least one rule condition must hold.
    Either,
}

/// A pipeline: stages applied in ascending priority order to the messages
/// routed to it. Owned by the active rule-set snapshot; replaced atomically
/// on reload.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub id: Option<String>,
    pub name: String,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    /// Lookup key within a rule set: the persistence id when assigned, the
    /// display name for unsaved pipelines.
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// A priority-ordered group of rules sharing a match policy.
#[derive(Debug, Clone)]
pub struct Stage {
    pub priority: i32,
    pub match_mode: MatchMode,
    pub rules: Vec<Arc<Rule>>,
}

/// A named condition/action pair. Names are unique across the active rule
/// set; ids are assigned by the persistence collaborator.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: Option<String>,
    pub name: String,
    pub when: Expression,
    pub then: Vec<Statement>,
}

impl Rule {
    pub fn new(name: impl Into<String>, when: Expression, then: Vec<Statement>) -> Self {
        Self {
            id: None,
            name: name.into(),
            when,
            then,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Placeholder standing in for a rule reference that could not be
    /// resolved; it never matches and has no actions.
    pub fn always_false(name: impl Into<String>) -> Self {
        Self::new(name, Expression::Boolean(false), Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum ComparisonOp {
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    NotEq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Lte,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Gte,
}

/// An expression node. Immutable once built, except for the precomputed
/// constant slots that load-time folding fills in on call arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal value from the rule source.
    Literal(Value),
    /// A constant boolean condition, e.g. `when true`.
    Boolean(bool),
    /// A reference to a field of the current message.
    Field(String),
    /// A reference to a variable bound earlier in this context.
    Variable(String),
    Logical(LogicalExpression),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    FunctionCall(FunctionCall),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalExpression {
    And {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Or {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
}

impl Expression {
    /// Whether this expression is closed over load-time data only, making it
    /// eligible for constant folding. Function calls are conservatively
    /// non-constant since functions may read the message or have effects.
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Literal(_) | Expression::Boolean(_) => true,
            Expression::Field(_) | Expression::Variable(_) | Expression::FunctionCall(_) => false,
            Expression::Logical(logical) => match logical {
                LogicalExpression::And { left, right } | LogicalExpression::Or { left, right } => {
                    left.is_constant() && right.is_constant()
                }
                LogicalExpression::Not(inner) => inner.is_constant(),
            },
            Expression::Comparison { left, right, .. } => left.is_constant() && right.is_constant(),
        }
    }

    /// Visits every function call in this expression tree, innermost first.
    pub(crate) fn for_each_call_mut<E>(
        &mut self,
        visit: &mut impl FnMut(&mut FunctionCall) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Expression::Literal(_)
            | Expression::Boolean(_)
            | Expression::Field(_)
            | Expression::Variable(_) => Ok(()),
            Expression::Logical(logical) => match logical {
                LogicalExpression::And { left, right } | LogicalExpression::Or { left, right } => {
                    left.for_each_call_mut(visit)?;
                    right.for_each_call_mut(visit)
                }
                LogicalExpression::Not(inner) => inner.for_each_call_mut(visit),
            },
            Expression::Comparison { left, right, .. } => {
                left.for_each_call_mut(visit)?;
                right.for_each_call_mut(visit)
            }
            Expression::FunctionCall(call) => {
                for arg in &mut call.args {
                    arg.expr.for_each_call_mut(visit)?;
                }
                visit(call)
            }
        }
    }
}

/// A call to a registered function with named arguments. The external parser
/// binds positional arguments to parameter names before the AST reaches this
/// engine.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: String,
    pub args: Vec<CallArgument>,
}

impl FunctionCall {
    pub fn new(function: impl Into<String>, args: Vec<CallArgument>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// One named argument of a function call. `constant` is empty until the
/// load-time folding pass caches the transformed value of a constant
/// argument expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgument {
    pub name: String,
    pub expr: Expression,
    pub constant: Option<Value>,
}

impl CallArgument {
    pub fn new(name: impl Into<String>, expr: Expression) -> Self {
        Self {
            name: name.into(),
            expr,
            constant: None,
        }
    }
}

/// An action in a rule's `then` list. Executed strictly in order; the first
/// failing statement aborts the rest of the rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    FunctionCall(FunctionCall),
    VarAssign { name: String, value: Expression },
}
