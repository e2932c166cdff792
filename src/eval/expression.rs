use std::cmp::Ordering;

use crate::ast::{ComparisonOp, Expression, FunctionCall, LogicalExpression};
use crate::eval::context::EvaluationContext;
use crate::eval::error::{EvalError, EvalResult};
use crate::eval::value::{Value, ValueType};
use crate::function_registry::FunctionRegistry;
use crate::functions::types::FunctionArgs;

/// Recursively evaluates expression nodes against an evaluation context.
///
/// Evaluation yields `Ok(Some(value))`, `Ok(None)` for a typed absence (a
/// missing field, a function soft failure), or `Err` for a hard per-rule
/// failure.
pub struct ExpressionEvaluator<'r> {
    registry: &'r FunctionRegistry,
}

impl<'r> ExpressionEvaluator<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self { registry }
    }

    pub fn eval(
        &self,
        expr: &Expression,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        match expr {
            Expression::Literal(value) => Ok(Some(value.clone())),
            Expression::Boolean(b) => Ok(Some(Value::Boolean(*b))),
            Expression::Field(name) => Ok(context.message().field(name).cloned()),
            Expression::Variable(name) => match context.variable(name) {
                Some(binding) => Ok(binding.clone()),
                None => Err(EvalError::UndefinedVariable(name.clone())),
            },
            Expression::Logical(logical) => self
                .eval_logical(logical, context)
                .map(|b| Some(Value::Boolean(b))),
            Expression::Comparison { op, left, right } => self
                .eval_comparison(*op, left, right, context)
                .map(|b| Some(Value::Boolean(b))),
            Expression::FunctionCall(call) => self.eval_call(call, context),
        }
    }

    /// Evaluates an expression where a boolean is required, e.g. a rule
    /// condition or a logical operand. Anything but a boolean is an error.
    pub fn eval_bool(&self, expr: &Expression, context: &mut EvaluationContext) -> EvalResult<bool> {
        match self.eval(expr, context)? {
            Some(Value::Boolean(b)) => Ok(b),
            Some(other) => Err(EvalError::TypeMismatch {
                expected: ValueType::Boolean,
                actual: other.value_type(),
            }),
            None => Err(EvalError::MissingValue {
                expected: ValueType::Boolean,
            }),
        }
    }

    // short-circuit, left to right
    fn eval_logical(
        &self,
        logical: &LogicalExpression,
        context: &mut EvaluationContext,
    ) -> EvalResult<bool> {
        match logical {
            LogicalExpression::And { left, right } => {
                if !self.eval_bool(left, context)? {
                    Ok(false)
                } else {
                    self.eval_bool(right, context)
                }
            }
            LogicalExpression::Or { left, right } => {
                if self.eval_bool(left, context)? {
                    Ok(true)
                } else {
                    self.eval_bool(right, context)
                }
            }
            LogicalExpression::Not(inner) => Ok(!self.eval_bool(inner, context)?),
        }
    }

    fn eval_comparison(
        &self,
        op: ComparisonOp,
        left: &Expression,
        right: &Expression,
        context: &mut EvaluationContext,
    ) -> EvalResult<bool> {
        let left = self.eval(left, context)?.ok_or(EvalError::MissingValue {
            expected: ValueType::Any,
        })?;
        let right = self.eval(right, context)?.ok_or(EvalError::MissingValue {
            expected: ValueType::Any,
        })?;

        match op {
            ComparisonOp::Eq => Self::compare_eq(&left, &right),
            ComparisonOp::NotEq => Self::compare_eq(&left, &right).map(|eq| !eq),
            ComparisonOp::Lt => Self::compare_ord(&left, &right).map(Ordering::is_lt),
            ComparisonOp::Lte => Self::compare_ord(&left, &right).map(Ordering::is_le),
            ComparisonOp::Gt => Self::compare_ord(&left, &right).map(Ordering::is_gt),
            ComparisonOp::Gte => Self::compare_ord(&left, &right).map(Ordering::is_ge),
        }
    }

    // equality is defined for same-typed values and mixed numbers
    fn compare_eq(left: &Value, right: &Value) -> EvalResult<bool> {
        match (left, right) {
            (Value::Long(l), Value::Double(r)) => Ok((*l as f64) == *r),
            (Value::Double(l), Value::Long(r)) => Ok(*l == (*r as f64)),
            (l, r) if l.value_type() == r.value_type() => Ok(l == r),
            (l, r) => Err(EvalError::Incomparable {
                left: l.value_type(),
                right: r.value_type(),
            }),
        }
    }

    // ordering is defined for numbers and strings only
    fn compare_ord(left: &Value, right: &Value) -> EvalResult<Ordering> {
        let incomparable = || EvalError::Incomparable {
            left: left.value_type(),
            right: right.value_type(),
        };
        match (left, right) {
            (Value::Long(l), Value::Long(r)) => Ok(l.cmp(r)),
            (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
            (Value::Long(_) | Value::Double(_), Value::Long(_) | Value::Double(_)) => {
                // as_double covers all four long/double combinations
                let l = left.as_double().ok_or_else(incomparable)?;
                let r = right.as_double().ok_or_else(incomparable)?;
                l.partial_cmp(&r).ok_or_else(incomparable)
            }
            _ => Err(incomparable()),
        }
    }

    /// Resolves arguments (precomputed constants first, fresh evaluation
    /// otherwise), binds them by name against the descriptor, and invokes
    /// the function.
    pub fn eval_call(
        &self,
        call: &FunctionCall,
        context: &mut EvaluationContext,
    ) -> EvalResult<Option<Value>> {
        let function = self.registry.resolve_or_err(&call.function)?;

        let mut args = FunctionArgs::new(call.function.clone());
        for arg in &call.args {
            match &arg.constant {
                Some(constant) => args.bind_precomputed(arg.name.clone(), constant.clone()),
                None => {
                    if let Some(value) = self.eval(&arg.expr, context)? {
                        args.bind_evaluated(arg.name.clone(), value);
                    }
                    // an absent argument stays unbound; required() decides
                }
            }
        }

        function.evaluate(&args, context)
    }
}
