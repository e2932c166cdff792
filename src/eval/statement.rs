use crate::ast::Statement;
use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalResult;
use crate::eval::expression::ExpressionEvaluator;
use crate::function_registry::FunctionRegistry;

/// Runs a rule's action list against an evaluation context.
///
/// Statements execute strictly in order; the first failing statement stops
/// the remaining statements of that rule. The error is also appended to the
/// context, and the interpreter decides what to record — it never stops the
/// surrounding stage or pipeline.
pub struct StatementExecutor<'r> {
    evaluator: ExpressionEvaluator<'r>,
}

impl<'r> StatementExecutor<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self {
            evaluator: ExpressionEvaluator::new(registry),
        }
    }

    pub fn evaluator(&self) -> &ExpressionEvaluator<'r> {
        &self.evaluator
    }

    pub fn run(&self, statements: &[Statement], context: &mut EvaluationContext) -> EvalResult<()> {
        for statement in statements {
            if let Err(error) = self.execute(statement, context) {
                context.push_error(error.clone());
                return Err(error);
            }
        }
        Ok(())
    }

    fn execute(&self, statement: &Statement, context: &mut EvaluationContext) -> EvalResult<()> {
        match statement {
            Statement::FunctionCall(call) => {
                // invoked for its side effects, the return value is dropped
                self.evaluator.eval_call(call, context)?;
                Ok(())
            }
            Statement::VarAssign { name, value } => {
                let value = self.evaluator.eval(value, context)?;
                context.set_variable(name.clone(), value);
                Ok(())
            }
        }
    }
}
