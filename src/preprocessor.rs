//! Load-time preparation of rule ASTs: static call validation and constant
//! folding.
//!
//! For every function-call argument whose expression is a compile-time
//! constant, the folding pass evaluates it once, applies the parameter's
//! transform, and caches the result on the AST node. Expensive or validating
//! transforms (compiling a regex, parsing a CIDR range) therefore run once
//! per rule-set activation instead of once per message, and a bad constant
//! fails the load instead of every message.

use tracing::debug;

use crate::ast::{FunctionCall, Rule, Statement};
use crate::eval::context::EvaluationContext;
use crate::eval::expression::ExpressionEvaluator;
use crate::function_registry::FunctionRegistry;
use crate::message::Message;
use crate::ruleset::LoadError;

pub struct ConstantFolder<'r> {
    registry: &'r FunctionRegistry,
}

impl<'r> ConstantFolder<'r> {
    pub fn new(registry: &'r FunctionRegistry) -> Self {
        Self { registry }
    }

    /// Validates and folds every function call in the rule's condition and
    /// actions. Fails fast with a load error; the rule set must not activate
    /// on any failure here.
    pub fn prepare_rule(&self, rule: &mut Rule) -> Result<(), LoadError> {
        let rule_name = rule.name.clone();
        rule.when
            .for_each_call_mut(&mut |call| self.prepare_call(&rule_name, call))?;
        for statement in &mut rule.then {
            self.prepare_statement(&rule_name, statement)?;
        }
        Ok(())
    }

    fn prepare_statement(&self, rule: &str, statement: &mut Statement) -> Result<(), LoadError> {
        match statement {
            Statement::FunctionCall(call) => {
                for arg in &mut call.args {
                    arg.expr
                        .for_each_call_mut(&mut |nested| self.prepare_call(rule, nested))?;
                }
                self.prepare_call(rule, call)
            }
            Statement::VarAssign { value, .. } => {
                value.for_each_call_mut(&mut |nested| self.prepare_call(rule, nested))
            }
        }
    }

    fn prepare_call(&self, rule: &str, call: &mut FunctionCall) -> Result<(), LoadError> {
        let function =
            self.registry
                .resolve(&call.function)
                .ok_or_else(|| LoadError::UnknownFunction {
                    rule: rule.to_string(),
                    function: call.function.clone(),
                })?;
        let descriptor = function.descriptor();

        // static shape checks: every argument names a declared parameter,
        // every required parameter has an argument
        for arg in &call.args {
            if descriptor.param(&arg.name).is_none() {
                return Err(LoadError::UnknownParameter {
                    rule: rule.to_string(),
                    function: call.function.clone(),
                    param: arg.name.clone(),
                });
            }
        }
        for param in descriptor.params() {
            if !param.is_optional() && !call.args.iter().any(|arg| arg.name == param.name()) {
                return Err(LoadError::MissingParameter {
                    rule: rule.to_string(),
                    function: call.function.clone(),
                    param: param.name().to_string(),
                });
            }
        }

        // fold constant arguments through the parameter transform
        for arg in &mut call.args {
            if arg.constant.is_some() || !arg.expr.is_constant() {
                continue;
            }
            let Some(param) = descriptor.param(&arg.name) else {
                continue;
            };

            let mut scratch = Message::empty();
            let mut context = EvaluationContext::new(&mut scratch);
            let evaluator = ExpressionEvaluator::new(self.registry);
            let value = evaluator.eval(&arg.expr, &mut context).map_err(|error| {
                LoadError::ConstantArgument {
                    rule: rule.to_string(),
                    function: call.function.clone(),
                    param: arg.name.clone(),
                    reason: error.to_string(),
                }
            })?;

            if let Some(value) = value {
                let folded = param.apply_transform(&call.function, &value).map_err(
                    |error| LoadError::ConstantArgument {
                        rule: rule.to_string(),
                        function: call.function.clone(),
                        param: arg.name.clone(),
                        reason: error.to_string(),
                    },
                )?;
                debug!(
                    rule,
                    function = %call.function,
                    param = %arg.name,
                    "folded constant argument"
                );
                arg.constant = Some(folded);
            }
        }
        Ok(())
    }
}
