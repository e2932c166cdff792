//! Staged, prioritized, isolated interpretation of pipelines over one
//! message, plus the atomically swapped rule-set snapshot.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::debug;
use uuid::Uuid;

use crate::ast::{MatchMode, Pipeline, Rule, Stage};
use crate::config::{EngineConfig, StageContinuation};
use crate::eval::context::EvaluationContext;
use crate::eval::error::EvalError;
use crate::eval::statement::StatementExecutor;
use crate::function_registry::FunctionRegistry;
use crate::message::Message;
use crate::metrics::EngineMetrics;
use crate::ruleset::{LoadError, PipelineDef, RuleSet};

/// One recovered per-rule failure, reported to the error sink instead of
/// being thrown to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleError {
    pub rule_id: Option<String>,
    pub rule_name: String,
    pub message_id: Uuid,
    pub error: EvalError,
}

/// What one message's run through its bound pipelines produced, besides the
/// mutations on the message itself.
#[derive(Debug, Default)]
pub struct ProcessingReport {
    pub errors: Vec<RuleError>,
}

impl ProcessingReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Drives stage-by-stage, rule-by-rule evaluation of one message across the
/// pipelines bound to it.
///
/// Evaluation is synchronous and CPU-bound; the context, the message and its
/// routing metadata are exclusively owned by the calling worker for the
/// duration of a run, so no locking happens on the hot path. The only shared
/// state is the read-only rule-set snapshot and the function registry.
pub struct PipelineInterpreter {
    registry: Arc<FunctionRegistry>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
    state: RwLock<Arc<RuleSet>>,
}

impl PipelineInterpreter {
    pub fn new(registry: Arc<FunctionRegistry>, config: EngineConfig) -> Self {
        let metrics = Arc::new(EngineMetrics::new(config.rule_metrics));
        Self {
            registry,
            config,
            metrics,
            state: RwLock::new(Arc::new(RuleSet::empty())),
        }
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// The currently active snapshot. In-flight runs keep the snapshot they
    /// started with.
    pub fn current_ruleset(&self) -> Arc<RuleSet> {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Validates, folds and atomically activates a new rule set. On any load
    /// error the previously active set continues serving traffic.
    pub fn activate(
        &self,
        rules: Vec<Rule>,
        pipelines: Vec<PipelineDef>,
    ) -> Result<(), LoadError> {
        let ruleset = Arc::new(RuleSet::load(rules, pipelines, &self.registry)?);
        match self.state.write() {
            Ok(mut guard) => *guard = ruleset,
            Err(poisoned) => *poisoned.into_inner() = ruleset,
        }
        Ok(())
    }

    /// Evaluates the message against the given pipelines (resolved by the
    /// stream-routing collaborator, referenced by key). The message is
    /// mutated in place; per-rule errors are recovered, recorded and
    /// returned, never thrown.
    pub fn process(&self, message: &mut Message, pipeline_keys: &[&str]) -> ProcessingReport {
        let ruleset = self.current_ruleset();

        let mut pipelines: Vec<Arc<Pipeline>> = pipeline_keys
            .iter()
            .filter_map(|key| match ruleset.pipeline(key) {
                Some(pipeline) => Some(pipeline.clone()),
                None => {
                    debug!(pipeline = %key, "message bound to unknown pipeline, skipping");
                    None
                }
            })
            .collect();
        // deterministic order regardless of how the binding set was built
        pipelines.sort_by(|a, b| a.key().cmp(b.key()));

        let mut report = ProcessingReport::default();
        for pipeline in &pipelines {
            self.run_pipeline(pipeline, message, &mut report);
        }
        report
    }

    // one fresh context per (message, pipeline): variables are isolated per
    // pipeline run, message mutations are cumulative
    fn run_pipeline(&self, pipeline: &Pipeline, message: &mut Message, report: &mut ProcessingReport) {
        let message_id = message.id();
        let mut context = EvaluationContext::new(message);
        let executor = StatementExecutor::new(&self.registry);

        for stage in &pipeline.stages {
            debug!(
                pipeline = %pipeline.name,
                stage = stage.priority,
                match_mode = %stage.match_mode,
                "evaluating stage"
            );
            let matched = self.evaluate_stage(stage, &executor, &mut context, message_id, report);

            if !matched && self.config.continuation == StageContinuation::MatchGated {
                debug!(
                    pipeline = %pipeline.name,
                    stage = stage.priority,
                    "stage did not match, skipping remaining stages of this pipeline"
                );
                break;
            }
        }
    }

    /// Evaluates every rule of the stage: the condition decides whether the
    /// rule's actions run (immediately), and the per-rule outcomes combine
    /// into the stage's match result. A rule failure is isolated to that
    /// rule.
    fn evaluate_stage(
        &self,
        stage: &Stage,
        executor: &StatementExecutor,
        context: &mut EvaluationContext,
        message_id: Uuid,
        report: &mut ProcessingReport,
    ) -> bool {
        // an empty stage matches vacuously and keeps the pipeline going
        let mut any_matched = stage.rules.is_empty();
        let mut all_matched = true;

        for rule in &stage.rules {
            let matched = match executor.evaluator().eval_bool(&rule.when, context) {
                Ok(matched) => matched,
                Err(error) => {
                    // a failing condition cannot match; actions are skipped
                    context.push_error(error.clone());
                    self.record_failure(rule, message_id, error, context, report);
                    false
                }
            };

            if matched {
                debug!(rule = %rule.name, "rule matched, running actions");
                self.metrics.mark_match(&rule.name);
                let started = Instant::now();
                if let Err(error) = executor.run(&rule.then, context) {
                    self.record_failure(rule, message_id, error, context, report);
                }
                self.metrics.record_execution(&rule.name, started.elapsed());
            } else {
                debug!(rule = %rule.name, "rule did not match");
                self.metrics.mark_non_match(&rule.name);
            }

            any_matched |= matched;
            all_matched &= matched;
        }

        match stage.match_mode {
            MatchMode::All => all_matched,
            MatchMode::Either => any_matched,
        }
    }

    fn record_failure(
        &self,
        rule: &Rule,
        message_id: Uuid,
        error: EvalError,
        context: &mut EvaluationContext,
        report: &mut ProcessingReport,
    ) {
        debug!(rule = %rule.name, %error, "rule evaluation failed, skipping rest of the rule");
        self.metrics.mark_failure(&rule.name);
        context
            .message_mut()
            .append_processing_error(&format!("For rule '{}': {}", rule.name, error));
        report.errors.push(RuleError {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            message_id,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{CallArgument, ComparisonOp, Expression, FunctionCall, Statement};
    use crate::eval::value::Value;
    use crate::ruleset::StageDef;

    #[ctor::ctor]
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    fn interpreter(config: EngineConfig) -> PipelineInterpreter {
        PipelineInterpreter::new(Arc::new(FunctionRegistry::with_builtins()), config)
    }

    fn set_field_stmt(field: &str, value: Value) -> Statement {
        Statement::FunctionCall(FunctionCall::new(
            "set_field",
            vec![
                CallArgument::new("field", Expression::Literal(Value::from(field))),
                CallArgument::new("value", Expression::Literal(value)),
            ],
        ))
    }

    fn failing_stmt() -> Statement {
        // uppercase of a missing field: required parameter ends up absent
        Statement::FunctionCall(FunctionCall::new(
            "set_field",
            vec![
                CallArgument::new("field", Expression::Literal(Value::from("never_set"))),
                CallArgument::new(
                    "value",
                    Expression::FunctionCall(FunctionCall::new(
                        "uppercase",
                        vec![CallArgument::new(
                            "value",
                            Expression::Field("no_such_field".into()),
                        )],
                    )),
                ),
            ],
        ))
    }

    fn pipeline_def(name: &str, stages: Vec<StageDef>) -> PipelineDef {
        PipelineDef {
            id: None,
            name: name.to_string(),
            stages,
        }
    }

    fn stage_def(priority: i32, match_mode: MatchMode, rules: &[&str]) -> StageDef {
        StageDef {
            priority,
            match_mode,
            rules: rules.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_destination_suppression_scenario() {
        // one pipeline, one stage(priority=0, match all), one rule:
        // when true then remove_from_stream_destination("s1", "indexer")
        let engine = interpreter(EngineConfig::default());
        let rule = Rule::new(
            "suppress indexing",
            Expression::Boolean(true),
            vec![Statement::FunctionCall(FunctionCall::new(
                "remove_from_stream_destination",
                vec![
                    CallArgument::new("stream_id", Expression::Literal(Value::from("s1"))),
                    CallArgument::new(
                        "destination_type",
                        Expression::Literal(Value::from("indexer")),
                    ),
                ],
            ))],
        );
        engine
            .activate(
                vec![rule],
                vec![pipeline_def(
                    "p",
                    vec![stage_def(0, MatchMode::All, &["suppress indexing"])],
                )],
            )
            .unwrap();

        let mut message = Message::empty();
        message.destinations_mut().insert("indexer", "s1");
        message.destinations_mut().insert("forwarder", "s1");

        let report = engine.process(&mut message, &["p"]);

        assert!(report.is_clean());
        let destinations = message.destinations().unwrap();
        assert!(!destinations.is_eligible("indexer", "s1"));
        assert!(destinations.is_eligible("forwarder", "s1"));
    }

    #[test]
    fn test_missing_field_in_required_param_records_one_error() {
        // `when uppercase($no_such_field) == "X"` fails the condition; the
        // then-block must not touch the message
        let engine = interpreter(EngineConfig::default());
        let rule = Rule::new(
            "broken condition",
            Expression::Comparison {
                op: ComparisonOp::Eq,
                left: Box::new(Expression::FunctionCall(FunctionCall::new(
                    "uppercase",
                    vec![CallArgument::new(
                        "value",
                        Expression::Field("no_such_field".into()),
                    )],
                ))),
                right: Box::new(Expression::Literal(Value::from("X"))),
            },
            vec![set_field_stmt("should_not_exist", Value::Long(1))],
        );
        engine
            .activate(
                vec![rule],
                vec![pipeline_def(
                    "p",
                    vec![stage_def(0, MatchMode::All, &["broken condition"])],
                )],
            )
            .unwrap();

        let mut message = Message::new(HashMap::from([(
            "untouched".to_string(),
            Value::Long(9),
        )]));
        let report = engine.process(&mut message, &["p"]);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].rule_name, "broken condition");
        assert_eq!(
            report.errors[0].error,
            EvalError::MissingParameter {
                function: "uppercase".into(),
                param: "value".into(),
            }
        );
        assert!(!message.has_field("should_not_exist"));
        assert_eq!(message.field("untouched"), Some(&Value::Long(9)));
    }

    #[test]
    fn test_failing_rule_is_isolated_from_stage_and_later_stages() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![
            Rule::new(
                "fails",
                Expression::Boolean(true),
                vec![failing_stmt(), set_field_stmt("after_failure", Value::Long(1))],
            ),
            Rule::new(
                "sibling",
                Expression::Boolean(true),
                vec![set_field_stmt("sibling_ran", Value::Long(1))],
            ),
            Rule::new(
                "next stage",
                Expression::Boolean(true),
                vec![set_field_stmt("next_stage_ran", Value::Long(1))],
            ),
        ];
        engine
            .activate(
                vec![rules[0].clone(), rules[1].clone(), rules[2].clone()],
                vec![pipeline_def(
                    "p",
                    vec![
                        stage_def(0, MatchMode::All, &["fails", "sibling"]),
                        stage_def(1, MatchMode::All, &["next stage"]),
                    ],
                )],
            )
            .unwrap();

        let mut message = Message::empty();
        let report = engine.process(&mut message, &["p"]);

        // exactly one error, and everything else still ran
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].rule_name, "fails");
        assert!(!message.has_field("never_set"));
        assert!(!message.has_field("after_failure"));
        assert!(message.has_field("sibling_ran"));
        assert!(message.has_field("next_stage_ran"));
    }

    #[test]
    fn test_match_gated_continuation_skips_later_stages() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![
            Rule::new("never matches", Expression::Boolean(false), vec![]),
            Rule::new(
                "second stage",
                Expression::Boolean(true),
                vec![set_field_stmt("second_stage_ran", Value::Long(1))],
            ),
        ];
        let defs = vec![pipeline_def(
            "p",
            vec![
                stage_def(0, MatchMode::All, &["never matches"]),
                stage_def(1, MatchMode::All, &["second stage"]),
            ],
        )];
        engine.activate(rules.clone(), defs.clone()).unwrap();

        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);
        assert!(!message.has_field("second_stage_ran"));

        // the same rule set under run_all keeps going
        let engine = interpreter(EngineConfig {
            continuation: StageContinuation::RunAll,
            ..EngineConfig::default()
        });
        engine.activate(rules, defs).unwrap();

        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);
        assert!(message.has_field("second_stage_ran"));
    }

    #[test]
    fn test_either_mode_matches_with_one_rule() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![
            Rule::new("no", Expression::Boolean(false), vec![]),
            Rule::new(
                "yes",
                Expression::Boolean(true),
                vec![set_field_stmt("matched", Value::Long(1))],
            ),
            Rule::new(
                "after",
                Expression::Boolean(true),
                vec![set_field_stmt("after_ran", Value::Long(1))],
            ),
        ];
        engine
            .activate(
                rules,
                vec![pipeline_def(
                    "p",
                    vec![
                        stage_def(0, MatchMode::Either, &["no", "yes"]),
                        stage_def(1, MatchMode::All, &["after"]),
                    ],
                )],
            )
            .unwrap();

        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);
        assert!(message.has_field("matched"));
        // either-mode stage matched, so the pipeline continued
        assert!(message.has_field("after_ran"));
    }

    #[test]
    fn test_empty_stage_keeps_pipeline_going() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![Rule::new(
            "later",
            Expression::Boolean(true),
            vec![set_field_stmt("later_ran", Value::Long(1))],
        )];
        engine
            .activate(
                rules,
                vec![pipeline_def(
                    "p",
                    vec![
                        stage_def(0, MatchMode::All, &[]),
                        stage_def(1, MatchMode::All, &["later"]),
                    ],
                )],
            )
            .unwrap();

        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);
        assert!(message.has_field("later_ran"));
    }

    #[test]
    fn test_failed_activation_keeps_previous_ruleset() {
        let engine = interpreter(EngineConfig::default());
        engine
            .activate(
                vec![Rule::new(
                    "original",
                    Expression::Boolean(true),
                    vec![set_field_stmt("from_original", Value::Long(1))],
                )],
                vec![pipeline_def(
                    "p",
                    vec![stage_def(0, MatchMode::All, &["original"])],
                )],
            )
            .unwrap();

        // duplicate rule names must fail before activation
        let result = engine.activate(
            vec![
                Rule::new("dup", Expression::Boolean(true), vec![]),
                Rule::new("dup", Expression::Boolean(true), vec![]),
            ],
            vec![],
        );
        assert_eq!(result, Err(LoadError::DuplicateRuleName("dup".into())));

        // the previously active set still serves traffic
        let mut message = Message::empty();
        let report = engine.process(&mut message, &["p"]);
        assert!(report.is_clean());
        assert!(message.has_field("from_original"));
    }

    #[test]
    fn test_variables_are_isolated_per_pipeline_run() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![
            Rule::new(
                "binds",
                Expression::Boolean(true),
                vec![
                    Statement::VarAssign {
                        name: "x".into(),
                        value: Expression::Literal(Value::Long(1)),
                    },
                    set_field_stmt("p1_ran", Value::Long(1)),
                ],
            ),
            Rule::new(
                "reads",
                Expression::Boolean(true),
                vec![Statement::FunctionCall(FunctionCall::new(
                    "set_field",
                    vec![
                        CallArgument::new("field", Expression::Literal(Value::from("x_copy"))),
                        CallArgument::new("value", Expression::Variable("x".into())),
                    ],
                ))],
            ),
        ];
        engine
            .activate(
                rules,
                vec![
                    pipeline_def("a", vec![stage_def(0, MatchMode::All, &["binds"])]),
                    pipeline_def("b", vec![stage_def(0, MatchMode::All, &["reads"])]),
                ],
            )
            .unwrap();

        let mut message = Message::empty();
        let report = engine.process(&mut message, &["a", "b"]);

        // pipeline `a` bound x; pipeline `b` gets a fresh context and fails
        assert!(message.has_field("p1_ran"));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].rule_name, "reads");
        assert_eq!(
            report.errors[0].error,
            EvalError::UndefinedVariable("x".into())
        );
        assert!(!message.has_field("x_copy"));
    }

    #[test]
    fn test_drop_message_keeps_processing() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![
            Rule::new(
                "drops",
                Expression::Boolean(true),
                vec![Statement::FunctionCall(FunctionCall::new("drop_message", vec![]))],
            ),
            Rule::new(
                "still runs",
                Expression::Boolean(true),
                vec![set_field_stmt("ran_after_drop", Value::Long(1))],
            ),
        ];
        engine
            .activate(
                rules,
                vec![pipeline_def(
                    "p",
                    vec![
                        stage_def(0, MatchMode::All, &["drops"]),
                        stage_def(1, MatchMode::All, &["still runs"]),
                    ],
                )],
            )
            .unwrap();

        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);

        // the flag is for the output stage; the pipeline is not cut short
        assert!(message.filter_out());
        assert!(message.has_field("ran_after_drop"));
    }

    #[test]
    fn test_rule_metrics_are_recorded() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![
            Rule::new(
                "matches",
                Expression::Boolean(true),
                vec![set_field_stmt("x", Value::Long(1))],
            ),
            Rule::new("misses", Expression::Boolean(false), vec![]),
            Rule::new("errors", Expression::Boolean(true), vec![failing_stmt()]),
        ];
        engine
            .activate(
                rules,
                vec![pipeline_def(
                    "p",
                    vec![stage_def(0, MatchMode::Either, &["matches", "misses", "errors"])],
                )],
            )
            .unwrap();

        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);
        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);

        let metrics = engine.metrics();
        let matches = metrics.snapshot("matches").unwrap();
        assert_eq!(matches.matches, 2);
        assert_eq!(matches.executions, 2);
        let misses = metrics.snapshot("misses").unwrap();
        assert_eq!(misses.non_matches, 2);
        let errors = metrics.snapshot("errors").unwrap();
        assert_eq!(errors.matches, 2);
        assert_eq!(errors.failures, 2);
    }

    #[test]
    fn test_unknown_pipeline_binding_is_skipped() {
        let engine = interpreter(EngineConfig::default());
        let mut message = Message::empty();
        let report = engine.process(&mut message, &["no-such-pipeline"]);
        assert!(report.is_clean());
    }

    #[test]
    fn test_processing_error_field_accumulates_rule_failures() {
        let engine = interpreter(EngineConfig::default());
        let rules = vec![Rule::new(
            "errors",
            Expression::Boolean(true),
            vec![failing_stmt()],
        )];
        engine
            .activate(
                rules,
                vec![pipeline_def(
                    "p",
                    vec![stage_def(0, MatchMode::All, &["errors"])],
                )],
            )
            .unwrap();

        let mut message = Message::empty();
        engine.process(&mut message, &["p"]);

        let error_field = message
            .field(crate::message::FIELD_PROCESSING_ERROR)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        assert!(error_field.starts_with("For rule 'errors':"));
    }
}
