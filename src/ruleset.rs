//! Rule-set loading: validation, rule-reference resolution, stage ordering,
//! constant folding. A loaded `RuleSet` is the immutable snapshot the
//! interpreter evaluates against; activation is all-or-nothing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::ast::{MatchMode, Pipeline, Rule, Stage};
use crate::function_registry::FunctionRegistry;
use crate::preprocessor::ConstantFolder;

/// Pipeline shape as delivered by the persistence collaborator: stages
/// reference rules by name, resolved here against the rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub stages: Vec<StageDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
    pub priority: i32,
    #[serde(default)]
    pub match_mode: MatchMode,
    pub rules: Vec<String>,
}

/// A failure that prevents a rule set from becoming active. The previously
/// active set keeps serving traffic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("duplicate rule name `{0}`")]
    DuplicateRuleName(String),

    #[error("rule `{rule}` calls unknown function `{function}`")]
    UnknownFunction { rule: String, function: String },

    #[error("rule `{rule}`: function `{function}` has no parameter `{param}`")]
    UnknownParameter {
        rule: String,
        function: String,
        param: String,
    },

    #[error("rule `{rule}`: missing required parameter `{param}` of `{function}`")]
    MissingParameter {
        rule: String,
        function: String,
        param: String,
    },

    #[error("rule `{rule}`: constant argument `{param}` of `{function}` is invalid: {reason}")]
    ConstantArgument {
        rule: String,
        function: String,
        param: String,
        reason: String,
    },
}

/// The immutable, validated, constant-folded snapshot of all pipelines and
/// rules. Swapped atomically on reload; in-flight evaluations keep their
/// snapshot.
#[derive(Debug, Default)]
pub struct RuleSet {
    pipelines: HashMap<String, Arc<Pipeline>>,
    rules: HashMap<String, Arc<Rule>>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(
        rules: Vec<Rule>,
        pipeline_defs: Vec<PipelineDef>,
        registry: &FunctionRegistry,
    ) -> Result<Self, LoadError> {
        let folder = ConstantFolder::new(registry);

        let mut by_name: HashMap<String, Arc<Rule>> = HashMap::with_capacity(rules.len());
        for mut rule in rules {
            if by_name.contains_key(&rule.name) {
                return Err(LoadError::DuplicateRuleName(rule.name));
            }
            folder.prepare_rule(&mut rule)?;
            by_name.insert(rule.name.clone(), Arc::new(rule));
        }

        let mut pipelines = HashMap::with_capacity(pipeline_defs.len());
        for def in pipeline_defs {
            let PipelineDef { id, name, stages } = def;
            let mut stages: Vec<Stage> = stages
                .into_iter()
                .map(|stage| Stage {
                    priority: stage.priority,
                    match_mode: stage.match_mode,
                    rules: stage
                        .rules
                        .iter()
                        .map(|rule_name| match by_name.get(rule_name) {
                            Some(rule) => rule.clone(),
                            None => {
                                warn!(
                                    rule = %rule_name,
                                    pipeline = %name,
                                    "unresolved rule reference, substituting never-matching placeholder"
                                );
                                Arc::new(Rule::always_false(rule_name))
                            }
                        })
                        .collect(),
                })
                .collect();
            // stable sort: equal priorities keep their insertion order
            stages.sort_by_key(|stage| stage.priority);

            let pipeline = Pipeline { id, name, stages };
            let key = pipeline.key().to_string();
            if pipelines.insert(key.clone(), Arc::new(pipeline)).is_some() {
                warn!(pipeline = %key, "pipeline key registered twice, keeping the later one");
            }
        }

        info!(
            rules = by_name.len(),
            pipelines = pipelines.len(),
            "rule set loaded"
        );
        Ok(Self {
            pipelines,
            rules: by_name,
        })
    }

    pub fn pipeline(&self, key: &str) -> Option<&Arc<Pipeline>> {
        self.pipelines.get(key)
    }

    pub fn pipelines(&self) -> impl Iterator<Item = &Arc<Pipeline>> {
        self.pipelines.values()
    }

    pub fn rule(&self, name: &str) -> Option<&Arc<Rule>> {
        self.rules.get(name)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}
