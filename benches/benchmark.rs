use std::collections::HashMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use floodgate::{
    CallArgument, ComparisonOp, EngineConfig, Expression, FunctionCall, FunctionRegistry,
    MatchMode, Message, PipelineDef, PipelineInterpreter, Rule, StageDef, Statement, Value,
};

fn set_field(field: &str, value: Expression) -> Statement {
    Statement::FunctionCall(FunctionCall::new(
        "set_field",
        vec![
            CallArgument::new("field", Expression::Literal(Value::from(field))),
            CallArgument::new("value", value),
        ],
    ))
}

fn build_interpreter() -> PipelineInterpreter {
    let interpreter =
        PipelineInterpreter::new(Arc::new(FunctionRegistry::with_builtins()), EngineConfig {
            rule_metrics: false,
            ..EngineConfig::default()
        });

    let rules = vec![
        Rule::new(
            "internal traffic",
            Expression::FunctionCall(FunctionCall::new(
                "cidr_match",
                vec![
                    CallArgument::new("cidr", Expression::Literal(Value::from("10.0.0.0/8"))),
                    CallArgument::new("ip", Expression::Field("source_ip".into())),
                ],
            )),
            vec![set_field("network", Expression::Literal(Value::from("internal")))],
        ),
        Rule::new(
            "high severity",
            Expression::Comparison {
                op: ComparisonOp::Lte,
                left: Box::new(Expression::FunctionCall(FunctionCall::new(
                    "to_long",
                    vec![
                        CallArgument::new("value", Expression::Field("level".into())),
                        CallArgument::new("default", Expression::Literal(Value::Long(7))),
                    ],
                ))),
                right: Box::new(Expression::Literal(Value::Long(3))),
            },
            vec![set_field("alert", Expression::Literal(Value::Boolean(true)))],
        ),
        Rule::new(
            "normalize source",
            Expression::Boolean(true),
            vec![set_field(
                "source",
                Expression::FunctionCall(FunctionCall::new(
                    "lowercase",
                    vec![CallArgument::new("value", Expression::Field("source".into()))],
                )),
            )],
        ),
    ];
    let pipelines = vec![PipelineDef {
        id: None,
        name: "bench".into(),
        stages: vec![
            StageDef {
                priority: 0,
                match_mode: MatchMode::Either,
                rules: vec!["internal traffic".into(), "high severity".into()],
            },
            StageDef {
                priority: 1,
                match_mode: MatchMode::All,
                rules: vec!["normalize source".into()],
            },
        ],
    }];
    interpreter.activate(rules, pipelines).unwrap();
    interpreter
}

fn bench_message() -> Message {
    Message::new(HashMap::from([
        ("source".to_string(), Value::from("Gateway-1")),
        ("source_ip".to_string(), Value::from("10.20.30.40")),
        ("level".to_string(), Value::from("2")),
    ]))
}

fn process_benchmark(c: &mut Criterion) {
    let interpreter = build_interpreter();

    c.bench_function("process one message through two stages", |b| {
        b.iter(|| {
            let mut message = bench_message();
            let report = interpreter.process(black_box(&mut message), &["bench"]);
            black_box((message, report))
        })
    });
}

fn activation_benchmark(c: &mut Criterion) {
    c.bench_function("activate rule set with constant folding", |b| {
        b.iter(|| black_box(build_interpreter()))
    });
}

criterion_group!(benches, process_benchmark, activation_benchmark);
criterion_main!(benches);
