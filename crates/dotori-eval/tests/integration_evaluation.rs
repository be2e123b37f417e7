// Copyright © 2025 lituus-io <spicyzhug@gmail.com>
// All Rights Reserved.
// Licensed under PolyForm Noncommercial 1.0.0

//! Integration tests for evaluation helpers

use dotori::prelude::*;
use dotori_eval::*;
use std::sync::Arc;

fn capitals() -> Vec<Example> {
    [("France", "Paris"), ("Italy", "Rome"), ("Spain", "Madrid"), ("Japan", "Tokyo")]
        .iter()
        .map(|(country, capital)| {
            Example::new(country.to_lowercase())
                .input("question", format!("What is the capital of {country}?"))
                .output("answer", *capital)
        })
        .collect()
}

fn lookup(country: &str) -> &'static str {
    match country {
        "France" => "Paris",
        "Italy" => "Rome",
        "Spain" => "Madrid",
        _ => "unknown",
    }
}

/// Verbose unless told to be brief; knows three of the four capitals.
fn geographer() -> impl Program {
    FnProgram::new(
        "geographer",
        Signature::parse("question -> answer").unwrap(),
        |instruction: &str, _: &[Demonstration], inputs: &FieldMap| -> Result<Prediction> {
            let question = inputs
                .get("question")
                .ok_or_else(|| Error::program("missing question"))?;
            let country = question
                .trim_end_matches('?')
                .rsplit(' ')
                .next()
                .unwrap_or_default();
            let capital = lookup(country);
            let answer = if instruction.contains("brief") {
                capital.to_string()
            } else {
                format!("The capital city is {capital}.")
            };
            Ok(Prediction::new().field("answer", answer))
        },
    )
}

#[test]
fn test_f1_score_metric() {
    let example = Example::new("1").output("answer", "the quick brown fox");
    let prediction = Prediction::new().field("answer", "the quick red fox");

    let result = F1Score.evaluate(&example, &prediction).unwrap();
    assert!(result.score > 0.0);
    assert!(result.score < 1.0);
}

#[tokio::test]
async fn test_collect_then_score_in_parallel() {
    let examples = capitals();
    let predictions = collect_predictions(&geographer(), &examples).await.unwrap();
    assert_eq!(predictions.len(), 4);

    let exact = ParallelScorer::new(Arc::new(ExactMatch))
        .with_threads(4)
        .score(&examples, &predictions)
        .unwrap();
    assert_eq!(exact.passed, 0);

    let contains = ParallelScorer::new(Arc::new(ContainsAnswer::new()))
        .score(&examples, &predictions)
        .unwrap();
    assert_eq!(contains.passed, 3);
    assert!((contains.accuracy() - 0.75).abs() < 1e-12);
    assert_eq!(contains.worst(1)[0].example_id, "japan");
}

#[tokio::test]
async fn test_collect_stops_on_failure() {
    let examples = vec![Example::new("bad").input("other", "x")];
    let err = collect_predictions(&geographer(), &examples).await.unwrap_err();
    assert!(err.to_string().contains("bad"));
}

#[tokio::test]
async fn test_eval_metric_drives_optimizer() {
    let config = OptimizerConfig::preset(Preset::Light)
        .with_strategy(StrategyKind::Greedy)
        .with_num_demo_sets(2);
    let engine = OptimizationEngine::new(
        config,
        SemanticF1::new(),
        StaticProposer::new(["Be brief.", "Answer in full sentences."]),
    );

    let program = geographer();
    let result = engine.compile(&program, &capitals(), None).await.unwrap();

    assert_eq!(result.optimized_program.instruction(), "Be brief.");
    assert!((result.best_score - 0.75).abs() < 1e-12);
}

#[test]
fn test_metric_panel_aggregates() {
    let examples = capitals();
    let predictions: Vec<Prediction> = examples
        .iter()
        .map(|ex| Prediction::new().field("answer", ex.get_output("answer").unwrap_or_default()))
        .collect();

    let panel = MetricPanel::new()
        .add(ExactMatch)
        .add(F1Score)
        .add(SemanticF1::new())
        .add(ContainsAnswer::new());
    let scores = panel.aggregate_scores(&examples, &predictions).unwrap();

    assert_eq!(scores.len(), 4);
    assert!(scores.iter().all(|(_, s)| *s == 1.0));
}
