//! Local evaluators for inference output datasets.

use crate::error::{PipelineError, PipelineResult};
use nimbus_dataset::Dataset;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scores one model output against an optional ground-truth reference.
pub trait Evaluator: Send + Sync {
    /// Stable evaluator name used in score summaries.
    fn name(&self) -> &str;

    /// Returns a score in `[0, 1]` for one row.
    fn score(&self, output: &str, reference: Option<&str>) -> f64;
}

/// Full-string equality after trimming.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchEvaluator;

impl Evaluator for ExactMatchEvaluator {
    fn name(&self) -> &str {
        "exact_match"
    }

    fn score(&self, output: &str, reference: Option<&str>) -> f64 {
        match reference {
            Some(reference) if output.trim() == reference.trim() => 1.0,
            _ => 0.0,
        }
    }
}

/// The output contains the reference as a substring.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsEvaluator;

impl Evaluator for ContainsEvaluator {
    fn name(&self) -> &str {
        "contains"
    }

    fn score(&self, output: &str, reference: Option<&str>) -> f64 {
        match reference {
            Some(reference) if !reference.is_empty() && output.contains(reference.trim()) => 1.0,
            _ => 0.0,
        }
    }
}

/// One evaluator's aggregate over a result dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorScore {
    pub evaluator: String,
    pub mean_score: f64,
    pub row_count: usize,
}

/// Scores every row of an inference result dataset with each evaluator.
///
/// The dataset must carry eval-output column metadata (as produced by the
/// batch inference runner).
pub fn score_dataset(
    dataset: &Dataset,
    evaluators: &[std::sync::Arc<dyn Evaluator>],
) -> PipelineResult<Vec<EvaluatorScore>> {
    let output_column = dataset.eval_output_column().ok_or_else(|| {
        PipelineError::InvalidArgument(
            "dataset has no eval output column; run batch inference first".to_string(),
        )
    })?;
    let reference_column = dataset.reference_column();

    let mut scores = Vec::with_capacity(evaluators.len());
    for evaluator in evaluators {
        let mut total = 0.0;
        let mut rows = 0_usize;
        for row in dataset.table().rows() {
            let output = row.get(output_column).and_then(Value::as_str).unwrap_or("");
            let reference =
                reference_column.and_then(|column| row.get(column)).and_then(Value::as_str);
            total += evaluator.score(output, reference);
            rows += 1;
        }
        let mean_score = if rows == 0 { 0.0 } else { total / rows as f64 };
        scores.push(EvaluatorScore {
            evaluator: evaluator.name().to_string(),
            mean_score,
            row_count: rows,
        });
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_exact_match() {
        let evaluator = ExactMatchEvaluator;
        assert!((evaluator.score("42", Some("42")) - 1.0).abs() < f64::EPSILON);
        assert!((evaluator.score(" 42 ", Some("42")) - 1.0).abs() < f64::EPSILON);
        assert!(evaluator.score("41", Some("42")) < f64::EPSILON);
        assert!(evaluator.score("42", None) < f64::EPSILON);
    }

    #[test]
    fn test_contains() {
        let evaluator = ContainsEvaluator;
        assert!((evaluator.score("the answer is 42", Some("42")) - 1.0).abs() < f64::EPSILON);
        assert!(evaluator.score("no digits here", Some("42")) < f64::EPSILON);
        assert!(evaluator.score("anything", Some("")) < f64::EPSILON);
    }

    #[test]
    fn test_score_dataset_means() {
        let mut dataset = Dataset::from_columns(vec![
            (
                "llm_output".to_string(),
                vec![serde_json::json!("42"), serde_json::json!("wrong")],
            ),
            (
                "reference".to_string(),
                vec![serde_json::json!("42"), serde_json::json!("43")],
            ),
        ])
        .unwrap();
        dataset.set_eval_output_column(Some("llm_output".to_string()));
        dataset.set_reference_column(Some("reference".to_string()));

        let evaluators: Vec<Arc<dyn Evaluator>> = vec![Arc::new(ExactMatchEvaluator)];
        let scores = score_dataset(&dataset, &evaluators).unwrap();
        assert_eq!(scores.len(), 1);
        assert!((scores[0].mean_score - 0.5).abs() < f64::EPSILON);
        assert_eq!(scores[0].row_count, 2);
    }

    #[test]
    fn test_score_dataset_requires_metadata() {
        let dataset = Dataset::from_rows(vec![]);
        let evaluators: Vec<Arc<dyn Evaluator>> = vec![Arc::new(ExactMatchEvaluator)];
        assert!(score_dataset(&dataset, &evaluators).is_err());
    }
}
