//! Training configuration and per-model hyperparameter limits.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Hyperparameters submitted with a training task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub epochs: u32,
    pub learning_rate: f64,
    pub batch_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_seq_len: Option<u32>,
    /// Percentage of the dataset used for training (rest is validation).
    pub train_split_percent: u32,
    /// Model-specific extras validated against the same limit table.
    #[serde(default)]
    pub extras: BTreeMap<String, Value>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 1,
            learning_rate: 2e-5,
            batch_size: 1,
            max_seq_len: None,
            train_split_percent: 80,
            extras: BTreeMap::new(),
        }
    }
}

impl TrainConfig {
    /// Flattens the config into named fields for limit checking and wire
    /// submission.
    #[must_use]
    pub fn as_fields(&self) -> BTreeMap<String, Value> {
        let mut fields = BTreeMap::new();
        fields.insert("epochs".to_string(), json!(self.epochs));
        fields.insert("learning_rate".to_string(), json!(self.learning_rate));
        fields.insert("batch_size".to_string(), json!(self.batch_size));
        if let Some(max_seq_len) = self.max_seq_len {
            fields.insert("max_seq_len".to_string(), json!(max_seq_len));
        }
        fields.insert("train_split_percent".to_string(), json!(self.train_split_percent));
        for (name, value) in &self.extras {
            fields.insert(name.clone(), value.clone());
        }
        fields
    }

    /// Validates every field against a model's declared limits.
    ///
    /// In strict mode the first violation is a typed error; in lenient
    /// mode violations are logged as warnings and the config passes.
    pub fn validate(&self, limit: &TrainLimit, strict: bool) -> PipelineResult<()> {
        for (name, value) in self.as_fields() {
            if let Err(reason) = limit.check(&name, &value) {
                if strict {
                    return Err(PipelineError::InvalidTrainConfig(reason));
                }
                warn!(field = %name, %reason, "train config violates model limit");
            }
        }
        Ok(())
    }
}

/// One field's validity rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldLimit {
    /// Numeric value within `[min, max]`.
    Range { min: f64, max: f64 },
    /// Value must be one of the options.
    Choice { options: Vec<Value> },
    /// Value must be an array whose elements are all options.
    MultiChoice { options: Vec<Value> },
}

impl FieldLimit {
    fn check(&self, name: &str, value: &Value) -> Result<(), String> {
        match self {
            Self::Range { min, max } => {
                let Some(number) = value.as_f64() else {
                    return Err(format!("field '{name}' must be numeric, got {value}"));
                };
                if number < *min || number > *max {
                    return Err(format!(
                        "field '{name}' value {number} is outside [{min}, {max}]"
                    ));
                }
                Ok(())
            }
            Self::Choice { options } => {
                if options.contains(value) {
                    Ok(())
                } else {
                    Err(format!("field '{name}' value {value} is not one of {options:?}"))
                }
            }
            Self::MultiChoice { options } => {
                let Some(items) = value.as_array() else {
                    return Err(format!("field '{name}' must be a list, got {value}"));
                };
                for item in items {
                    if !options.contains(item) {
                        return Err(format!(
                            "field '{name}' element {item} is not one of {options:?}"
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

/// Per-model hyperparameter limit table. Fields without an entry are
/// accepted unchecked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainLimit {
    limits: HashMap<String, FieldLimit>,
}

impl TrainLimit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field rule.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, limit: FieldLimit) -> Self {
        self.limits.insert(name.into(), limit);
        self
    }

    /// Checks one field against its rule, if any.
    pub fn check(&self, name: &str, value: &Value) -> Result<(), String> {
        match self.limits.get(name) {
            Some(limit) => limit.check(name, value),
            None => Ok(()),
        }
    }
}

/// A trainable base model and its declared limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub limit: TrainLimit,
    pub supports_incremental: bool,
}

/// Registry of trainable base models.
#[derive(Debug, Clone)]
pub struct ModelInfoRegistry {
    infos: HashMap<String, ModelInfo>,
}

impl Default for ModelInfoRegistry {
    fn default() -> Self {
        let mut infos = HashMap::new();
        for info in [
            ModelInfo {
                model_type: "nimbus-base-8k".to_string(),
                limit: TrainLimit::new()
                    .with_field("epochs", FieldLimit::Range { min: 1.0, max: 50.0 })
                    .with_field("learning_rate", FieldLimit::Range { min: 1e-6, max: 1e-3 })
                    .with_field(
                        "batch_size",
                        FieldLimit::Choice { options: vec![json!(1), json!(2), json!(4), json!(8)] },
                    )
                    .with_field("train_split_percent", FieldLimit::Range { min: 1.0, max: 100.0 }),
                supports_incremental: true,
            },
            ModelInfo {
                model_type: "nimbus-base-lite".to_string(),
                limit: TrainLimit::new()
                    .with_field("epochs", FieldLimit::Range { min: 1.0, max: 10.0 })
                    .with_field("learning_rate", FieldLimit::Range { min: 1e-6, max: 2e-4 })
                    .with_field("train_split_percent", FieldLimit::Range { min: 1.0, max: 100.0 }),
                supports_incremental: false,
            },
        ] {
            infos.insert(info.model_type.clone(), info);
        }
        Self { infos }
    }
}

impl ModelInfoRegistry {
    /// Looks up a base model's info.
    #[must_use]
    pub fn get(&self, model_type: &str) -> Option<&ModelInfo> {
        self.infos.get(model_type)
    }

    /// Registers (or replaces) a model's info.
    pub fn register(&mut self, info: ModelInfo) {
        self.infos.insert(info.model_type.clone(), info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit() -> TrainLimit {
        TrainLimit::new()
            .with_field("epochs", FieldLimit::Range { min: 1.0, max: 10.0 })
            .with_field(
                "batch_size",
                FieldLimit::Choice { options: vec![json!(1), json!(2)] },
            )
            .with_field(
                "stop_words",
                FieldLimit::MultiChoice { options: vec![json!("a"), json!("b")] },
            )
    }

    #[test]
    fn test_valid_config_passes_strict() {
        let config = TrainConfig { epochs: 5, batch_size: 2, ..TrainConfig::default() };
        assert!(config.validate(&limit(), true).is_ok());
    }

    #[test]
    fn test_range_violation_fails_strict() {
        let config = TrainConfig { epochs: 99, ..TrainConfig::default() };
        let err = config.validate(&limit(), true).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTrainConfig(_)));
    }

    #[test]
    fn test_choice_violation_fails_strict() {
        let config = TrainConfig { batch_size: 7, ..TrainConfig::default() };
        assert!(config.validate(&limit(), true).is_err());
    }

    #[test]
    fn test_multi_choice_checks_every_element() {
        let mut config = TrainConfig::default();
        config.extras.insert("stop_words".to_string(), json!(["a", "b"]));
        assert!(config.validate(&limit(), true).is_ok());

        config.extras.insert("stop_words".to_string(), json!(["a", "z"]));
        assert!(config.validate(&limit(), true).is_err());
    }

    #[test]
    fn test_lenient_mode_only_warns() {
        let config = TrainConfig { epochs: 99, batch_size: 7, ..TrainConfig::default() };
        assert!(config.validate(&limit(), false).is_ok());
    }

    #[test]
    fn test_registry_has_default_models() {
        let registry = ModelInfoRegistry::default();
        assert!(registry.get("nimbus-base-8k").is_some());
        assert!(registry.get("unknown").is_none());
    }
}
