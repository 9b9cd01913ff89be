//! Model factory for creating client instances from configuration.

use crate::{MockModel, PlatformChatModel, PlatformCompletionModel};
use nimbus_abstraction::{Model, ModelError};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error};

/// Model client family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Mock model for testing.
    Mock,
    /// Chat endpoint client.
    Chat,
    /// Completion endpoint client.
    Completion,
}

impl FromStr for ModelKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "chat" => Ok(Self::Chat),
            "completion" | "completions" => Ok(Self::Completion),
            _ => Err(()),
        }
    }
}

/// Model client configuration.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// The client family to create.
    pub kind: ModelKind,
    /// The model ID (e.g., "nimbus-chat-8k").
    pub model_id: String,
    /// Optional API key (loaded from the environment when absent).
    pub api_key: Option<String>,
    /// Optional base URL override.
    pub base_url: Option<String>,
}

impl ModelConfig {
    /// Creates a configuration for the given kind and model ID.
    #[must_use]
    pub fn new(kind: ModelKind, model_id: String) -> Self {
        Self { kind, model_id, api_key: None, base_url: None }
    }

    /// Sets an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Sets a base URL override.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// Factory for creating model client instances.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates a model client from the given configuration.
    ///
    /// # Errors
    /// Returns a `ModelError` if creation fails (e.g., missing API key).
    pub fn create(config: ModelConfig) -> Result<Arc<dyn Model>, ModelError> {
        debug!(kind = ?config.kind, model_id = %config.model_id, "creating model client");
        match config.kind {
            ModelKind::Mock => Ok(Arc::new(MockModel::new(config.model_id))),
            ModelKind::Chat => {
                let mut model = if let Some(api_key) = config.api_key {
                    PlatformChatModel::with_api_key(config.model_id, api_key)
                } else {
                    PlatformChatModel::new(config.model_id)?
                };
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                Ok(Arc::new(model))
            }
            ModelKind::Completion => {
                let mut model = if let Some(api_key) = config.api_key {
                    PlatformCompletionModel::with_api_key(config.model_id, api_key)
                } else {
                    PlatformCompletionModel::new(config.model_id)?
                };
                if let Some(base_url) = config.base_url {
                    model = model.with_base_url(base_url);
                }
                Ok(Arc::new(model))
            }
        }
    }

    /// Creates a model client from a kind string and model ID.
    ///
    /// # Errors
    /// Returns a `ModelError` if the kind is unrecognized or creation
    /// fails.
    pub fn create_from_str(kind: &str, model_id: String) -> Result<Arc<dyn Model>, ModelError> {
        let kind = ModelKind::from_str(kind).map_err(|()| {
            error!(kind = %kind, "unrecognized model kind");
            ModelError::UnsupportedModelProvider(format!("Unrecognized model kind: {kind}"))
        })?;
        Self::create(ModelConfig::new(kind, model_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind_from_str() {
        assert_eq!(ModelKind::from_str("mock"), Ok(ModelKind::Mock));
        assert_eq!(ModelKind::from_str("Chat"), Ok(ModelKind::Chat));
        assert_eq!(ModelKind::from_str("COMPLETION"), Ok(ModelKind::Completion));
        assert_eq!(ModelKind::from_str("unknown"), Err(()));
    }

    #[test]
    fn test_factory_create_mock() {
        let model =
            ModelFactory::create(ModelConfig::new(ModelKind::Mock, "test-mock".to_string()))
                .unwrap();
        assert_eq!(model.model_id(), "test-mock");
    }

    #[test]
    fn test_factory_create_chat_with_api_key() {
        let config = ModelConfig::new(ModelKind::Chat, "nimbus-chat-8k".to_string())
            .with_api_key("key".to_string());
        let model = ModelFactory::create(config).unwrap();
        assert_eq!(model.model_id(), "nimbus-chat-8k");
    }

    #[test]
    fn test_factory_rejects_unknown_kind() {
        assert!(ModelFactory::create_from_str("invalid", "m".to_string()).is_err());
    }
}
