//! Per-model capability tables.
//!
//! Each platform model declares its token limits, streaming support, and
//! the optional request parameters it accepts. Request building runs the
//! caller's parameters through [`validate_parameters`], which strips
//! unsupported options (with a warning) and clamps the rest into range.

use nimbus_abstraction::ModelParameters;
use tracing::warn;

/// Static capability record for one platform model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub model_id: &'static str,
    /// Maximum prompt tokens accepted per request.
    pub max_input_tokens: u32,
    /// Maximum tokens the model will generate per request.
    pub max_output_tokens: u32,
    pub supports_streaming: bool,
    /// Optional request parameters the endpoint understands.
    pub supported_parameters: &'static [&'static str],
}

const CHAT_PARAMETERS: &[&str] =
    &["temperature", "top_p", "max_tokens", "stop_sequences", "penalty_score", "system"];

const LITE_PARAMETERS: &[&str] = &["temperature", "top_p", "max_tokens"];

const COMPLETION_PARAMETERS: &[&str] =
    &["temperature", "top_p", "max_tokens", "stop_sequences", "penalty_score"];

/// Capability table for the platform's built-in models.
pub const CAPABILITIES: &[ModelCapabilities] = &[
    ModelCapabilities {
        model_id: "nimbus-chat-8k",
        max_input_tokens: 8192,
        max_output_tokens: 2048,
        supports_streaming: true,
        supported_parameters: CHAT_PARAMETERS,
    },
    ModelCapabilities {
        model_id: "nimbus-chat-32k",
        max_input_tokens: 32768,
        max_output_tokens: 4096,
        supports_streaming: true,
        supported_parameters: CHAT_PARAMETERS,
    },
    ModelCapabilities {
        model_id: "nimbus-chat-lite",
        max_input_tokens: 4096,
        max_output_tokens: 1024,
        supports_streaming: true,
        supported_parameters: LITE_PARAMETERS,
    },
    ModelCapabilities {
        model_id: "nimbus-completion-8k",
        max_input_tokens: 8192,
        max_output_tokens: 2048,
        supports_streaming: false,
        supported_parameters: COMPLETION_PARAMETERS,
    },
];

/// Looks up the capability record for a model id.
#[must_use]
pub fn capabilities_for(model_id: &str) -> Option<&'static ModelCapabilities> {
    CAPABILITIES.iter().find(|capabilities| capabilities.model_id == model_id)
}

fn supported(capabilities: &ModelCapabilities, parameter: &str) -> bool {
    capabilities.supported_parameters.contains(&parameter)
}

/// Reconciles caller parameters with a model's declared capabilities.
///
/// Unsupported options are dropped with a warning; `max_tokens` is clamped
/// to the model's output limit; sampling parameters are clamped into their
/// valid ranges. Unknown models pass through untouched — fine-tuned models
/// are registered server-side and validated there.
#[must_use]
pub fn validate_parameters(model_id: &str, mut parameters: ModelParameters) -> ModelParameters {
    let Some(capabilities) = capabilities_for(model_id) else {
        return parameters;
    };

    if parameters.temperature.is_some() && !supported(capabilities, "temperature") {
        warn!(model = model_id, "dropping unsupported parameter 'temperature'");
        parameters.temperature = None;
    }
    if parameters.top_p.is_some() && !supported(capabilities, "top_p") {
        warn!(model = model_id, "dropping unsupported parameter 'top_p'");
        parameters.top_p = None;
    }
    if parameters.max_tokens.is_some() && !supported(capabilities, "max_tokens") {
        warn!(model = model_id, "dropping unsupported parameter 'max_tokens'");
        parameters.max_tokens = None;
    }
    if parameters.stop_sequences.is_some() && !supported(capabilities, "stop_sequences") {
        warn!(model = model_id, "dropping unsupported parameter 'stop_sequences'");
        parameters.stop_sequences = None;
    }
    if parameters.penalty_score.is_some() && !supported(capabilities, "penalty_score") {
        warn!(model = model_id, "dropping unsupported parameter 'penalty_score'");
        parameters.penalty_score = None;
    }
    if parameters.system.is_some() && !supported(capabilities, "system") {
        warn!(model = model_id, "dropping unsupported parameter 'system'");
        parameters.system = None;
    }

    if let Some(temperature) = parameters.temperature {
        let clamped = temperature.clamp(f32::EPSILON, 1.0);
        if (clamped - temperature).abs() > f32::EPSILON {
            warn!(model = model_id, temperature, "clamping temperature into (0, 1]");
            parameters.temperature = Some(clamped);
        }
    }
    if let Some(top_p) = parameters.top_p {
        let clamped = top_p.clamp(0.0, 1.0);
        if (clamped - top_p).abs() > f32::EPSILON {
            warn!(model = model_id, top_p, "clamping top_p into [0, 1]");
            parameters.top_p = Some(clamped);
        }
    }
    if let Some(max_tokens) = parameters.max_tokens {
        if max_tokens > capabilities.max_output_tokens {
            warn!(
                model = model_id,
                max_tokens,
                limit = capabilities.max_output_tokens,
                "clamping max_tokens to the model's output limit"
            );
            parameters.max_tokens = Some(capabilities.max_output_tokens);
        }
    }

    parameters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert!(capabilities_for("nimbus-chat-8k").is_some());
        assert!(capabilities_for("missing-model").is_none());
    }

    #[test]
    fn test_unsupported_parameters_are_dropped() {
        let parameters = ModelParameters {
            penalty_score: Some(1.2),
            system: Some("be brief".to_string()),
            temperature: Some(0.5),
            ..ModelParameters::default()
        };
        let validated = validate_parameters("nimbus-chat-lite", parameters);
        assert!(validated.penalty_score.is_none());
        assert!(validated.system.is_none());
        assert_eq!(validated.temperature, Some(0.5));
    }

    #[test]
    fn test_max_tokens_clamped_to_model_limit() {
        let parameters = ModelParameters { max_tokens: Some(100_000), ..ModelParameters::default() };
        let validated = validate_parameters("nimbus-chat-8k", parameters);
        assert_eq!(validated.max_tokens, Some(2048));
    }

    #[test]
    fn test_out_of_range_sampling_clamped() {
        let parameters = ModelParameters {
            temperature: Some(3.0),
            top_p: Some(1.5),
            ..ModelParameters::default()
        };
        let validated = validate_parameters("nimbus-chat-8k", parameters);
        assert_eq!(validated.temperature, Some(1.0));
        assert_eq!(validated.top_p, Some(1.0));
    }

    #[test]
    fn test_unknown_model_passes_through() {
        let parameters = ModelParameters { penalty_score: Some(1.5), ..ModelParameters::default() };
        let validated = validate_parameters("my-finetune", parameters);
        assert_eq!(validated.penalty_score, Some(1.5));
    }
}
