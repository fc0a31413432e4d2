//! AI integration: provider contract, rig-backed providers, and the
//! request/parse round-trip.
//!
//! Uses the rig-core crate for HTTP transport and the `RigAdapter` to bridge
//! rig's `CompletionModel` trait to our `AiProvider` trait.

pub mod orchestrator;
pub mod provider;
pub mod response;
mod rig_adapter;

pub use orchestrator::call_ai;
pub use provider::{AiProvider, ChatMessage, ProviderRequest, Role};
pub use response::{AiReply, AiStep, Position, parse_response};
pub use rig_adapter::RigAdapter;

use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::AiError;

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBackend {
    Anthropic,
    OpenAi,
}

/// Configuration for creating an AI provider.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub backend: AiBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub max_tokens: u64,
}

impl AiConfig {
    pub fn new(backend: AiBackend, api_key: secrecy::SecretString, model: impl Into<String>) -> Self {
        Self {
            backend,
            api_key,
            model: model.into(),
            max_tokens: 1024,
        }
    }
}

/// Create an AI provider from configuration.
pub fn create_provider(config: &AiConfig) -> Result<Arc<dyn AiProvider>, AiError> {
    match config.backend {
        AiBackend::Anthropic => create_anthropic_provider(config),
        AiBackend::OpenAi => create_openai_provider(config),
    }
}

fn create_anthropic_provider(config: &AiConfig) -> Result<Arc<dyn AiProvider>, AiError> {
    use rig::providers::anthropic;

    let client: rig::client::Client<anthropic::client::AnthropicExt> =
        anthropic::Client::new(config.api_key.expose_secret()).map_err(|e| {
            AiError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("Failed to create Anthropic client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(
        RigAdapter::new("anthropic", model, &config.model).with_max_tokens(config.max_tokens),
    ))
}

fn create_openai_provider(config: &AiConfig) -> Result<Arc<dyn AiProvider>, AiError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::new(config.api_key.expose_secret()).map_err(|e| {
            AiError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            }
        })?;

    let model = client.completion_model(&config.model);
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(
        RigAdapter::new("openai", model, &config.model).with_max_tokens(config.max_tokens),
    ))
}
