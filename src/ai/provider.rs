//! AI provider contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AiError;

/// Who said a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// What the guide sends to a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
}

/// Something that can answer a tour request.
///
/// Returns the assistant's raw text; the orchestrator does the parsing so
/// every provider is held to the same response contract.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider name for logs and errors.
    fn name(&self) -> &str;

    /// Model behind the provider. Defaults to the provider name.
    fn model_name(&self) -> &str {
        self.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, AiError>;
}
