//! Adapter from rig-core completion models to `AiProvider`.

use async_trait::async_trait;
use rig::OneOrMany;
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Message};
use tracing::{debug, warn};

use super::provider::{AiProvider, ChatMessage, ProviderRequest, Role};
use crate::error::AiError;

/// Default completion budget. Tour replies are a short JSON object.
const DEFAULT_MAX_TOKENS: u64 = 1024;

/// Wraps any rig `CompletionModel` as an `AiProvider`.
pub struct RigAdapter<M> {
    model: M,
    provider: &'static str,
    model_name: String,
    max_tokens: u64,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(provider: &'static str, model: M, model_name: impl Into<String>) -> Self {
        Self {
            model,
            provider,
            model_name: model_name.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn failed(&self, reason: impl Into<String>) -> AiError {
        AiError::RequestFailed {
            provider: self.provider.to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl<M> AiProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<String, AiError> {
        let turns = request.messages.len();
        let (prompt, history) = split_history(request.messages)
            .ok_or_else(|| self.failed("No user message to send"))?;

        debug!(provider = self.provider, model = %self.model_name, turns, "Sending tour request");

        let response = self
            .model
            .completion_request(prompt)
            .preamble(request.system_prompt)
            .messages(history)
            .max_tokens(self.max_tokens)
            .send()
            .await
            .map_err(|e| {
                warn!(provider = self.provider, error = %e, "Completion request failed");
                self.failed(e.to_string())
            })?;

        Ok(collect_text(response.choice))
    }
}

fn to_rig(message: ChatMessage) -> Message {
    match message.role {
        Role::User => Message::user(message.content),
        Role::Assistant => Message::assistant(message.content),
    }
}

/// Split a conversation into rig's prompt (the final turn) and the history
/// before it. None when the conversation is empty.
fn split_history(mut messages: Vec<ChatMessage>) -> Option<(Message, Vec<Message>)> {
    let prompt = to_rig(messages.pop()?);
    Some((prompt, messages.into_iter().map(to_rig).collect()))
}

/// Concatenate the text parts of a completion, skipping tool calls and
/// reasoning.
fn collect_text(choice: OneOrMany<AssistantContent>) -> String {
    choice
        .into_iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}
