//! One AI round-trip: prompt, provider call, parse, history.

use tracing::{debug, info, warn};

use super::provider::{ChatMessage, ProviderRequest};
use super::response::{AiReply, parse_response};
use crate::error::AiError;
use crate::prompt::build_system_prompt;
use crate::state::GuideState;

/// Ask the provider for a tour answering `user_text`.
///
/// History is only appended once the reply has parsed, so a failed call
/// leaves the conversation as it was.
pub async fn call_ai(state: &GuideState, user_text: &str) -> Result<AiReply, AiError> {
    let config = state.config();
    let system_prompt = build_system_prompt(&config, &state.features());

    let mut messages = state.history();
    messages.push(ChatMessage::user(user_text));

    let provider = state.provider();
    info!(
        provider = provider.name(),
        turns = messages.len(),
        "Requesting tour from AI"
    );

    let raw = provider
        .complete(ProviderRequest {
            system_prompt,
            messages,
        })
        .await
        .inspect_err(|e| warn!(provider = provider.name(), error = %e, "AI request failed"))?;

    let reply = parse_response(&raw)?;
    state.record_exchange(ChatMessage::user(user_text), ChatMessage::assistant(raw.trim()));

    debug!(steps = reply.steps.len(), "AI proposed tour");
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiProvider, Role};
    use crate::config::GuideConfig;
    use crate::registry::{FeatureRegistry, FeatureSpec};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Replies with canned text and remembers the last request.
    struct CannedProvider {
        reply: Result<String, String>,
        seen: Mutex<Option<ProviderRequest>>,
    }

    impl CannedProvider {
        fn ok(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(None),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(reason.to_string()),
                seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl AiProvider for CannedProvider {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<String, AiError> {
            *self.seen.lock().unwrap() = Some(request);
            self.reply.clone().map_err(|reason| AiError::RequestFailed {
                provider: "canned".to_string(),
                reason,
            })
        }
    }

    fn state_with(provider: Arc<CannedProvider>) -> GuideState {
        let registry = Arc::new(FeatureRegistry::new());
        registry.register_feature(FeatureSpec::new("export", "Export").with_selector("#export"));
        GuideState::new(GuideConfig::new("Canvas"), provider, registry, None)
    }

    #[tokio::test]
    async fn success_appends_two_turns() {
        let provider = CannedProvider::ok(r#"{"message": "Sure", "steps": [{"id": "export"}]}"#);
        let state = state_with(provider.clone());

        let reply = call_ai(&state, "how do I export?").await.unwrap();
        assert_eq!(reply.steps[0].id, "export");

        let history = state.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert!(seen.system_prompt.contains("\"id\":\"export\""));
        assert_eq!(seen.messages, vec![ChatMessage::user("how do I export?")]);
    }

    #[tokio::test]
    async fn outgoing_messages_include_prior_turns() {
        let provider = CannedProvider::ok(r#"{"message": "ok", "steps": []}"#);
        let state = state_with(provider.clone());

        call_ai(&state, "first").await.unwrap();
        call_ai(&state, "second").await.unwrap();

        let seen = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.messages.len(), 3);
        assert_eq!(seen.messages[2], ChatMessage::user("second"));
        assert_eq!(state.history().len(), 4);
    }

    #[tokio::test]
    async fn malformed_reply_leaves_history_alone() {
        let state = state_with(CannedProvider::ok(r#"{"message": "no steps"}"#));
        let err = call_ai(&state, "export please").await.unwrap_err();
        assert!(matches!(err, AiError::ResponseFormat(_)));
        assert!(state.history().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let state = state_with(CannedProvider::failing("network down"));
        let err = call_ai(&state, "export").await.unwrap_err();
        assert_eq!(err.user_message(), "network down");
        assert!(state.history().is_empty());
    }
}
