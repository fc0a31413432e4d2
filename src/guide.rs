//! Programmatic control surface.
//!
//! `GuideBuilder` is the composition root: it wires the shared state, the
//! navigator and the tour runner around the host's collaborators. `Guide`
//! is what the host application holds on to.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ai::{self, AiProvider, AiReply, AiStep};
use crate::config::{ConfigUpdate, GuideConfig, TourOptions};
use crate::error::{ConfigError, Error, Result};
use crate::host::{Host, MessageKind, MessageSink, Router};
use crate::navigation::Navigator;
use crate::presenter::Presenter;
use crate::registry::FeatureRegistry;
use crate::state::{Cleanup, GuideState, TourPhase};
use crate::tour::{TourRunner, TourStep};

fn missing(key: &str, hint: &str) -> ConfigError {
    ConfigError::MissingRequired {
        key: key.to_string(),
        hint: hint.to_string(),
    }
}

/// Builder for `Guide`.
pub struct GuideBuilder {
    config: GuideConfig,
    provider: Option<Arc<dyn AiProvider>>,
    registry: Option<Arc<FeatureRegistry>>,
    host: Option<Arc<dyn Host>>,
    presenter: Option<Arc<dyn Presenter>>,
    messages: Option<Arc<dyn MessageSink>>,
    router: Option<Arc<dyn Router>>,
}

impl GuideBuilder {
    pub fn new(config: GuideConfig) -> Self {
        Self {
            config,
            provider: None,
            registry: None,
            host: None,
            presenter: None,
            messages: None,
            router: None,
        }
    }

    pub fn provider(mut self, provider: Arc<dyn AiProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Share a registry the UI bindings already write to. A fresh one is
    /// created otherwise.
    pub fn registry(mut self, registry: Arc<FeatureRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }

    pub fn messages(mut self, messages: Arc<dyn MessageSink>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Client-side router. Without one, navigation falls back to a history
    /// push on the host.
    pub fn router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    /// Validate and wire everything up. Fails fast on missing pieces.
    ///
    /// The feature list is always present: it is the registry overlaid with
    /// `config.features`. It may start empty, since UI bindings usually
    /// register after the guide is built.
    pub fn build(self) -> std::result::Result<Guide, ConfigError> {
        let provider = self
            .provider
            .ok_or_else(|| missing("provider", "Pass an AiProvider to GuideBuilder::provider."))?;
        let host = self
            .host
            .ok_or_else(|| missing("host", "Pass the page Host to GuideBuilder::host."))?;
        let presenter = self.presenter.ok_or_else(|| {
            missing("presenter", "Pass a Presenter to GuideBuilder::presenter.")
        })?;
        let messages = self.messages.ok_or_else(|| {
            missing("messages", "Pass the chat MessageSink to GuideBuilder::messages.")
        })?;
        self.config.validate()?;

        let registry = self.registry.unwrap_or_else(|| Arc::new(FeatureRegistry::new()));
        if registry.is_empty() && self.config.features.is_empty() {
            debug!("Guide built with no features yet; waiting on registrations");
        }
        let app_name = self.config.app_name.clone();
        let state = Arc::new(GuideState::new(self.config, provider, registry, self.router));
        let navigator = Arc::new(Navigator::new(state.clone(), host.clone(), messages.clone()));
        let runner = Arc::new(TourRunner::new(
            state.clone(),
            navigator.clone(),
            presenter,
            host,
            messages.clone(),
        ));

        info!(app = %app_name, "Guide initialized");
        Ok(Guide {
            state,
            navigator,
            runner,
            messages,
        })
    }
}

/// The tour guide.
pub struct Guide {
    state: Arc<GuideState>,
    navigator: Arc<Navigator>,
    runner: Arc<TourRunner>,
    messages: Arc<dyn MessageSink>,
}

impl Guide {
    pub fn builder(config: GuideConfig) -> GuideBuilder {
        GuideBuilder::new(config)
    }

    pub fn registry(&self) -> &Arc<FeatureRegistry> {
        self.state.registry()
    }

    pub fn state(&self) -> &Arc<GuideState> {
        &self.state
    }

    pub fn navigator(&self) -> &Arc<Navigator> {
        &self.navigator
    }

    // ── Panel ──────────────────────────────────────────────────────────

    pub fn open(&self) {
        self.state.set_panel_open(true);
        self.messages.set_panel_open(true);
    }

    pub fn close(&self) {
        self.state.set_panel_open(false);
        self.messages.set_panel_open(false);
    }

    pub fn is_open(&self) -> bool {
        self.state.is_panel_open()
    }

    // ── Conversation ───────────────────────────────────────────────────

    /// One AI round-trip without touching the panel or the tour.
    pub async fn call_ai(&self, text: &str) -> Result<AiReply> {
        Ok(ai::call_ai(&self.state, text).await?)
    }

    /// Chat turn: show the user's text, ask the AI, show its answer, then
    /// announce the travel plan and run the tour.
    ///
    /// Failures are shown in the panel as well as returned.
    pub async fn send(&self, text: &str) -> Result<AiReply> {
        let text = text.trim();
        self.messages.add_message(MessageKind::User, text);

        let reply = match self.call_ai(text).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Chat turn failed");
                self.messages.add_message(MessageKind::Error, &e.user_message());
                return Err(e);
            }
        };
        self.messages.add_message(MessageKind::Ai, &reply.message);

        if !reply.steps.is_empty() {
            let plan = self.navigator.preview_routes_needed(&reply.steps);
            self.navigator.announce_navigation_plan(&plan);
            if let Err(e) = self.run_tour(reply.steps.clone(), None).await {
                self.messages.add_message(MessageKind::Error, &e.user_message());
                return Err(e);
            }
        }
        Ok(reply)
    }

    // ── Tour control ───────────────────────────────────────────────────

    /// Run a tour over AI-shaped steps, replacing any running tour.
    pub async fn run_tour(&self, steps: Vec<AiStep>, options: Option<TourOptions>) -> Result<()> {
        let steps: Vec<TourStep> = steps.into_iter().map(TourStep::from).collect();
        self.runner.start(steps, options).await
    }

    /// Hard stop. Drops any paused tour; no resume is offered.
    pub fn cancel_tour(&self) {
        self.runner.cancel();
    }

    /// Resume the paused tour. False when nothing is paused.
    pub async fn resume_tour(&self) -> Result<bool> {
        self.runner.resume().await
    }

    /// Advance the running tour. No-op when none is running.
    pub async fn step_complete(&self) -> bool {
        self.runner.step_complete().await
    }

    /// Annotate the current step with `message`, or clear it with `None`.
    pub fn step_fail(&self, message: Option<&str>) -> bool {
        self.runner.step_fail(message)
    }

    pub fn is_active(&self) -> bool {
        self.state.phase() == TourPhase::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state.phase() == TourPhase::Paused
    }

    pub fn phase(&self) -> TourPhase {
        self.state.phase()
    }

    /// Merge `update` into the live config.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        let mut candidate = self.state.config();
        candidate.apply(ConfigUpdate {
            app_name: update.app_name.clone(),
            navigation: update.navigation.clone(),
            ..Default::default()
        });
        candidate.validate().map_err(Error::from)?;
        self.state.update_config(update);
        Ok(())
    }

    /// Attach a teardown callback to the current tour. Runs when the tour
    /// completes, pauses, is cancelled or is replaced.
    pub fn add_cleanup(&self, cleanup: Cleanup) {
        self.state.add_cleanup(cleanup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ProviderRequest;
    use crate::error::AiError;
    use crate::host::{MemoryHost, RecordingMessages};
    use crate::presenter::HeadlessPresenter;
    use crate::registry::FeatureSpec;
    use async_trait::async_trait;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl AiProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: ProviderRequest) -> std::result::Result<String, AiError> {
            Ok(self.0.to_string())
        }
    }

    fn build(reply: &'static str) -> (Guide, Arc<RecordingMessages>, Arc<HeadlessPresenter>) {
        let host = Arc::new(MemoryHost::new("/"));
        host.mount("#export-btn");
        let messages = Arc::new(RecordingMessages::new());
        let presenter = Arc::new(HeadlessPresenter::new());
        let guide = Guide::builder(GuideConfig::new("Canvas"))
            .provider(Arc::new(FixedProvider(reply)))
            .host(host)
            .presenter(presenter.clone())
            .messages(messages.clone())
            .build()
            .unwrap();
        guide
            .registry()
            .register_feature(FeatureSpec::new("export", "Export").with_selector("#export-btn"));
        (guide, messages, presenter)
    }

    #[test]
    fn build_requires_provider() {
        let err = Guide::builder(GuideConfig::new("Canvas"))
            .host(Arc::new(MemoryHost::new("/")))
            .presenter(Arc::new(HeadlessPresenter::new()))
            .messages(Arc::new(RecordingMessages::new()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "provider"));
    }

    #[test]
    fn build_requires_app_name() {
        let err = Guide::builder(GuideConfig::default())
            .provider(Arc::new(FixedProvider("")))
            .host(Arc::new(MemoryHost::new("/")))
            .presenter(Arc::new(HeadlessPresenter::new()))
            .messages(Arc::new(RecordingMessages::new()))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::MissingRequired { ref key, .. } if key == "app_name"));
    }

    #[test]
    fn build_accepts_an_empty_feature_list() {
        let guide = Guide::builder(GuideConfig::new("Canvas"))
            .provider(Arc::new(FixedProvider("")))
            .host(Arc::new(MemoryHost::new("/")))
            .presenter(Arc::new(HeadlessPresenter::new()))
            .messages(Arc::new(RecordingMessages::new()))
            .build()
            .unwrap();
        assert!(guide.state().features().is_empty());

        guide
            .registry()
            .register_feature(FeatureSpec::new("export", "Export").with_selector("#export-btn"));
        let prompt =
            crate::prompt::build_system_prompt(&guide.state().config(), &guide.state().features());
        assert!(prompt.contains("\"export\""));
    }

    #[test]
    fn open_and_close_reach_the_panel() {
        let (guide, messages, _) = build("{}");
        guide.open();
        assert!(guide.is_open() && messages.is_open());
        guide.close();
        assert!(!guide.is_open() && !messages.is_open());
    }

    #[tokio::test]
    async fn send_shows_reply_and_runs_tour() {
        let (guide, messages, presenter) = build(
            r#"{"message": "Here is how", "steps": [{"id": "export", "title": "Export", "text": "Click it"}]}"#,
        );
        let reply = guide.send("  how do I export?  ").await.unwrap();
        assert_eq!(reply.steps.len(), 1);
        assert_eq!(messages.texts(MessageKind::User), vec!["how do I export?"]);
        assert_eq!(messages.texts(MessageKind::Ai), vec!["Here is how"]);
        assert!(guide.is_active());
        let tour = presenter.last_tour().unwrap();
        assert_eq!(tour.shown()[0].attached_to.as_deref(), Some("#export-btn"));
    }

    #[tokio::test]
    async fn send_surfaces_format_errors() {
        let (guide, messages, presenter) = build("I cannot help with that");
        assert!(guide.send("export").await.is_err());
        assert_eq!(
            messages.texts(MessageKind::Error),
            vec![crate::error::UNREADABLE_RESPONSE]
        );
        assert!(guide.state().history().is_empty());
        assert!(presenter.tours().is_empty());
    }

    #[test]
    fn update_config_rejects_blank_app_name() {
        let (guide, _, _) = build("{}");
        let result = guide.update_config(ConfigUpdate {
            app_name: Some("  ".to_string()),
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(guide.state().config().app_name, "Canvas");

        guide
            .update_config(ConfigUpdate {
                app_description: Some("Drawing app".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            guide.state().config().app_description.as_deref(),
            Some("Drawing app")
        );
    }
}
