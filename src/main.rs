use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use tour_guide::ai::{AiBackend, AiConfig, AiProvider, ProviderRequest, create_provider};
use tour_guide::config::GuideConfig;
use tour_guide::error::AiError;
use tour_guide::host::{DomEvent, MemoryHost, MessageKind, RecordingMessages, Router};
use tour_guide::presenter::HeadlessPresenter;
use tour_guide::registry::{AdvanceOn, FeatureSpec, StepSpec};
use tour_guide::{Guide, GuideBuilder};

/// Canned reply used when no API key is configured.
const SCRIPTED_REPLY: &str = r#"```json
{
  "message": "Exporting takes two stops: open the canvas, then share the file by email.",
  "steps": [
    {"id": "export", "title": "Export your drawing", "text": "Click Export to download a PNG.", "position": "bottom"},
    {"id": "share", "title": "Share it", "text": "Open the share dialog.", "position": "left"}
  ]
}
```"#;

/// Offline provider that always answers with `SCRIPTED_REPLY`.
struct ScriptedProvider;

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<String, AiError> {
        Ok(SCRIPTED_REPLY.to_string())
    }
}

/// Router for the in-memory page: switches the route and mounts what lives
/// there, the way a client-side router would re-render.
struct DemoRouter {
    host: Arc<MemoryHost>,
    pages: HashMap<&'static str, Vec<&'static str>>,
}

#[async_trait]
impl Router for DemoRouter {
    async fn navigate(&self, path: &str) {
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.host.set_route(path);
        for locator in self.pages.get(path).into_iter().flatten() {
            self.host.mount(*locator);
        }
    }
}

fn register_features(guide: &Guide) {
    let registry = guide.registry();
    registry.register_feature(
        FeatureSpec::new("export", "Export")
            .with_description("Download the canvas as a PNG")
            .with_selector("#export-btn")
            .with_route("/canvas"),
    );
    registry.register_feature(
        FeatureSpec::new("share", "Share")
            .with_description("Send the drawing to someone by email")
            .with_selector("#share-btn")
            .with_route("/canvas"),
    );
    registry.register_step("share", 0, None, StepSpec::at("#share-btn"));
    registry.register_step(
        "share",
        1,
        None,
        StepSpec::at("#share-email").with_advance_on(AdvanceOn::on("input")),
    );
    registry.register_step("share", 2, None, StepSpec::at("#share-send"));

    // Billing lives on another page and has already unmounted.
    registry.register_feature(
        FeatureSpec::new("billing", "Billing")
            .with_description("Plans and invoices")
            .with_selector("#billing")
            .with_route("/settings/billing"),
    );
    registry.unregister_feature("billing");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let app_name = std::env::var("TOUR_GUIDE_APP_NAME").unwrap_or_else(|_| "Sketchpad".to_string());
    let model =
        std::env::var("TOUR_GUIDE_MODEL").unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
    let provider: Arc<dyn AiProvider> = match std::env::var("ANTHROPIC_API_KEY") {
        Ok(key) => create_provider(&AiConfig::new(
            AiBackend::Anthropic,
            SecretString::from(key),
            model,
        ))?,
        Err(_) => Arc::new(ScriptedProvider),
    };

    let request = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let request = if request.trim().is_empty() {
        "How do I export my drawing and send it to a friend?".to_string()
    } else {
        request
    };

    eprintln!("🧭 Tour Guide v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   App: {}", app_name);
    eprintln!("   Provider: {}", provider.name());
    if provider.name() != "scripted" {
        eprintln!("   Model: {}", provider.model_name());
    }
    eprintln!("   Request: {}\n", request);

    let host = Arc::new(MemoryHost::new("/"));
    let router = Arc::new(DemoRouter {
        host: host.clone(),
        pages: HashMap::from([
            ("/canvas", vec!["#export-btn", "#share-btn", "#share-email", "#share-send"]),
            ("/settings/billing", vec!["#billing"]),
        ]),
    });
    let presenter = Arc::new(HeadlessPresenter::new());
    let messages = Arc::new(RecordingMessages::new());

    let mut config = GuideConfig::new(app_name);
    config.app_description = Some("a browser drawing app".to_string());

    let guide = GuideBuilder::new(config)
        .provider(provider)
        .host(host.clone())
        .presenter(presenter.clone())
        .messages(messages.clone())
        .router(router)
        .build()?;
    register_features(&guide);

    guide.open();
    guide.send(&request).await?;

    // Play the user: type into the email field when asked, otherwise click
    // Next.
    while guide.is_active() {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let waiting_on_input = presenter
            .last_tour()
            .and_then(|tour| tour.shown().last().cloned())
            .is_some_and(|step| step.attached_to.as_deref() == Some("#share-email"));
        if waiting_on_input {
            host.dispatch(DomEvent::new("input", "#share-email"));
            tokio::time::sleep(Duration::from_millis(400)).await;
        } else {
            guide.step_complete().await;
        }
    }
    guide.close();

    eprintln!();
    for message in messages.messages() {
        let tag = match message.kind {
            MessageKind::User => "you",
            MessageKind::Ai => "guide",
            MessageKind::Error => "error",
            MessageKind::Status => "status",
            MessageKind::Resume => "resume",
        };
        eprintln!("[{tag}] {}", message.text);
    }
    if let Some(tour) = presenter.last_tour() {
        eprintln!();
        for step in tour.shown() {
            eprintln!(
                "   {} {} → {}",
                step.progress.as_deref().unwrap_or("-"),
                step.title,
                step.attached_to.as_deref().unwrap_or("(unanchored)")
            );
        }
    }

    Ok(())
}
