//! Feature and flow-step data models.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Auto-advance trigger: when `event` fires on (or inside) `selector`, the
/// tour moves on after `delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOn {
    /// Element to watch. Defaults to the step's own selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// DOM event name, e.g. "click" or "input".
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl AdvanceOn {
    pub fn on(event: impl Into<String>) -> Self {
        Self {
            selector: None,
            event: event.into(),
            delay_ms: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = Some(delay_ms);
        self
    }
}

/// What a UI binding registers for a mounted feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub wait_for: Option<String>,
    #[serde(default)]
    pub advance_on: Option<AdvanceOn>,
}

impl FeatureSpec {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_wait_for(mut self, wait_for: impl Into<String>) -> Self {
        self.wait_for = Some(wait_for.into());
        self
    }

    pub fn with_advance_on(mut self, advance_on: AdvanceOn) -> Self {
        self.advance_on = Some(advance_on);
        self
    }
}

/// What a UI binding registers for one sub-step of a feature's flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub wait_for: Option<String>,
    #[serde(default)]
    pub advance_on: Option<AdvanceOn>,
}

impl StepSpec {
    pub fn at(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn with_wait_for(mut self, wait_for: impl Into<String>) -> Self {
        self.wait_for = Some(wait_for.into());
        self
    }

    pub fn with_advance_on(mut self, advance_on: AdvanceOn) -> Self {
        self.advance_on = Some(advance_on);
        self
    }
}

/// One entry of a feature's flattened flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStep {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_on: Option<AdvanceOn>,
}

impl FlowStep {
    /// A top-level flow entry pointing at `selector`.
    pub fn at(index: usize, selector: impl Into<String>) -> Self {
        Self {
            index,
            parent_step: None,
            selector: Some(selector.into()),
            wait_for: None,
            advance_on: None,
        }
    }
}

pub type ScreenCheck = Arc<dyn Fn() -> bool + Send + Sync>;
pub type ScreenNavigate = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Legacy screen descriptor: knows whether its screen is showing and how to
/// get there.
#[derive(Clone)]
pub struct Screen {
    pub id: String,
    check: ScreenCheck,
    navigate: Option<ScreenNavigate>,
    pub wait_for: Option<String>,
}

impl Screen {
    pub fn new(id: impl Into<String>, check: ScreenCheck) -> Self {
        Self {
            id: id.into(),
            check,
            navigate: None,
            wait_for: None,
        }
    }

    /// A screen whose `check()` always answers `showing`.
    pub fn fixed(id: impl Into<String>, showing: bool) -> Self {
        Self::new(id, Arc::new(move || showing))
    }

    pub fn with_navigate(mut self, navigate: ScreenNavigate) -> Self {
        self.navigate = Some(navigate);
        self
    }

    pub fn with_wait_for(mut self, wait_for: impl Into<String>) -> Self {
        self.wait_for = Some(wait_for.into());
        self
    }

    pub fn check(&self) -> bool {
        (self.check)()
    }

    /// Run the screen's navigate hook. Returns false when it has none.
    pub async fn navigate(&self) -> bool {
        match &self.navigate {
            Some(navigate) => {
                navigate().await;
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("id", &self.id)
            .field("navigate", &self.navigate.is_some())
            .field("wait_for", &self.wait_for)
            .finish()
    }
}

/// A feature as the prompt builder and the tour runner see it.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// `None` for ghosts.
    pub selector: Option<String>,
    pub route: Option<String>,
    pub wait_for: Option<String>,
    pub advance_on: Option<AdvanceOn>,
    /// Flattened flow. Empty when the feature has none.
    pub flow: Vec<FlowStep>,
    pub screen: Option<Screen>,
    pub ghost: bool,
}

impl Feature {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            selector: None,
            route: None,
            wait_for: None,
            advance_on: None,
            flow: Vec::new(),
            screen: None,
            ghost: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    pub fn with_flow(mut self, flow: Vec<FlowStep>) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_screen(mut self, screen: Screen) -> Self {
        self.screen = Some(screen);
        self
    }

    pub fn with_advance_on(mut self, advance_on: AdvanceOn) -> Self {
        self.advance_on = Some(advance_on);
        self
    }

    pub fn is_live(&self) -> bool {
        !self.ghost
    }
}

/// Metadata kept for a feature whose UI target has unmounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostFeature {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub route: Option<String>,
}

/// A registry slot: either mounted or remembered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureEntry {
    Live(FeatureSpec),
    Ghost(GhostFeature),
}

impl FeatureEntry {
    /// Downgrade to a ghost, keeping the descriptive metadata.
    pub fn into_ghost(self) -> Self {
        match self {
            Self::Live(spec) => Self::Ghost(GhostFeature {
                id: spec.id,
                name: spec.name,
                description: spec.description,
                route: spec.route,
            }),
            ghost @ Self::Ghost(_) => ghost,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Map to the snapshot shape, attaching the flattened flow.
    pub fn to_feature(&self, flow: Vec<FlowStep>) -> Feature {
        match self {
            Self::Live(spec) => Feature {
                id: spec.id.clone(),
                name: spec.name.clone(),
                description: spec.description.clone(),
                selector: spec.selector.clone(),
                route: spec.route.clone(),
                wait_for: spec.wait_for.clone(),
                advance_on: spec.advance_on.clone(),
                flow,
                screen: Some(Screen::fixed(screen_id(&spec.id, spec.route.as_deref()), true)),
                ghost: false,
            },
            Self::Ghost(ghost) => Feature {
                id: ghost.id.clone(),
                name: ghost.name.clone(),
                description: ghost.description.clone(),
                selector: None,
                route: ghost.route.clone(),
                wait_for: None,
                advance_on: None,
                flow,
                screen: Some(Screen::fixed(screen_id(&ghost.id, ghost.route.as_deref()), false)),
                ghost: true,
            },
        }
    }
}

/// Registry-built screens are named after the route, or the feature when it
/// has none.
fn screen_id(feature_id: &str, route: Option<&str>) -> String {
    route.unwrap_or(feature_id).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghosting_keeps_metadata_and_drops_locators() {
        let entry = FeatureEntry::Live(
            FeatureSpec::new("export", "Export")
                .with_description("Download the canvas")
                .with_selector("#export-btn")
                .with_route("/canvas")
                .with_advance_on(AdvanceOn::on("click")),
        );
        let feature = entry.into_ghost().to_feature(Vec::new());
        assert!(feature.ghost);
        assert_eq!(feature.selector, None);
        assert_eq!(feature.advance_on, None);
        assert_eq!(feature.description.as_deref(), Some("Download the canvas"));
        assert_eq!(feature.route.as_deref(), Some("/canvas"));
    }

    #[test]
    fn screen_shim_reports_mount_state() {
        let live = FeatureEntry::Live(FeatureSpec::new("a", "A")).to_feature(Vec::new());
        let ghost = FeatureEntry::Live(FeatureSpec::new("a", "A"))
            .into_ghost()
            .to_feature(Vec::new());
        assert!(live.screen.as_ref().is_some_and(Screen::check));
        assert!(!ghost.screen.as_ref().is_some_and(Screen::check));
    }

    #[tokio::test]
    async fn screen_navigate_runs_hook() {
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = hits.clone();
        let screen = Screen::fixed("settings", false).with_navigate(Arc::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }) as BoxFuture<'static, ()>
        }));
        assert!(screen.navigate().await);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(!Screen::fixed("other", true).navigate().await);
    }

    #[test]
    fn advance_on_deserializes_without_optional_fields() {
        let parsed: AdvanceOn = serde_json::from_str(r#"{"event": "click"}"#).unwrap();
        assert_eq!(parsed, AdvanceOn::on("click"));
    }
}
