//! Configuration types.

use std::time::Duration;

use crate::error::ConfigError;
use crate::registry::Feature;

/// Guide configuration, supplied at init and merged by `update_config`.
#[derive(Debug, Clone)]
pub struct GuideConfig {
    /// Name of the host application, used in the system prompt.
    pub app_name: String,
    /// Optional one-line description of the host application.
    pub app_description: Option<String>,
    /// Features passed at init. Live registry entries take precedence.
    pub features: Vec<Feature>,
    pub navigation: NavigationConfig,
    pub tour: TourOptions,
    pub labels: ButtonLabels,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            app_description: None,
            features: Vec::new(),
            navigation: NavigationConfig::default(),
            tour: TourOptions::default(),
            labels: ButtonLabels::default(),
        }
    }
}

impl GuideConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Check the fields init cannot do without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "app_name".to_string(),
                hint: "Set GuideConfig::app_name to the host application's name.".to_string(),
            });
        }
        if self.navigation.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "navigation.poll_interval".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Merge a partial update into this config.
    pub fn apply(&mut self, update: ConfigUpdate) {
        if let Some(name) = update.app_name {
            self.app_name = name;
        }
        if let Some(description) = update.app_description {
            self.app_description = Some(description);
        }
        if let Some(features) = update.features {
            self.features = features;
        }
        if let Some(navigation) = update.navigation {
            self.navigation = navigation;
        }
        if let Some(tour) = update.tour {
            self.tour = tour;
        }
        if let Some(labels) = update.labels {
            self.labels = labels;
        }
    }
}

/// Partial config for `Guide::update_config`. `None` leaves a field as is.
#[derive(Default)]
pub struct ConfigUpdate {
    pub app_name: Option<String>,
    pub app_description: Option<String>,
    pub features: Option<Vec<Feature>>,
    pub navigation: Option<NavigationConfig>,
    pub tour: Option<TourOptions>,
    pub labels: Option<ButtonLabels>,
    /// Replaces the injected router when set.
    pub router: Option<std::sync::Arc<dyn crate::host::Router>>,
}

/// Timing knobs for route and element convergence.
#[derive(Debug, Clone)]
pub struct NavigationConfig {
    /// How often the current route is polled after a navigation.
    pub poll_interval: Duration,
    /// Give up waiting for the route to match after this long.
    pub route_timeout: Duration,
    /// Pause after the route converges so the new page can mount.
    pub settle_delay: Duration,
    /// Give up waiting for a step's target element after this long.
    pub element_timeout: Duration,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            route_timeout: Duration::from_secs(8),
            settle_delay: Duration::from_millis(80),
            element_timeout: Duration::from_secs(5),
        }
    }
}

/// Per-tour display options.
#[derive(Debug, Clone)]
pub struct TourOptions {
    /// Show "{n} / {total}" on multi-step tours.
    pub show_progress: bool,
    /// Delay before an `advance_on` event moves the tour forward, when the
    /// feature does not set its own.
    pub advance_delay: Duration,
}

impl Default for TourOptions {
    fn default() -> Self {
        Self {
            show_progress: true,
            advance_delay: Duration::from_millis(300),
        }
    }
}

/// Button captions on every rendered step.
#[derive(Debug, Clone)]
pub struct ButtonLabels {
    pub back: String,
    pub next: String,
    pub done: String,
    pub pause: String,
}

impl Default for ButtonLabels {
    fn default() -> Self {
        Self {
            back: "Back".to_string(),
            next: "Next".to_string(),
            done: "Done".to_string(),
            pause: "Pause".to_string(),
        }
    }
}
