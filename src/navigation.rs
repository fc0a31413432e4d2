//! Cross-page navigation: routing, convergence waits, and the tour's travel
//! plan.
//!
//! Every wait here is best-effort. A route that never converges or an
//! element that never appears is logged and the tour carries on.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::AiStep;
use crate::host::{Host, MessageKind, MessageSink};
use crate::state::GuideState;
use crate::tour::TourStep;

/// One page the tour will visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteStop {
    pub route: String,
    pub feature_name: String,
}

impl RouteStop {
    pub fn new(route: impl Into<String>, feature_name: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            feature_name: feature_name.into(),
        }
    }
}

/// Poll `predicate` every `interval` until it holds or `timeout` passes.
/// Resolves true on success, false on timeout; never fails.
pub async fn await_condition<F>(predicate: F, interval: Duration, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let poll = async {
        loop {
            if predicate() {
                return;
            }
            tokio::time::sleep(interval).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.is_ok()
}

/// Human-readable announcement for a travel plan. `None` for an empty plan.
pub fn plan_message(plan: &[RouteStop]) -> Option<String> {
    match plan {
        [] => None,
        [stop] => Some(format!(
            "This tour will take you to {} ({}).",
            stop.feature_name, stop.route
        )),
        [init @ .., last] => {
            let names: Vec<&str> = init.iter().map(|s| s.feature_name.as_str()).collect();
            Some(format!(
                "This tour visits {} areas: {} and {}.",
                plan.len(),
                names.join(", "),
                last.feature_name
            ))
        }
    }
}

/// Drives the host between pages.
pub struct Navigator {
    state: Arc<GuideState>,
    host: Arc<dyn Host>,
    messages: Arc<dyn MessageSink>,
}

impl Navigator {
    pub fn new(
        state: Arc<GuideState>,
        host: Arc<dyn Host>,
        messages: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            state,
            host,
            messages,
        }
    }

    pub fn current_route(&self) -> String {
        self.host.current_route()
    }

    /// Go to `route` and wait for the page to settle.
    ///
    /// Returns whether the location converged. A no-op returning true when
    /// already there.
    pub async fn navigate_to_route(&self, route: &str, label: Option<&str>) -> bool {
        let current = self.current_route();
        if current == route {
            return true;
        }

        self.messages.add_message(
            MessageKind::Status,
            &format!("Taking you to {}…", label.unwrap_or(route)),
        );
        info!(from = %current, to = %route, "Navigating for tour step");

        match self.state.router() {
            Some(router) => router.navigate(route).await,
            None => {
                debug!(route, "No router injected, using history fallback");
                self.host.push_route(route);
            }
        }

        let nav = self.state.config().navigation;
        let host = self.host.clone();
        let arrived = await_condition(
            || host.current_route() == route,
            nav.poll_interval,
            nav.route_timeout,
        )
        .await;

        if arrived {
            tokio::time::sleep(nav.settle_delay).await;
        } else {
            warn!(
                route,
                timeout = ?nav.route_timeout,
                now = %self.current_route(),
                "Route did not converge, continuing tour"
            );
        }
        arrived
    }

    /// Wait for `locator` to be in the document. Returns whether it showed up.
    pub async fn wait_for_element(&self, locator: &str, timeout: Duration) -> bool {
        if self.host.has_element(locator) {
            return true;
        }
        let interval = self.state.config().navigation.poll_interval;
        let host = self.host.clone();
        let found = await_condition(|| host.has_element(locator), interval, timeout).await;
        if !found {
            warn!(locator, ?timeout, "Element did not appear, showing step anyway");
        }
        found
    }

    /// Pages the tour will visit, in step order, without repeats or the
    /// current page.
    pub fn preview_routes_needed(&self, steps: &[AiStep]) -> Vec<RouteStop> {
        let current = self.current_route();
        let features = self.state.features();
        let mut plan: Vec<RouteStop> = Vec::new();

        for step in steps {
            let Some(feature) = features.iter().find(|f| f.id == step.id) else {
                continue;
            };
            let Some(route) = feature.route.as_deref() else {
                continue;
            };
            if route == current || plan.iter().any(|stop| stop.route == route) {
                continue;
            }
            plan.push(RouteStop::new(route, &feature.name));
        }
        plan
    }

    /// Tell the user where the tour is going.
    pub fn announce_navigation_plan(&self, plan: &[RouteStop]) {
        if let Some(text) = plan_message(plan) {
            self.messages.add_message(MessageKind::Status, &text);
        }
    }

    /// Legacy screen resolution: navigate via the step's screen when it is
    /// not showing, then wait for its target.
    pub async fn ensure_on_correct_screen(&self, step: &TourStep) {
        let Some(screen) = step.screen.as_ref() else {
            return;
        };
        if screen.check() {
            return;
        }

        self.messages
            .add_message(MessageKind::Status, "Taking you to the right screen…");
        if !screen.navigate().await {
            debug!(screen = %screen.id, "Screen has no navigate hook");
        }

        let target = screen.wait_for.as_deref().or(step.selector.as_deref());
        if let Some(target) = target {
            let timeout = self.state.config().navigation.element_timeout;
            self.wait_for_element(target, timeout).await;
        }
    }
}
