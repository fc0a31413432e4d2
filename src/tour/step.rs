//! Runtime tour steps and the merge with live registry data.

use tracing::warn;

use crate::ai::{AiStep, Position};
use crate::registry::{AdvanceOn, Feature, Screen};

/// A schedulable step: an AI step merged with its feature, possibly one
/// entry of an expanded flow.
#[derive(Debug, Clone)]
pub struct TourStep {
    pub id: String,
    /// Feature this step points at.
    pub feature_id: String,
    pub title: String,
    pub text: String,
    pub selector: Option<String>,
    pub position: Option<Position>,
    pub route: Option<String>,
    pub wait_for: Option<String>,
    pub advance_on: Option<AdvanceOn>,
    pub screen: Option<Screen>,
    /// Position in the feature's flow, for expanded steps.
    pub flow_index: Option<usize>,
    /// AI step id this was expanded from.
    pub parent_id: Option<String>,
}

impl From<AiStep> for TourStep {
    fn from(step: AiStep) -> Self {
        Self {
            feature_id: step.id.clone(),
            id: step.id,
            title: step.title,
            text: step.text,
            selector: step.selector,
            position: step.position,
            route: None,
            wait_for: None,
            advance_on: None,
            screen: None,
            flow_index: None,
            parent_id: None,
        }
    }
}

impl TourStep {
    /// Whether this step still has to resolve a legacy screen: it has no
    /// route and its screen says it is not showing.
    pub fn needs_screen(&self) -> bool {
        self.route.is_none() && self.screen.as_ref().is_some_and(|s| !s.check())
    }
}

/// Overwrite the step's locator data with the feature's current registry
/// values. Steps for unknown features keep their text but lose every
/// locator, so they show unanchored.
pub fn merge_step(mut step: TourStep, features: &[Feature]) -> TourStep {
    let Some(feature) = features.iter().find(|f| f.id == step.feature_id) else {
        warn!(feature = %step.feature_id, "Tour step references an unknown feature");
        step.selector = None;
        step.wait_for = None;
        step.advance_on = None;
        return step;
    };

    step.route = feature.route.clone();
    step.screen = feature.screen.clone();

    match step.flow_index {
        Some(index) => {
            let entry = feature.flow.get(index);
            step.selector = entry.and_then(|e| e.selector.clone());
            step.wait_for = entry.and_then(|e| e.wait_for.clone());
            step.advance_on = entry.and_then(|e| e.advance_on.clone());
        }
        None => {
            step.selector = feature.selector.clone();
            step.wait_for = feature.wait_for.clone();
            step.advance_on = feature.advance_on.clone();
        }
    }
    step
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FlowStep;

    fn ai_step(id: &str) -> TourStep {
        let mut step = AiStep::new(id, "Click export", "Click the button to export.");
        step.selector = Some("#imagined".to_string());
        step.position = Some(Position::Bottom);
        step.into()
    }

    #[test]
    fn registry_selector_wins() {
        let features = vec![
            Feature::new("export", "Export")
                .with_selector("#export-btn")
                .with_route("/canvas"),
        ];
        let merged = merge_step(ai_step("export"), &features);
        assert_eq!(merged.selector.as_deref(), Some("#export-btn"));
        assert_eq!(merged.route.as_deref(), Some("/canvas"));
        assert_eq!(merged.position, Some(Position::Bottom));
        assert_eq!(merged.title, "Click export");
    }

    #[test]
    fn ghost_feature_clears_ai_selector() {
        let mut ghost = Feature::new("export", "Export").with_route("/canvas");
        ghost.ghost = true;
        let merged = merge_step(ai_step("export"), &[ghost]);
        assert_eq!(merged.selector, None);
    }

    #[test]
    fn unknown_feature_drops_ai_locators() {
        let mut step = ai_step("missing");
        step.wait_for = Some("#imagined-panel".to_string());
        step.advance_on = Some(AdvanceOn::on("click"));
        let merged = merge_step(step, &[]);
        assert_eq!(merged.selector, None);
        assert_eq!(merged.wait_for, None);
        assert!(merged.advance_on.is_none());
        assert_eq!(merged.route, None);
        assert_eq!(merged.text, "Click the button to export.");
    }

    #[test]
    fn flow_steps_merge_against_their_entry() {
        let features = vec![
            Feature::new("form", "Form")
                .with_selector("#form")
                .with_flow(vec![FlowStep::at(0, ".a"), FlowStep::at(1, ".b")]),
        ];
        let mut step = ai_step("form");
        step.flow_index = Some(1);
        let merged = merge_step(step, &features);
        assert_eq!(merged.selector.as_deref(), Some(".b"));
    }

    #[test]
    fn needs_screen_only_without_route() {
        let mut step = ai_step("x");
        step.screen = Some(Screen::fixed("x", false));
        assert!(step.needs_screen());
        step.route = Some("/x".to_string());
        assert!(!step.needs_screen());
        step.route = None;
        step.screen = Some(Screen::fixed("x", true));
        assert!(!step.needs_screen());
    }
}
