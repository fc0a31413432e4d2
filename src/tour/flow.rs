//! Flow expansion: one feature step becomes one step per flow entry.

use crate::registry::Feature;

use super::step::TourStep;

/// Expand `step` across `feature`'s flow.
///
/// Without a flow the step comes back alone. Otherwise the first entry keeps
/// the step's title and text, later entries get a `(n/total)` suffix and
/// generic text. Locators come only from the flow entries.
pub fn expand(step: &TourStep, feature: &Feature) -> Vec<TourStep> {
    if feature.flow.is_empty() {
        return vec![step.clone()];
    }

    let total = feature.flow.len();
    feature
        .flow
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (title, text) = if i == 0 {
                (step.title.clone(), step.text.clone())
            } else {
                (
                    format!("{} ({}/{})", step.title, i + 1, total),
                    follow_up_text(entry.advance_on.is_some()),
                )
            };
            TourStep {
                id: format!("{}-{}", step.id, i + 1),
                feature_id: step.feature_id.clone(),
                title,
                text,
                selector: entry.selector.clone(),
                position: step.position,
                route: step.route.clone(),
                wait_for: entry.wait_for.clone(),
                advance_on: entry.advance_on.clone(),
                screen: step.screen.clone(),
                flow_index: Some(i),
                parent_id: Some(step.id.clone()),
            }
        })
        .collect()
}

fn follow_up_text(advances_itself: bool) -> String {
    if advances_itself {
        "Complete this action to continue.".to_string()
    } else {
        "Continue here, then click Next when you're done.".to_string()
    }
}
