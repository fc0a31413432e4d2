//! System prompt for tour requests.

use serde::Serialize;

use crate::config::GuideConfig;
use crate::registry::Feature;

/// Compact view of a feature for the prompt.
#[derive(Debug, Serialize)]
struct FeatureSummary<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    route: Option<&'a str>,
    screen: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    flow: Option<String>,
}

impl<'a> FeatureSummary<'a> {
    fn of(feature: &'a Feature) -> Self {
        let screen = feature
            .screen
            .as_ref()
            .map(|s| s.id.as_str())
            .or(feature.route.as_deref())
            .unwrap_or(feature.id.as_str());
        Self {
            id: &feature.id,
            name: &feature.name,
            description: feature.description.as_deref(),
            route: feature.route.as_deref(),
            screen,
            flow: (!feature.flow.is_empty())
                .then(|| format!("multi-step flow with {} steps", feature.flow.len())),
        }
    }
}

fn render_list(features: &[&Feature]) -> String {
    if features.is_empty() {
        return "(none)".to_string();
    }
    features
        .iter()
        .map(|f| {
            let summary = FeatureSummary::of(f);
            serde_json::to_string(&summary).unwrap_or_else(|_| format!("{{\"id\":\"{}\"}}", f.id))
        })
        .map(|line| format!("- {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the system prompt from the app config and the current features.
///
/// Pure: the same config and features always give the same prompt.
pub fn build_system_prompt(config: &GuideConfig, features: &[Feature]) -> String {
    let (live, ghosts): (Vec<&Feature>, Vec<&Feature>) = features.iter().partition(|f| f.is_live());

    let about = match config.app_description.as_deref() {
        Some(description) => format!("{} ({})", config.app_name, description),
        None => config.app_name.clone(),
    };

    format!(
        "\
You are the in-app guide for {about}. Users tell you what they want to do and you \
answer with a short message plus a step-by-step tour of the features that get them there.

FEATURES ON THE CURRENT PAGE:
{live}

FEATURES ON OTHER PAGES (the tour navigates there automatically):
{ghosts}

Respond with ONLY a JSON object, no other text:
{{\"message\": string, \"steps\": [{{\"id\": string, \"title\": string, \"text\": string, \"position\": \"top\" | \"bottom\" | \"left\" | \"right\" | \"auto\"}}]}}

Rules:
- Every step id MUST be the id of a feature listed above. Never invent ids or selectors.
- Order steps the way the user would actually perform them.
- For forms, put the submit or save action last.
- Features on other pages are answered as normal steps. Never tell the user to navigate \
manually; the tour takes them there.
- Features with a multi-step flow need only one step; the tour expands it.
- Keep titles under 6 words and text to 1-2 sentences.
- If nothing matches the request, return an empty steps array and use the message to \
suggest the 2-3 closest features by name. Never answer with a bare refusal.",
        live = render_list(&live),
        ghosts = render_list(&ghosts),
    )
}
