//! Focus-area suggestion from a configuration's sources.

use std::collections::HashSet;

use serde_json::json;

use crate::models::{Keyword, Source};
use crate::prompt;
use crate::provider::{GenerationProvider, GenerationRequest};

/// `name: target` lines for sources that have a name or a target.
pub fn source_context(sources: &[Source]) -> String {
    sources
        .iter()
        .filter(|s| !s.name.trim().is_empty() || !s.target.trim().is_empty())
        .map(|s| format!("{}: {}", s.name.trim(), s.target.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Ask the provider for five focus keywords.
///
/// Returns an empty list without calling the provider when no source has a
/// name or target. Provider errors and malformed answers are logged and also
/// yield an empty list.
pub async fn suggest_focus_areas(
    sources: &[Source],
    provider: &dyn GenerationProvider,
    language: &str,
) -> Vec<String> {
    let context = source_context(sources);
    if context.is_empty() {
        return Vec::new();
    }

    let request = GenerationRequest {
        prompt: prompt::suggest_prompt(&context, language),
        web_search: false,
        response_schema: Some(json!({ "type": "ARRAY", "items": { "type": "STRING" } })),
    };

    let generation = match provider.generate(&request).await {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "focus-area suggestion failed");
            return Vec::new();
        }
    };

    let text = generation.text.trim();
    let text = if text.is_empty() { "[]" } else { text };
    match serde_json::from_str::<Vec<String>>(text) {
        Ok(keywords) => keywords
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        Err(e) => {
            tracing::warn!(error = %e, "focus-area suggestion was not a JSON string array");
            Vec::new()
        }
    }
}

/// Append suggestions not already present (case-insensitive) as new enabled
/// keywords. Returns how many were added.
pub fn merge_keywords(areas: &mut Vec<Keyword>, suggestions: &[String]) -> usize {
    let mut existing: HashSet<String> = areas.iter().map(|a| a.keyword.to_lowercase()).collect();
    let mut added = 0;
    for keyword in suggestions {
        if existing.insert(keyword.to_lowercase()) {
            areas.push(Keyword {
                id: uuid::Uuid::new_v4().to_string(),
                keyword: keyword.clone(),
                enabled: true,
            });
            added += 1;
        }
    }
    added
}
