//! Citation reconciliation.
//!
//! A generated report carries link evidence in two places: the provider's
//! grounding metadata (structured, but often with missing titles) and the
//! Markdown links the model wrote into the body. [`reconcile`] merges both
//! into one list keyed by URL.
//!
//! # Policy
//!
//! | Evidence | URL unseen | URL seen, placeholder title | URL seen, real title |
//! |----------|------------|-----------------------------|----------------------|
//! | grounding | insert (title or placeholder) | ignored | ignored |
//! | inline link | insert (label) | title := label | ignored |
//!
//! Output order is insertion order: grounding URLs first, in their original
//! order, then URLs found only in the body, in order of first occurrence.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::Citation;

/// Title given to a citation when no real title is known yet.
pub const PLACEHOLDER_TITLE: &str = "参考资料";

/// One piece of grounding evidence from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingEntry {
    pub url: String,
    pub title: Option<String>,
}

impl GroundingEntry {
    pub fn new(url: impl Into<String>, title: Option<&str>) -> Self {
        Self {
            url: url.into(),
            title: title.map(str::to_string),
        }
    }
}

/// A `[label](url)` occurrence in Markdown text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineLink {
    pub label: String,
    pub url: String,
}

fn link_regex() -> &'static Regex {
    static LINK: OnceLock<Regex> = OnceLock::new();
    LINK.get_or_init(|| {
        Regex::new(r"\[([^\]]+)\]\((https?://[^\s)]+)\)").expect("inline link pattern is valid")
    })
}

/// Returns every inline Markdown link with an absolute http(s) URL, left to
/// right. Labels and URLs are trimmed.
pub fn extract_inline_links(text: &str) -> Vec<InlineLink> {
    link_regex()
        .captures_iter(text)
        .map(|caps| InlineLink {
            label: caps[1].trim().to_string(),
            url: caps[2].trim().to_string(),
        })
        .collect()
}

/// Insertion-ordered URL → citation map.
#[derive(Debug, Default)]
struct CitationSet {
    entries: Vec<Citation>,
    index: HashMap<String, usize>,
}

impl CitationSet {
    fn get_mut(&mut self, url: &str) -> Option<&mut Citation> {
        let idx = *self.index.get(url)?;
        self.entries.get_mut(idx)
    }

    fn insert(&mut self, url: String, title: String) {
        self.index.insert(url.clone(), self.entries.len());
        self.entries.push(Citation { title, url });
    }

    fn into_vec(self) -> Vec<Citation> {
        self.entries
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// Merge grounding evidence and inline links into a de-duplicated,
/// best-titled citation list. Pure and deterministic.
///
/// Grounding entries with an empty URL are skipped. A missing or blank
/// title (grounding) or blank label (inline) counts as "no title": a new URL
/// from a blank label such as `[ ](https://u)` gets [`PLACEHOLDER_TITLE`]
/// rather than the empty string, and a blank label never replaces an
/// existing placeholder.
pub fn reconcile(grounding: &[GroundingEntry], report_text: &str) -> Vec<Citation> {
    let mut set = CitationSet::default();

    for entry in grounding {
        let Some(url) = non_blank(&entry.url) else {
            continue;
        };
        if set.get_mut(url).is_some() {
            continue;
        }
        let title = entry
            .title
            .as_deref()
            .and_then(non_blank)
            .unwrap_or(PLACEHOLDER_TITLE);
        set.insert(url.to_string(), title.to_string());
    }

    for link in extract_inline_links(report_text) {
        let label = non_blank(&link.label);
        match set.get_mut(&link.url) {
            Some(existing) => {
                if existing.title == PLACEHOLDER_TITLE {
                    if let Some(label) = label {
                        existing.title = label.to_string();
                    }
                }
            }
            None => {
                let title = label.unwrap_or(PLACEHOLDER_TITLE).to_string();
                set.insert(link.url, title);
            }
        }
    }

    set.into_vec()
}
