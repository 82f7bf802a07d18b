//! Instruction text sent to the generation provider.

use chrono::NaiveDate;

use crate::models::Source;

/// Target used for a source that does not name one.
pub const DEFAULT_TARGET: &str = "latest industry news";

/// Everything the report instruction embeds.
#[derive(Debug, Clone)]
pub struct ReportPrompt<'a> {
    pub today: NaiveDate,
    pub threshold: NaiveDate,
    pub sources: &'a [&'a Source],
    pub keywords: &'a [String],
    pub language: &'a str,
}

/// One numbered line per source: `Source [n]: name (url), target: ...`.
pub fn source_lines(sources: &[&Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let target = if s.target.trim().is_empty() {
                DEFAULT_TARGET
            } else {
                s.target.trim()
            };
            format!("Source [{}]: {} ({}), target: {}", i + 1, s.name, s.url, target)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl ReportPrompt<'_> {
    pub fn render(&self) -> String {
        let keywords = if self.keywords.is_empty() {
            "(no focus keywords; cover the most significant developments)".to_string()
        } else {
            self.keywords.join(", ")
        };

        format!(
            "Today is {today}. Act as a senior industry analyst running an intelligence sweep.

## Retrieval
Use the Google Search tool to research each of the following sources one by one, in depth:
{sources}

## Filtering
1. Time window: keep only material published on or after {threshold}.
2. Focus: concentrate on content related to {keywords}.

## Report outline
1. # Industry Intelligence Report
2. ## Executive Summary
3. ## Findings by Source (cover every source above individually)
4. ## Key Insights and Outlook
5. ## Recommended Actions

## Citation rules
- Every concrete figure, news item or development must be followed immediately by its Markdown link, formatted as [title](https://...).
- Every URL must be absolute and start with http:// or https:// so that it can be opened directly.
- Cite only links you actually used; each one will be collected into the report's reference list.

Write the report in {language}.",
            today = self.today.format("%Y-%m-%d"),
            sources = source_lines(self.sources),
            threshold = self.threshold.format("%Y-%m-%d"),
            keywords = keywords,
            language = self.language,
        )
    }
}

/// Instruction asking for five focus keywords for the given `name: target`
/// context lines.
pub fn suggest_prompt(context: &str, language: &str) -> String {
    format!(
        "Based on the following information sources and their targets, suggest 5 relevant \
high-level industry focus areas or keywords that the user should track.

Sources:
{context}

Return the result as a JSON array of strings in {language}."
    )
}
