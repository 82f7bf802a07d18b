//! Report assembly: one provider call, citation reconciliation, packaging.

use chrono::{DateTime, Days, NaiveDate, Utc};
use thiserror::Error;

use crate::citation;
use crate::models::{IntelConfig, Report};
use crate::prompt::ReportPrompt;
use crate::provider::{GenerationProvider, GenerationRequest};

#[derive(Debug, Error)]
pub enum ReportError {
    /// The provider call failed; nothing was produced.
    #[error("generation failed: {0:#}")]
    GenerationFailed(anyhow::Error),
}

/// Generate a report for `config` as of `now`.
///
/// The time window starts `lookback_days` calendar days before `now`'s
/// date, clamped to the earliest representable date. Only enabled sources and keywords are used. The report id is a
/// fresh UUID and the timestamp is `now` in RFC 3339.
pub async fn assemble(
    config: &IntelConfig,
    provider: &dyn GenerationProvider,
    language: &str,
    now: DateTime<Utc>,
) -> Result<Report, ReportError> {
    let keywords = config.active_keywords();
    let sources = config.active_sources();

    let today = now.date_naive();
    let threshold = today
        .checked_sub_days(Days::new(u64::from(config.lookback_days)))
        .unwrap_or(NaiveDate::MIN);

    let prompt = ReportPrompt {
        today,
        threshold,
        sources: &sources,
        keywords: &keywords,
        language,
    }
    .render();

    tracing::info!(
        config = %config.name,
        sources = sources.len(),
        keywords = keywords.len(),
        since = %threshold,
        provider = provider.name(),
        "generating report"
    );

    let request = GenerationRequest {
        prompt,
        web_search: true,
        response_schema: None,
    };
    let generation = provider
        .generate(&request)
        .await
        .map_err(ReportError::GenerationFailed)?;

    let sources = citation::reconcile(&generation.grounding, &generation.text);
    tracing::info!(citations = sources.len(), "report generated");

    Ok(Report {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: now.to_rfc3339(),
        summary: generation.text,
        sources,
        areas_covered: keywords,
        config_id: config.id.clone(),
        config_name: config.name.clone(),
    })
}
