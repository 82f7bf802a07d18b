//! Generation provider abstraction and implementations.
//!
//! Defines the [`GenerationProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]**: returns errors; used when no provider is configured.
//! - **[`GeminiProvider`]**: calls the Gemini `generateContent` API, optionally
//!   with the Google Search tool so answers come back with grounding metadata.
//!
//! # Provider Selection
//!
//! Use [`create_provider`] to instantiate the provider named by
//! `[provider].kind`:
//!
//! ```rust,no_run
//! # use intel_hub::config::ProviderConfig;
//! # use intel_hub::provider::create_provider;
//! let mut config = ProviderConfig::default();
//! config.kind = "disabled".to_string();
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.name(), "disabled");
//! ```
//!
//! # Failure Policy
//!
//! One request per call. Transport errors, timeouts and non-2xx statuses are
//! returned to the caller as-is; there is no retry or backoff.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::citation::GroundingEntry;
use crate::config::ProviderConfig;

/// What to ask the provider.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Let the model run web searches and return grounding metadata.
    pub web_search: bool,
    /// When set, ask for a JSON response conforming to this schema.
    pub response_schema: Option<serde_json::Value>,
}

/// The provider's answer: free text plus grounding side-channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub grounding: Vec<GroundingEntry>,
}

/// Trait for generation backends.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short identifier used in logs (e.g. the model name).
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

// ============ Disabled Provider ============

/// A provider that always fails. Used when `provider.kind = "disabled"`.
pub struct DisabledProvider;

#[async_trait]
impl GenerationProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation> {
        bail!("Generation provider is disabled")
    }
}

// ============ Gemini Provider ============

/// Provider backed by the Gemini REST API.
///
/// Calls `POST {base_url}/models/{model}:generateContent`. The API key is
/// read once, at construction, from the environment variable named by
/// `provider.api_key_env`.
pub struct GeminiProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or the HTTP client
    /// cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .with_context(|| format!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let body = build_gemini_body(request);

        tracing::debug!(model = %self.model, web_search = request.web_search, "calling Gemini");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_gemini_response(&json)
    }
}

/// Build the `generateContent` request body.
pub fn build_gemini_body(request: &GenerationRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "contents": [
            { "role": "user", "parts": [ { "text": request.prompt } ] }
        ],
    });

    if request.web_search {
        body["tools"] = serde_json::json!([{ "google_search": {} }]);
    }

    if let Some(schema) = &request.response_schema {
        body["generationConfig"] = serde_json::json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        });
    }

    body
}

/// Parse a `generateContent` response.
///
/// Concatenates the text parts of the first candidate and collects
/// `groundingMetadata.groundingChunks[].web` entries in order. Chunks
/// without a `web.uri` are dropped. A response with no candidates is an
/// error (typically a blocked prompt).
pub fn parse_gemini_response(json: &serde_json::Value) -> Result<Generation> {
    let candidate = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow::anyhow!("Invalid Gemini response: {}", reason)
        })?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    let grounding = candidate
        .pointer("/groundingMetadata/groundingChunks")
        .and_then(|g| g.as_array())
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| {
                    let web = chunk.get("web")?;
                    let uri = web.get("uri")?.as_str()?;
                    let title = web.get("title").and_then(|t| t.as_str());
                    Some(GroundingEntry::new(uri, title))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Generation { text, grounding })
}

// ============ Unavailable Provider ============

/// Stands in for a provider that could not be constructed (e.g. missing API
/// key), so that commands not needing generation still work. Every call
/// fails with the original reason.
pub struct UnavailableProvider {
    reason: String,
}

#[async_trait]
impl GenerationProvider for UnavailableProvider {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation> {
        bail!("Generation provider unavailable: {}", self.reason)
    }
}

/// Create the [`GenerationProvider`] named by the configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"gemini"` | [`GeminiProvider`] |
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.kind.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "gemini" => Ok(Box::new(GeminiProvider::new(config)?)),
        other => bail!("Unknown provider kind: {}", other),
    }
}

/// Like [`create_provider`], but construction errors are deferred to the
/// first [`generate`](GenerationProvider::generate) call.
pub fn create_provider_deferred(config: &ProviderConfig) -> Box<dyn GenerationProvider> {
    create_provider(config).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "generation provider unavailable");
        Box::new(UnavailableProvider {
            reason: format!("{e:#}"),
        })
    })
}
