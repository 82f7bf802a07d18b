//! Operations over configuration sets and the report archive.
//!
//! [`Hub`] owns the injected collaborators (stores, generation provider,
//! webhook sender) and implements every user-facing operation on top of
//! them. Each mutating operation loads the affected collection, changes it
//! and saves it back whole.

use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use thiserror::Error;

use crate::config::Config;
use crate::import::{self, ImportError};
use crate::models::{IntelConfig, Keyword, Report, Source};
use crate::provider::{create_provider_deferred, GenerationProvider};
use crate::report::{self, ReportError};
use crate::store::sqlite::SqliteStore;
use crate::store::{ConfigStore, ReportArchive};
use crate::suggest;
use crate::webhook::{HttpWebhook, WebhookSender};

/// Id of the configuration used when nothing has been saved yet.
pub const DEFAULT_CONFIG_ID: &str = "default-set";

/// Longest accepted report window, in days.
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("configuration not found: {0}")]
    ConfigNotFound(String),
    #[error("report not found: {0}")]
    ReportNotFound(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("at least one configuration set must be kept")]
    LastConfig,
    #[error("configuration '{0}' has no webhook URL")]
    NoWebhook(String),
    #[error("webhook delivery to {0} failed")]
    DeliveryFailed(String),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type HubResult<T> = Result<T, HubError>;

/// Which list of a configuration an entry id refers to. Source and keyword
/// ids are only unique within their own list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Source,
    Keyword,
}

#[derive(Debug, Clone)]
pub struct Imported {
    pub added: Vec<Source>,
    pub suggested: usize,
}

/// Configuration used when the store is empty.
pub fn default_config() -> IntelConfig {
    let source = |id: &str, name: &str, url: &str, target: &str| Source {
        id: id.to_string(),
        name: name.to_string(),
        url: url.to_string(),
        target: target.to_string(),
        enabled: true,
    };
    let keyword = |id: &str, keyword: &str| Keyword {
        id: id.to_string(),
        keyword: keyword.to_string(),
        enabled: true,
    };
    IntelConfig {
        id: DEFAULT_CONFIG_ID.to_string(),
        name: "Default intel set".to_string(),
        sources: vec![
            source("1", "TechCrunch", "https://techcrunch.com", "AI and Startups"),
            source("2", "Reuters", "https://reuters.com", "Global Tech Policy"),
        ],
        areas: vec![
            keyword("1", "Artificial Intelligence (AI)"),
            keyword("2", "Large Language Models (LLM)"),
        ],
        lookback_days: 7,
        update_day: 1,
        update_time: "10:00".to_string(),
        webhook_url: None,
        auto_send: true,
    }
}

/// A blank configuration named after its position in the list.
pub fn new_config(existing: usize) -> IntelConfig {
    IntelConfig {
        id: uuid::Uuid::new_v4().to_string(),
        name: format!("New intel set {}", existing + 1),
        sources: Vec::new(),
        areas: Vec::new(),
        lookback_days: 7,
        update_day: 1,
        update_time: "09:00".to_string(),
        webhook_url: None,
        auto_send: false,
    }
}

/// Check the fields a save must satisfy. Returns the normalized config
/// (trimmed name, blank webhook removed).
pub fn validate_config(mut config: IntelConfig) -> HubResult<IntelConfig> {
    let invalid = |msg: String| -> HubResult<IntelConfig> { Err(HubError::InvalidConfig(msg)) };

    config.name = config.name.trim().to_string();
    if config.name.is_empty() {
        return invalid("name must not be empty".to_string());
    }
    if config.id.trim().is_empty() {
        return invalid("id must not be empty".to_string());
    }
    if config.lookback_days == 0 || config.lookback_days > MAX_LOOKBACK_DAYS {
        return invalid(format!(
            "lookbackDays must be 1..={}, got {}",
            MAX_LOOKBACK_DAYS, config.lookback_days
        ));
    }
    if config.update_day > 6 {
        return invalid(format!("updateDay must be 0..6, got {}", config.update_day));
    }
    let time_ok = config.update_time.len() == 5
        && NaiveTime::parse_from_str(&config.update_time, "%H:%M").is_ok();
    if !time_ok {
        return invalid(format!(
            "updateTime must be HH:MM, got '{}'",
            config.update_time
        ));
    }
    config.webhook_url = config.webhook().map(str::to_string);
    if let Some(url) = &config.webhook_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return invalid(format!("webhookUrl must be an http(s) URL, got '{}'", url));
        }
    }
    Ok(config)
}

pub struct Hub {
    configs: Arc<dyn ConfigStore>,
    archive: Arc<dyn ReportArchive>,
    provider: Arc<dyn GenerationProvider>,
    webhook: Arc<dyn WebhookSender>,
    language: String,
}

impl Hub {
    pub fn new(
        configs: Arc<dyn ConfigStore>,
        archive: Arc<dyn ReportArchive>,
        provider: Arc<dyn GenerationProvider>,
        webhook: Arc<dyn WebhookSender>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            configs,
            archive,
            provider,
            webhook,
            language: language.into(),
        }
    }

    /// Hub backed by the configured SQLite database, generation provider and
    /// HTTP webhook client.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteStore::open(config).await?);
        let provider: Arc<dyn GenerationProvider> =
            Arc::from(create_provider_deferred(&config.provider));
        let webhook = Arc::new(HttpWebhook::new(&config.webhook)?);
        Ok(Self::new(
            store.clone(),
            store,
            provider,
            webhook,
            config.report.language.clone(),
        ))
    }

    // ============ Configuration sets ============

    /// Persist the default configuration when the store is empty. Returns
    /// whether anything was written.
    pub async fn seed_defaults(&self) -> HubResult<bool> {
        if !self.configs.load().await?.is_empty() {
            return Ok(false);
        }
        let config = default_config();
        self.configs.save(std::slice::from_ref(&config)).await?;
        self.configs.set_active_id(&config.id).await?;
        Ok(true)
    }

    /// All configuration sets; the default set when none were saved.
    pub async fn configs(&self) -> HubResult<Vec<IntelConfig>> {
        let configs = self.configs.load().await?;
        if configs.is_empty() {
            return Ok(vec![default_config()]);
        }
        Ok(configs)
    }

    pub async fn config(&self, id: &str) -> HubResult<IntelConfig> {
        self.configs()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| HubError::ConfigNotFound(id.to_string()))
    }

    /// The selected configuration, or the first one if the stored selection
    /// no longer exists.
    pub async fn active_config(&self) -> HubResult<IntelConfig> {
        let configs = self.configs().await?;
        let active = self.configs.active_id().await?;
        let chosen = active
            .and_then(|id| configs.iter().find(|c| c.id == id).cloned())
            .or_else(|| configs.into_iter().next())
            .unwrap_or_else(default_config);
        Ok(chosen)
    }

    /// Resolve an optional id to a configuration, defaulting to the active one.
    pub async fn resolve_config(&self, id: Option<&str>) -> HubResult<IntelConfig> {
        match id {
            Some(id) => self.config(id).await,
            None => self.active_config().await,
        }
    }

    pub async fn select_config(&self, id: &str) -> HubResult<()> {
        self.config(id).await?;
        self.configs.set_active_id(id).await?;
        Ok(())
    }

    /// Validate and upsert by id, then select it.
    pub async fn save_config(&self, config: IntelConfig) -> HubResult<IntelConfig> {
        let config = self.upsert_config(config).await?;
        self.configs.set_active_id(&config.id).await?;
        Ok(config)
    }

    /// Validate and upsert by id without touching the selection.
    async fn upsert_config(&self, config: IntelConfig) -> HubResult<IntelConfig> {
        let config = validate_config(config)?;
        let mut configs = self.configs().await?;
        match configs.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => *existing = config.clone(),
            None => configs.push(config.clone()),
        }
        self.configs.save(&configs).await?;
        tracing::info!(id = %config.id, name = %config.name, "configuration saved");
        Ok(config)
    }

    pub async fn create_config(&self) -> HubResult<IntelConfig> {
        let count = self.configs().await?.len();
        self.save_config(new_config(count)).await
    }

    /// Delete a configuration set. The last remaining set cannot be deleted.
    pub async fn delete_config(&self, id: &str) -> HubResult<()> {
        let mut configs = self.configs().await?;
        if !configs.iter().any(|c| c.id == id) {
            return Err(HubError::ConfigNotFound(id.to_string()));
        }
        if configs.len() <= 1 {
            return Err(HubError::LastConfig);
        }
        configs.retain(|c| c.id != id);
        self.configs.save(&configs).await?;

        if self.configs.active_id().await?.as_deref() == Some(id) {
            self.configs.set_active_id(&configs[0].id).await?;
        }
        tracing::info!(id, "configuration deleted");
        Ok(())
    }

    /// Apply `edit` to the stored configuration `id` and save the result.
    /// The active selection is left as it was.
    pub async fn update_config<F>(&self, id: &str, edit: F) -> HubResult<IntelConfig>
    where
        F: FnOnce(&mut IntelConfig),
    {
        let mut config = self.config(id).await?;
        edit(&mut config);
        self.upsert_config(config).await
    }

    pub async fn export_configs(&self) -> HubResult<String> {
        let configs = self.configs().await?;
        Ok(serde_json::to_string_pretty(&configs).map_err(anyhow::Error::from)?)
    }

    // ============ Sources and keywords ============

    pub async fn add_source(
        &self,
        config_id: &str,
        name: &str,
        url: &str,
        target: &str,
    ) -> HubResult<Source> {
        let source = Source {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            url: url.trim().to_string(),
            target: target.trim().to_string(),
            enabled: true,
        };
        let added = source.clone();
        self.update_config(config_id, move |c| c.sources.push(source))
            .await?;
        Ok(added)
    }

    pub async fn add_keyword(&self, config_id: &str, keyword: &str) -> HubResult<Keyword> {
        let keyword = Keyword {
            id: uuid::Uuid::new_v4().to_string(),
            keyword: keyword.trim().to_string(),
            enabled: true,
        };
        let added = keyword.clone();
        self.update_config(config_id, move |c| c.areas.push(keyword))
            .await?;
        Ok(added)
    }

    /// Remove a source or keyword by id. Returns whether anything was removed.
    pub async fn remove_entry(
        &self,
        config_id: &str,
        kind: EntryKind,
        entry_id: &str,
    ) -> HubResult<bool> {
        let mut removed = false;
        self.update_config(config_id, |c| {
            removed = match kind {
                EntryKind::Source => {
                    let before = c.sources.len();
                    c.sources.retain(|s| s.id != entry_id);
                    c.sources.len() != before
                }
                EntryKind::Keyword => {
                    let before = c.areas.len();
                    c.areas.retain(|a| a.id != entry_id);
                    c.areas.len() != before
                }
            };
        })
        .await?;
        Ok(removed)
    }

    /// Flip the enabled flag of a source or keyword. Returns the new state,
    /// or `None` when no entry has that id.
    pub async fn toggle_entry(
        &self,
        config_id: &str,
        kind: EntryKind,
        entry_id: &str,
    ) -> HubResult<Option<bool>> {
        let mut state = None;
        self.update_config(config_id, |c| {
            state = match kind {
                EntryKind::Source => c.sources.iter_mut().find(|s| s.id == entry_id).map(|s| {
                    s.enabled = !s.enabled;
                    s.enabled
                }),
                EntryKind::Keyword => c.areas.iter_mut().find(|a| a.id == entry_id).map(|a| {
                    a.enabled = !a.enabled;
                    a.enabled
                }),
            };
        })
        .await?;
        Ok(state)
    }

    /// Ask the provider for focus keywords and merge new ones into the
    /// configuration. Returns the keywords that were added.
    pub async fn suggest_areas(&self, config_id: &str) -> HubResult<Vec<Keyword>> {
        let config = self.config(config_id).await?;
        let suggestions =
            suggest::suggest_focus_areas(&config.sources, self.provider.as_ref(), &self.language)
                .await;
        self.merge_suggestions(config, &suggestions).await
    }

    async fn merge_suggestions(
        &self,
        mut config: IntelConfig,
        suggestions: &[String],
    ) -> HubResult<Vec<Keyword>> {
        let before = config.areas.len();
        if suggest::merge_keywords(&mut config.areas, suggestions) == 0 {
            return Ok(Vec::new());
        }
        let added = config.areas[before..].to_vec();
        self.upsert_config(config).await?;
        Ok(added)
    }

    /// Import sources from a file and append them to the configuration.
    ///
    /// Nothing is saved if the file cannot be parsed. With `suggest`, focus
    /// areas are then suggested from the merged source list.
    pub async fn import_sources(
        &self,
        config_id: &str,
        file_name: &str,
        bytes: &[u8],
        suggest: bool,
    ) -> HubResult<Imported> {
        let candidates = import::parse_sources(file_name, bytes)?;
        let mut config = self.config(config_id).await?;
        if candidates.is_empty() {
            return Ok(Imported {
                added: Vec::new(),
                suggested: 0,
            });
        }

        let added: Vec<Source> = candidates.into_iter().map(|c| c.into_source()).collect();
        config.sources.extend(added.iter().cloned());
        let config = self.upsert_config(config).await?;
        tracing::info!(count = added.len(), file = file_name, "sources imported");

        let suggested = if suggest {
            let suggestions = suggest::suggest_focus_areas(
                &config.sources,
                self.provider.as_ref(),
                &self.language,
            )
            .await;
            self.merge_suggestions(config, &suggestions).await?.len()
        } else {
            0
        };

        Ok(Imported { added, suggested })
    }

    // ============ Reports ============

    /// Generate a report for the configuration and archive it (newest
    /// first). `autoSend` is stored with the configuration but not acted on
    /// here; delivery is always an explicit [`send_report`](Self::send_report).
    pub async fn generate(&self, config_id: &str) -> HubResult<Report> {
        let config = self.config(config_id).await?;
        let report =
            report::assemble(&config, self.provider.as_ref(), &self.language, Utc::now()).await?;

        let mut reports = self.archive.load().await?;
        reports.insert(0, report.clone());
        self.archive.save(&reports).await?;

        Ok(report)
    }

    /// Archived reports, newest first, optionally for one configuration.
    pub async fn reports(&self, config_id: Option<&str>) -> HubResult<Vec<Report>> {
        let reports = self.archive.load().await?;
        Ok(match config_id {
            Some(id) => reports.into_iter().filter(|r| r.config_id == id).collect(),
            None => reports,
        })
    }

    pub async fn report(&self, id: &str) -> HubResult<Report> {
        self.archive
            .load()
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| HubError::ReportNotFound(id.to_string()))
    }

    /// Newest report of the configuration, else the newest report overall.
    pub async fn latest_report(&self, config_id: &str) -> HubResult<Option<Report>> {
        let reports = self.archive.load().await?;
        let own = reports.iter().find(|r| r.config_id == config_id).cloned();
        Ok(own.or_else(|| reports.into_iter().next()))
    }

    /// Send an archived report to its configuration's webhook.
    pub async fn send_report(&self, report_id: &str) -> HubResult<()> {
        let report = self.report(report_id).await?;
        let config = self.config(&report.config_id).await?;
        let url = config
            .webhook()
            .ok_or_else(|| HubError::NoWebhook(config.name.clone()))?;
        if self.webhook.send(&report, url).await {
            Ok(())
        } else {
            Err(HubError::DeliveryFailed(url.to_string()))
        }
    }
}
