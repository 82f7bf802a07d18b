//! Core data models used throughout Intel Hub.
//!
//! These are the records persisted by the configuration store and the report
//! archive. Field names serialize in camelCase so that stored JSON matches the
//! layout used by the browser dashboard.

use serde::{Deserialize, Serialize};

/// A site or feed the generation provider is asked to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub name: String,
    pub url: String,
    /// What to look for at this source (free text).
    #[serde(default)]
    pub target: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A focus keyword the report should concentrate on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keyword {
    pub id: String,
    pub keyword: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A named configuration set: sources, keywords and delivery settings.
///
/// `update_day`, `update_time` and `auto_send` describe a weekly schedule.
/// They are stored and validated, but nothing triggers on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub areas: Vec<Keyword>,
    pub lookback_days: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub update_day: u8,
    /// `HH:MM`, 24-hour clock.
    pub update_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub auto_send: bool,
}

impl IntelConfig {
    /// Keywords of the enabled focus areas, in configured order.
    pub fn active_keywords(&self) -> Vec<String> {
        self.areas
            .iter()
            .filter(|a| a.enabled)
            .map(|a| a.keyword.clone())
            .collect()
    }

    pub fn active_sources(&self) -> Vec<&Source> {
        self.sources.iter().filter(|s| s.enabled).collect()
    }

    /// The webhook URL, if one is set and non-blank.
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

/// A reference backing part of a generated report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
}

/// A generated intelligence report as stored in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    /// RFC 3339 generation time.
    pub timestamp: String,
    /// Markdown body.
    pub summary: String,
    pub sources: Vec<Citation>,
    pub areas_covered: Vec<String>,
    pub config_id: String,
    pub config_name: String,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_uses_camel_case_json() {
        let json = r#"{
            "id": "c1",
            "name": "Weekly",
            "sources": [{"id": "s1", "name": "A", "url": "https://a.com", "target": "", "enabled": false}],
            "areas": [{"id": "k1", "keyword": "AI", "enabled": true}],
            "lookbackDays": 7,
            "updateDay": 1,
            "updateTime": "10:00",
            "autoSend": true
        }"#;
        let cfg: IntelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.lookback_days, 7);
        assert!(cfg.webhook_url.is_none());
        assert!(cfg.active_sources().is_empty());
        assert_eq!(cfg.active_keywords(), vec!["AI".to_string()]);

        let out = serde_json::to_value(&cfg).unwrap();
        assert_eq!(out["updateTime"], "10:00");
        assert!(out.get("webhookUrl").is_none());
    }

    #[test]
    fn blank_webhook_is_treated_as_unset() {
        let cfg = IntelConfig {
            id: "c".into(),
            name: "n".into(),
            sources: vec![],
            areas: vec![],
            lookback_days: 7,
            update_day: 1,
            update_time: "09:00".into(),
            webhook_url: Some("   ".into()),
            auto_send: true,
        };
        assert_eq!(cfg.webhook(), None);
    }
}
