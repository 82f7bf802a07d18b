use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use intel_hub::citation::{GroundingEntry, PLACEHOLDER_TITLE};
use intel_hub::hub::{default_config, EntryKind, Hub, HubError};
use intel_hub::models::{Citation, IntelConfig, Report};
use intel_hub::provider::{Generation, GenerationProvider, GenerationRequest};
use intel_hub::store::memory::InMemoryStore;
use intel_hub::webhook::WebhookSender;

/// Answers report requests with a fixed body and grounding, and suggestion
/// requests (those with a response schema) with a fixed JSON array.
struct ScriptedProvider {
    report_text: String,
    grounding: Vec<GroundingEntry>,
    suggestions: &'static str,
    fail_reports: bool,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    fn new(report_text: &str, grounding: Vec<GroundingEntry>) -> Self {
        Self {
            report_text: report_text.to_string(),
            grounding,
            suggestions: r#"["Robotics", "artificial intelligence (ai)", "Chips"]"#,
            fail_reports: false,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.requests.lock().unwrap().push(request.clone());
        if request.response_schema.is_some() {
            return Ok(Generation {
                text: self.suggestions.to_string(),
                grounding: Vec::new(),
            });
        }
        if self.fail_reports {
            anyhow::bail!("quota exceeded");
        }
        Ok(Generation {
            text: self.report_text.clone(),
            grounding: self.grounding.clone(),
        })
    }
}

#[derive(Default)]
struct RecordingWebhook {
    accept: bool,
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl WebhookSender for RecordingWebhook {
    async fn send(&self, report: &Report, url: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((report.id.clone(), url.to_string()));
        self.accept
    }
}

struct Fixture {
    hub: Hub,
    provider: Arc<ScriptedProvider>,
    webhook: Arc<RecordingWebhook>,
}

fn fixture_with(provider: ScriptedProvider, configs: Vec<IntelConfig>, accept: bool) -> Fixture {
    let store = Arc::new(InMemoryStore::with_configs(configs));
    let provider = Arc::new(provider);
    let webhook = Arc::new(RecordingWebhook {
        accept,
        ..Default::default()
    });
    let hub = Hub::new(
        store.clone(),
        store,
        provider.clone(),
        webhook.clone(),
        "English",
    );
    Fixture {
        hub,
        provider,
        webhook,
    }
}

fn fixture() -> Fixture {
    let provider = ScriptedProvider::new(
        "# Weekly\n\nSee [Gemini launch](https://a.com/x) and [b](https://b.com).",
        vec![
            GroundingEntry::new("https://a.com/x", Some("A News")),
            GroundingEntry::new("https://c.com", None),
        ],
    );
    let mut config = default_config();
    config.webhook_url = Some("https://hooks.example/in".to_string());
    fixture_with(provider, vec![config], true)
}

#[tokio::test]
async fn generate_reconciles_citations_and_prepends_to_archive() {
    let fx = fixture();

    let first = fx.hub.generate("default-set").await.unwrap();
    assert_eq!(
        first.sources,
        vec![
            Citation {
                title: "A News".into(),
                url: "https://a.com/x".into()
            },
            Citation {
                title: PLACEHOLDER_TITLE.into(),
                url: "https://c.com".into()
            },
            Citation {
                title: "b".into(),
                url: "https://b.com".into()
            },
        ]
    );
    assert_eq!(
        first.areas_covered,
        vec!["Artificial Intelligence (AI)", "Large Language Models (LLM)"]
    );
    assert_eq!(first.config_name, "Default intel set");

    let second = fx.hub.generate("default-set").await.unwrap();
    let archive = fx.hub.reports(None).await.unwrap();
    assert_eq!(archive.len(), 2);
    assert_eq!(archive[0].id, second.id);
    assert_eq!(archive[1].id, first.id);

    let requests = fx.provider.requests.lock().unwrap();
    let request = &requests[0];
    assert!(request.web_search);
    assert!(request.prompt.contains("Write the report in English."));
}

#[tokio::test]
async fn generation_never_posts_to_the_webhook() {
    let fx = fixture();
    let config = fx.hub.config("default-set").await.unwrap();
    assert!(config.auto_send);
    assert!(config.webhook_url.is_some());

    let report = fx.hub.generate("default-set").await.unwrap();
    assert!(fx.webhook.sent.lock().unwrap().is_empty());
    assert_eq!(fx.hub.reports(None).await.unwrap().len(), 1);

    fx.hub.send_report(&report.id).await.unwrap();
    assert_eq!(
        fx.webhook.sent.lock().unwrap().as_slice(),
        &[(report.id.clone(), "https://hooks.example/in".to_string())]
    );
}

#[tokio::test]
async fn rejected_delivery_keeps_the_report() {
    let provider = ScriptedProvider::new("body", Vec::new());
    let mut config = default_config();
    config.webhook_url = Some("https://hooks.example/in".to_string());
    let fx = fixture_with(provider, vec![config], false);

    let report = fx.hub.generate("default-set").await.unwrap();
    let err = fx.hub.send_report(&report.id).await.unwrap_err();
    assert!(matches!(err, HubError::DeliveryFailed(_)));
    assert_eq!(fx.hub.reports(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn provider_failure_archives_nothing() {
    let mut provider = ScriptedProvider::new("unused", Vec::new());
    provider.fail_reports = true;
    let fx = fixture_with(provider, vec![default_config()], true);

    let err = fx.hub.generate("default-set").await.unwrap_err();
    assert!(matches!(err, HubError::Report(_)));
    assert!(err.to_string().contains("quota exceeded"));
    assert!(fx.hub.reports(None).await.unwrap().is_empty());
    assert!(fx.webhook.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_store_serves_default_set() {
    let fx = fixture_with(ScriptedProvider::new("x", Vec::new()), Vec::new(), true);
    let configs = fx.hub.configs().await.unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(fx.hub.active_config().await.unwrap().id, "default-set");

    assert!(fx.hub.seed_defaults().await.unwrap());
    assert!(!fx.hub.seed_defaults().await.unwrap());
}

#[tokio::test]
async fn deleting_active_set_selects_first_and_last_set_is_kept() {
    let fx = fixture();
    let created = fx.hub.create_config().await.unwrap();
    assert_eq!(created.name, "New intel set 2");
    assert_eq!(fx.hub.active_config().await.unwrap().id, created.id);

    fx.hub.delete_config(&created.id).await.unwrap();
    assert_eq!(fx.hub.active_config().await.unwrap().id, "default-set");

    let err = fx.hub.delete_config("default-set").await.unwrap_err();
    assert!(matches!(err, HubError::LastConfig));
    let err = fx.hub.delete_config("nope").await.unwrap_err();
    assert!(matches!(err, HubError::ConfigNotFound(_)));
}

#[tokio::test]
async fn latest_report_falls_back_to_newest_overall() {
    let fx = fixture();
    let other = fx.hub.create_config().await.unwrap();

    assert!(fx.hub.latest_report(&other.id).await.unwrap().is_none());

    let report = fx.hub.generate("default-set").await.unwrap();
    let latest = fx.hub.latest_report(&other.id).await.unwrap().unwrap();
    assert_eq!(latest.id, report.id);
    assert!(fx.hub.reports(Some(&other.id)).await.unwrap().is_empty());
}

#[tokio::test]
async fn toggled_entries_are_left_out_of_the_prompt() {
    let fx = fixture();
    fx.hub
        .toggle_entry("default-set", EntryKind::Source, "2")
        .await
        .unwrap();
    assert_eq!(
        fx.hub
            .toggle_entry("default-set", EntryKind::Keyword, "2")
            .await
            .unwrap(),
        Some(false)
    );
    assert_eq!(
        fx.hub
            .toggle_entry("default-set", EntryKind::Keyword, "missing")
            .await
            .unwrap(),
        None
    );

    let report = fx.hub.generate("default-set").await.unwrap();
    assert_eq!(report.areas_covered, vec!["Artificial Intelligence (AI)"]);
    let prompt = fx.provider.requests.lock().unwrap()[0].prompt.clone();
    assert!(prompt.contains("TechCrunch"));
    assert!(!prompt.contains("Reuters"));
}

#[tokio::test]
async fn suggest_merges_new_keywords_only() {
    let fx = fixture();
    let added = fx.hub.suggest_areas("default-set").await.unwrap();
    let names: Vec<&str> = added.iter().map(|k| k.keyword.as_str()).collect();
    assert_eq!(names, vec!["Robotics", "Chips"]);

    let config = fx.hub.config("default-set").await.unwrap();
    assert_eq!(config.areas.len(), 4);
    assert!(config.areas.iter().all(|a| a.enabled));
}

#[tokio::test]
async fn import_appends_sources_and_optionally_suggests() {
    let fx = fixture();
    let csv = "name,url\nWired,https://wired.com\nBroken,\n";

    let imported = fx
        .hub
        .import_sources("default-set", "list.csv", csv.as_bytes(), false)
        .await
        .unwrap();
    assert_eq!(imported.added.len(), 1);
    assert_eq!(imported.suggested, 0);
    assert!(fx.provider.requests.lock().unwrap().is_empty());

    let imported = fx
        .hub
        .import_sources("default-set", "more.json", br#"[{"url":"https://x.com"}]"#, true)
        .await
        .unwrap();
    assert_eq!(imported.added[0].name, "未命名");
    assert_eq!(imported.suggested, 2);

    let config = fx.hub.config("default-set").await.unwrap();
    assert_eq!(config.sources.len(), 4);
    assert_eq!(config.areas.len(), 4);
}

#[tokio::test]
async fn bad_import_changes_nothing() {
    let fx = fixture();
    let err = fx
        .hub
        .import_sources("default-set", "list.json", b"{not json", false)
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Import(_)));
    assert_eq!(
        fx.hub.config("default-set").await.unwrap().sources.len(),
        2
    );
}

#[tokio::test]
async fn send_report_requires_webhook() {
    let fx = fixture();
    let report = fx.hub.generate("default-set").await.unwrap();
    fx.hub.send_report(&report.id).await.unwrap();
    assert_eq!(fx.webhook.sent.lock().unwrap().len(), 1);

    fx.hub
        .update_config("default-set", |c| c.webhook_url = None)
        .await
        .unwrap();
    let err = fx.hub.send_report(&report.id).await.unwrap_err();
    assert!(matches!(err, HubError::NoWebhook(_)));

    let err = fx.hub.send_report("missing").await.unwrap_err();
    assert!(matches!(err, HubError::ReportNotFound(_)));
}

#[tokio::test]
async fn edits_leave_the_active_selection_alone() {
    let fx = fixture();
    let other = fx.hub.create_config().await.unwrap();
    assert_eq!(fx.hub.active_config().await.unwrap().id, other.id);
    fx.hub.select_config("default-set").await.unwrap();

    fx.hub
        .add_source(&other.id, "Wired", "https://wired.com", "AI")
        .await
        .unwrap();
    fx.hub.add_keyword(&other.id, "Robotics").await.unwrap();
    fx.hub
        .toggle_entry(&other.id, EntryKind::Keyword, "missing")
        .await
        .unwrap();
    fx.hub
        .update_config(&other.id, |c| c.lookback_days = 14)
        .await
        .unwrap();
    fx.hub
        .import_sources(&other.id, "list.csv", b"name,url\nX,https://x.com\n", true)
        .await
        .unwrap();
    fx.hub.suggest_areas(&other.id).await.unwrap();
    assert_eq!(fx.hub.active_config().await.unwrap().id, "default-set");

    let mut edited = fx.hub.config(&other.id).await.unwrap();
    assert_eq!(edited.sources.len(), 2);
    edited.name = "Renamed".into();
    fx.hub.save_config(edited).await.unwrap();
    assert_eq!(fx.hub.active_config().await.unwrap().id, other.id);
}
