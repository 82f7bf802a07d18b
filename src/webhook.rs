//! Report delivery to a webhook endpoint.
//!
//! The report is POSTed as JSON (the same shape stored in the archive) with
//! an `X-Webhook-Event: report.generated` header. Delivery is one attempt;
//! the outcome is a plain success flag and failures are only logged.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::WebhookConfig;
use crate::models::Report;

/// Event name sent in the `X-Webhook-Event` header.
pub const REPORT_EVENT: &str = "report.generated";

#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// Deliver `report` to `url`. Returns `true` on a 2xx response.
    async fn send(&self, report: &Report, url: &str) -> bool;
}

/// HTTP POST delivery via `reqwest`.
pub struct HttpWebhook {
    client: reqwest::Client,
}

impl HttpWebhook {
    pub fn new(config: &WebhookConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhook {
    async fn send(&self, report: &Report, url: &str) -> bool {
        tracing::info!(url, report = %report.id, "sending report to webhook");

        let response = self
            .client
            .post(url)
            .header("X-Webhook-Event", REPORT_EVENT)
            .json(report)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!(url, %status, body = %body, "webhook rejected report");
                false
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "webhook request failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    fn report() -> Report {
        Report {
            id: "r1".into(),
            timestamp: "2026-10-16T00:00:00+00:00".into(),
            summary: "# hi".into(),
            sources: vec![],
            areas_covered: vec!["AI".into()],
            config_id: "c1".into(),
            config_name: "Weekly".into(),
        }
    }

    async fn spawn_receiver(status: StatusCode) -> (String, Arc<Mutex<Vec<serde_json::Value>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let app = Router::new().route(
            "/hook",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    assert_eq!(
                        headers.get("x-webhook-event").and_then(|v| v.to_str().ok()),
                        Some(REPORT_EVENT)
                    );
                    sink.lock().unwrap().push(body);
                    status
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), received)
    }

    #[tokio::test]
    async fn posts_report_json() {
        let (url, received) = spawn_receiver(StatusCode::OK).await;
        let sender = HttpWebhook::new(&WebhookConfig::default()).unwrap();

        assert!(sender.send(&report(), &url).await);

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["configName"], "Weekly");
        assert_eq!(bodies[0]["areasCovered"][0], "AI");
    }

    #[tokio::test]
    async fn non_success_status_is_failure() {
        let (url, _received) = spawn_receiver(StatusCode::INTERNAL_SERVER_ERROR).await;
        let sender = HttpWebhook::new(&WebhookConfig::default()).unwrap();
        assert!(!sender.send(&report(), &url).await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sender = HttpWebhook::new(&WebhookConfig::default()).unwrap();
        assert!(!sender.send(&report(), &format!("http://{}/hook", addr)).await);
    }
}
