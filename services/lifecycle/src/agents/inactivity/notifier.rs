//! Notification Sinks
//!
//! Renders lifecycle events into human-readable messages and delivers them.
//! The log sink is always available; the webhook sink posts JSON to any
//! endpoint that accepts `{"text": ..., "event": ...}` (Slack, Teams, ...).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{LifecycleAction, LifecycleError, NotificationEvent};

/// Destination for lifecycle notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sink name for logs
    fn name(&self) -> &'static str;

    /// Deliver a single event
    async fn notify(&self, event: &NotificationEvent) -> Result<(), LifecycleError>;
}

/// Render the message sent to the resource owner
pub fn render_message(event: &NotificationEvent) -> String {
    match event.action {
        LifecycleAction::Delete | LifecycleAction::Disable => format!(
            "{} the < {} > due to inactivity in the past {} days. Last activity was on {}",
            event.action, event.resource_id, event.threshold_days, event.last_activity_date
        ),
        LifecycleAction::Warn => format!(
            "{} : USER: < {} > is going to be disabled in {} due to inactivity in the past {} days, \
             Kindly use it to prevent this action. Last activity was on {}",
            event.action,
            event.resource_id,
            lead_time(event.days_until_disable.unwrap_or(1)),
            event.threshold_days,
            event.last_activity_date
        ),
        LifecycleAction::None => format!("No action for < {} >", event.resource_id),
    }
}

fn lead_time(days: u32) -> String {
    if days == 1 {
        "24 hours".to_string()
    } else {
        format!("{} days", days)
    }
}

/// Writes notifications to the structured log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), LifecycleError> {
        info!(
            action = %event.action,
            resource = %event.resource_id,
            owner = %event.owner,
            contact = event.owner_contact.as_deref().unwrap_or("<none>"),
            "{}",
            render_message(event)
        );
        Ok(())
    }
}

/// Posts notifications to a JSON webhook
pub struct WebhookNotifier {
    http_client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a webhook notifier
    pub fn new(url: impl Into<String>) -> Result<Self, LifecycleError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LifecycleError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<(), LifecycleError> {
        let payload = json!({
            "text": render_message(event),
            "event": event,
        });

        debug!(resource = %event.resource_id, "Posting notification to webhook");

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LifecycleError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Webhook rejected notification");
            return Err(LifecycleError::Notification(format!(
                "webhook returned {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
