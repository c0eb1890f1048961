//! Invocation Entry Point
//!
//! Serverless-style `handle(event, context)` wrapper: builds the agent for the
//! selected pipeline from the environment, runs one pass, and answers with a
//! status code and the terminal summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

use super::notifier::{LogNotifier, NotificationSink, WebhookNotifier};
use super::orchestrator::InactivityLifecycleAgent;
use super::store::ResourceStore;
use super::types::{LifecycleError, ThresholdConfig};
use crate::agents::iam::IamKeyStore;
use crate::agents::tableau::TableauUserStore;
use crate::config::{webhook_url_from_env, TableauConfig};

/// Which resource pipeline an invocation runs
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    #[default]
    Iam,
    Tableau,
}

/// Invocation payload
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub dry_run: bool,
}

/// Runtime-supplied invocation metadata
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    pub request_id: String,
    pub function_name: String,
}

/// Response returned to the invoking runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl HandlerResponse {
    fn ok(body: String) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    fn failed(err: &LifecycleError) -> Self {
        Self {
            status_code: 500,
            body: err.to_string(),
        }
    }
}

/// Handle one invocation
///
/// Per-resource failures still answer 200 and are listed in the body;
/// configuration and fetch failures answer 500.
pub async fn handle(event: &serde_json::Value, context: &InvocationContext) -> HandlerResponse {
    let span = info_span!(
        "invocation",
        request_id = %context.request_id,
        function = %context.function_name
    );

    async move {
        let agent = match parse_event(event) {
            Ok(event) => {
                info!(pipeline = ?event.pipeline, dry_run = event.dry_run, "Invocation received");
                build_agent(&event).await
            }
            Err(e) => Err(e),
        };

        match agent {
            Ok(agent) => run_agent(&agent, Utc::now()).await,
            Err(e) => {
                error!(error = %e, "Invocation setup failed");
                HandlerResponse::failed(&e)
            }
        }
    }
    .instrument(span)
    .await
}

/// Decode the invocation payload; `null` selects the defaults
pub fn parse_event(event: &serde_json::Value) -> Result<InvocationEvent, LifecycleError> {
    if event.is_null() {
        return Ok(InvocationEvent::default());
    }

    serde_json::from_value(event.clone())
        .map_err(|e| LifecycleError::Configuration(format!("Invalid invocation event: {e}")))
}

/// Build the agent for a pipeline from the environment
pub async fn build_agent(event: &InvocationEvent) -> Result<InactivityLifecycleAgent, LifecycleError> {
    let config = ThresholdConfig::from_env()?;
    let notifier = notifier_from_env()?;

    let store: Arc<dyn ResourceStore> = match event.pipeline {
        Pipeline::Iam => Arc::new(IamKeyStore::new(None).await),
        Pipeline::Tableau => Arc::new(TableauUserStore::new(TableauConfig::from_env()?)?),
    };

    Ok(InactivityLifecycleAgent::new(store, notifier, config).dry_run(event.dry_run))
}

/// Webhook sink when `NOTIFY_WEBHOOK_URL` is set, structured log otherwise
pub fn notifier_from_env() -> Result<Arc<dyn NotificationSink>, LifecycleError> {
    Ok(match webhook_url_from_env() {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => Arc::new(LogNotifier),
    })
}

/// Run a built agent and translate the outcome into a response
pub async fn run_agent(agent: &InactivityLifecycleAgent, now: DateTime<Utc>) -> HandlerResponse {
    match agent.run_at(now).await {
        Ok(summary) => HandlerResponse::ok(summary.to_string()),
        Err(e) => {
            error!(error = %e, "Lifecycle run aborted");
            HandlerResponse::failed(&e)
        }
    }
}
