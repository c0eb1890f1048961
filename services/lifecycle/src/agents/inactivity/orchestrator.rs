//! Inactivity Lifecycle Orchestrator
//!
//! The agent that drives one pass over a store: fetch, classify, act, and
//! summarize. Per-resource failures are isolated; only a failed fetch aborts
//! the run.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::actuator::LifecycleActuator;
use super::notifier::NotificationSink;
use super::policy::classify_resource;
use super::store::ResourceStore;
use super::types::{LifecycleError, RunSummary, ThresholdConfig};

/// Inactivity Lifecycle Agent
///
/// Owns one store and one notification sink for the duration of an
/// invocation. Construct a new agent per run; nothing is cached between runs.
pub struct InactivityLifecycleAgent {
    store: Arc<dyn ResourceStore>,
    notifier: Arc<dyn NotificationSink>,
    config: ThresholdConfig,
    dry_run: bool,
}

impl InactivityLifecycleAgent {
    /// Create a new agent
    pub fn new(
        store: Arc<dyn ResourceStore>,
        notifier: Arc<dyn NotificationSink>,
        config: ThresholdConfig,
    ) -> Self {
        if !config.is_ordered() {
            warn!(
                disable_after_days = config.disable_after_days,
                delete_after_days = config.delete_after_days,
                "Thresholds are not strictly ordered; actions follow the fixed check order"
            );
        }

        Self {
            store,
            notifier,
            config,
            dry_run: false,
        }
    }

    /// Enable dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run a full pass at the current time
    pub async fn run(&self) -> Result<RunSummary, LifecycleError> {
        self.run_at(Utc::now()).await
    }

    /// Run a full pass as of `now`
    ///
    /// The store session is released whether or not the pass succeeds.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary, LifecycleError> {
        let result = self.evaluate(now).await;

        if let Err(e) = self.store.release().await {
            warn!(store = %self.store.kind(), error = %e, "Failed to release store session");
        }

        result
    }

    async fn evaluate(&self, now: DateTime<Utc>) -> Result<RunSummary, LifecycleError> {
        let mut summary = RunSummary::new(self.store.kind(), self.dry_run, now);

        info!(
            run_id = %summary.run_id,
            store = %self.store.kind(),
            disable_after_days = self.config.disable_after_days,
            delete_after_days = self.config.delete_after_days,
            dry_run = self.dry_run,
            "Starting inactivity lifecycle run"
        );

        let resources = self.store.list_resources().await.map_err(|e| {
            error!(store = %self.store.kind(), error = %e, "Failed to list resources");
            e
        })?;

        info!(count = resources.len(), "Fetched resources");

        let actuator = LifecycleActuator::new(self.store.as_ref(), self.notifier.as_ref(), self.config)
            .dry_run(self.dry_run);

        for resource in &resources {
            let action = classify_resource(resource, now, &self.config);

            match actuator.apply(resource, action, now).await {
                Ok(report) => summary.record(&report),
                Err(e) => {
                    error!(
                        resource = %resource.id,
                        action = %action,
                        error = %e,
                        "Lifecycle action failed, continuing"
                    );
                    summary.record_failure(&resource.id, action, &e);
                }
            }
        }

        summary.completed_at = Some(Utc::now());

        info!(
            run_id = %summary.run_id,
            evaluated = summary.evaluated,
            warned = summary.warned.len(),
            disabled = summary.disabled.len(),
            deleted = summary.deleted.len(),
            failed = summary.failed.len(),
            "Inactivity lifecycle run complete"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::inactivity::testing::{InMemoryStore, RecordingNotifier};
    use crate::agents::inactivity::types::{LifecycleAction, ManagedResource, ResourceKind, ResourceState};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::Ordering;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 8, 0, 0).unwrap()
    }

    fn key(id: &str, idle_days: Option<i64>) -> ManagedResource {
        ManagedResource::new(ResourceKind::IamAccessKey, id, id, format!("user-{id}"))
            .last_activity(idle_days.map(|d| now() - Duration::days(d)))
            .state(ResourceState::Active)
    }

    fn fleet() -> Vec<ManagedResource> {
        vec![
            key("AKIA-FRESH", Some(3)),
            key("AKIA-WARN", Some(89)),
            key("AKIA-DISABLE", Some(90)),
            key("AKIA-LATE", Some(179)),
            key("AKIA-DELETE", Some(181)),
            key("AKIA-NEVER", None),
        ]
    }

    fn agent(
        store: Arc<InMemoryStore>,
        sink: Arc<RecordingNotifier>,
    ) -> InactivityLifecycleAgent {
        InactivityLifecycleAgent::new(store, sink, ThresholdConfig::new(90, 180))
    }

    #[tokio::test]
    async fn test_run_classifies_and_acts() {
        let store = Arc::new(InMemoryStore::new(ResourceKind::IamAccessKey, fleet()));
        let sink = Arc::new(RecordingNotifier::default());

        let summary = agent(store.clone(), sink.clone()).run_at(now()).await.unwrap();

        assert_eq!(summary.evaluated, 6);
        assert_eq!(summary.unchanged, 2);
        assert_eq!(summary.warned, vec!["AKIA-WARN".to_string()]);
        assert_eq!(summary.disabled, vec!["AKIA-DISABLE".to_string(), "AKIA-LATE".to_string()]);
        assert_eq!(summary.deleted, vec!["AKIA-DELETE".to_string()]);
        assert!(summary.is_clean());

        assert_eq!(store.get("AKIA-DISABLE").unwrap().state, ResourceState::Disabled);
        assert!(store.get("AKIA-DELETE").is_none());
        assert_eq!(store.get("AKIA-NEVER").unwrap().state, ResourceState::Active);
        assert_eq!(sink.events().len(), 4);
        assert!(store.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_resource_does_not_abort_run() {
        let store = Arc::new(
            InMemoryStore::new(ResourceKind::IamAccessKey, fleet()).failing_on("AKIA-DISABLE"),
        );
        let sink = Arc::new(RecordingNotifier::default());

        let summary = agent(store.clone(), sink).run_at(now()).await.unwrap();

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].resource_id, "AKIA-DISABLE");
        assert_eq!(summary.failed[0].action, LifecycleAction::Disable);
        assert_eq!(summary.disabled, vec!["AKIA-LATE".to_string()]);
        assert!(store.get("AKIA-DELETE").is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_and_releases() {
        let store = Arc::new(InMemoryStore::new(ResourceKind::IamAccessKey, fleet()).failing_listing());
        let sink = Arc::new(RecordingNotifier::default());

        let err = agent(store.clone(), sink.clone()).run_at(now()).await.unwrap_err();

        assert!(matches!(err, LifecycleError::RemoteStore { .. }));
        assert!(sink.events().is_empty());
        assert!(store.released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let store = Arc::new(InMemoryStore::new(ResourceKind::IamAccessKey, fleet()));
        let sink = Arc::new(RecordingNotifier::default());
        let agent = agent(store.clone(), sink.clone());

        agent.run_at(now()).await.unwrap();
        let second = agent.run_at(now()).await.unwrap();

        assert!(second.is_clean());
        // Deleted key is gone; disabled keys are already in their target state
        assert_eq!(second.evaluated, 5);
        assert_eq!(store.mutations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let store = Arc::new(InMemoryStore::new(ResourceKind::IamAccessKey, fleet()));
        let sink = Arc::new(RecordingNotifier::default());

        let summary = agent(store.clone(), sink.clone())
            .dry_run(true)
            .run_at(now())
            .await
            .unwrap();

        assert!(summary.dry_run);
        assert_eq!(summary.deleted.len(), 1);
        assert_eq!(store.mutations.load(Ordering::SeqCst), 0);
        assert!(sink.events().is_empty());
    }
}
