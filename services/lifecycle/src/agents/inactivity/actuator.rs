//! Lifecycle Actuator
//!
//! Executes a classified action against the resource store and emits the
//! matching notification. Mutations happen before notifications so owners are
//! only told about changes that actually landed.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::notifier::NotificationSink;
use super::policy::days_idle;
use super::store::ResourceStore;
use super::types::{
    ActionOutcome, ActionReport, LifecycleAction, LifecycleError, ManagedResource,
    NotificationEvent, ResourceState, ThresholdConfig,
};

/// Build the notification event for an action, if it warrants one
pub fn build_event(
    resource: &ManagedResource,
    action: LifecycleAction,
    cfg: &ThresholdConfig,
    now: DateTime<Utc>,
) -> Option<NotificationEvent> {
    let last_activity = resource.last_activity?;

    let (threshold_days, days_until_disable) = match action {
        LifecycleAction::None => return None,
        LifecycleAction::Warn => (cfg.disable_after_days, Some(cfg.warn_before_days)),
        LifecycleAction::Disable => (cfg.disable_after_days, None),
        LifecycleAction::Delete => (cfg.delete_after_days, None),
    };

    Some(NotificationEvent {
        action,
        resource_kind: resource.kind,
        resource_id: resource.id.clone(),
        owner: resource.owner.clone(),
        owner_contact: resource.owner_contact.clone(),
        threshold_days,
        last_activity_date: last_activity.date_naive(),
        days_idle: days_idle(last_activity, now),
        days_until_disable,
    })
}

/// Applies lifecycle actions to one store
pub struct LifecycleActuator<'a> {
    store: &'a dyn ResourceStore,
    notifier: &'a dyn NotificationSink,
    config: ThresholdConfig,
    dry_run: bool,
}

impl<'a> LifecycleActuator<'a> {
    /// Create an actuator over a store and notification sink
    pub fn new(
        store: &'a dyn ResourceStore,
        notifier: &'a dyn NotificationSink,
        config: ThresholdConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
            dry_run: false,
        }
    }

    /// Skip remote mutations and notification delivery
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Apply `action` to `resource`
    ///
    /// Remote errors are returned to the caller, which records them and moves
    /// on to the next resource.
    pub async fn apply(
        &self,
        resource: &ManagedResource,
        action: LifecycleAction,
        now: DateTime<Utc>,
    ) -> Result<ActionReport, LifecycleError> {
        let outcome = match action {
            LifecycleAction::None => ActionOutcome::NoOp,
            LifecycleAction::Warn if resource.state == ResourceState::Disabled => {
                debug!(resource = %resource.id, "Already disabled, no warning sent");
                ActionOutcome::NoOp
            }
            LifecycleAction::Warn => ActionOutcome::Notified,
            _ if self.dry_run => ActionOutcome::DryRun,
            LifecycleAction::Disable if resource.state == ResourceState::Disabled => {
                debug!(resource = %resource.id, "Already disabled");
                ActionOutcome::AlreadyApplied
            }
            LifecycleAction::Disable => self.store.disable(resource).await?,
            LifecycleAction::Delete => self.store.delete(resource).await?,
        };

        let event = match outcome {
            ActionOutcome::NoOp => None,
            _ => build_event(resource, action, &self.config, now),
        };

        if matches!(outcome, ActionOutcome::Applied) {
            info!(
                store = %self.store.kind(),
                resource = %resource.id,
                owner = %resource.owner,
                action = %action,
                "Lifecycle action applied"
            );
        }

        let notified = match (&event, outcome) {
            (Some(event), ActionOutcome::Notified | ActionOutcome::Applied) => {
                self.deliver(event).await
            }
            (Some(event), ActionOutcome::DryRun) => {
                info!(resource = %event.resource_id, action = %event.action, "DRY RUN - would notify");
                false
            }
            _ => false,
        };

        Ok(ActionReport {
            resource_id: resource.id.clone(),
            action,
            outcome,
            event,
            notified,
        })
    }

    async fn deliver(&self, event: &NotificationEvent) -> bool {
        if self.dry_run {
            info!(resource = %event.resource_id, action = %event.action, "DRY RUN - would notify");
            return false;
        }

        if event.owner_contact.is_none() {
            debug!(resource = %event.resource_id, "Notifying without owner contact");
        }

        match self.notifier.notify(event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    sink = self.notifier.name(),
                    resource = %event.resource_id,
                    error = %e,
                    "Failed to deliver notification"
                );
                false
            }
        }
    }
}
