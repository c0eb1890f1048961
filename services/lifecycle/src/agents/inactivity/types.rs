//! Inactivity Lifecycle Types
//!
//! Core types shared by the IAM and Tableau pipelines: the managed resource
//! record, threshold configuration, derived actions, notification events and
//! the per-run summary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of identity resource under lifecycle management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// AWS IAM access key
    IamAccessKey,
    /// Tableau Server user account
    TableauUser,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::IamAccessKey => write!(f, "iam"),
            ResourceKind::TableauUser => write!(f, "tableau"),
        }
    }
}

/// Lifecycle state of a resource as reported by its store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    #[default]
    Unknown,
    Active,
    Disabled,
}

/// An IAM access key or Tableau user, read fresh from its store every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedResource {
    /// Resource kind
    pub kind: ResourceKind,
    /// Identifier shown to humans (access key ID or Tableau username)
    pub id: String,
    /// Store-native handle used for mutations (access key ID or Tableau user LUID)
    pub handle: String,
    /// Owning user name
    pub owner: String,
    /// Owner contact address, when one is known
    pub owner_contact: Option<String>,
    /// Last activity; `None` means the resource was never used
    pub last_activity: Option<DateTime<Utc>>,
    /// Current lifecycle state
    #[serde(default)]
    pub state: ResourceState,
}

impl ManagedResource {
    /// Create a resource record with unknown state and no contact
    pub fn new(
        kind: ResourceKind,
        id: impl Into<String>,
        handle: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            id: id.into(),
            handle: handle.into(),
            owner: owner.into(),
            owner_contact: None,
            last_activity: None,
            state: ResourceState::Unknown,
        }
    }

    /// Set the last activity timestamp
    pub fn last_activity(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.last_activity = at;
        self
    }

    /// Set the owner contact
    pub fn contact(mut self, contact: Option<String>) -> Self {
        self.owner_contact = contact;
        self
    }

    /// Set the lifecycle state
    pub fn state(mut self, state: ResourceState) -> Self {
        self.state = state;
        self
    }
}

/// Default number of days before the disable threshold on which a warning fires
pub const DEFAULT_WARN_BEFORE_DAYS: u32 = 1;

/// Inactivity thresholds, immutable for the duration of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Days before `disable_after_days` on which the single warning is sent
    pub warn_before_days: u32,
    /// Idle days after which the resource is disabled
    pub disable_after_days: u32,
    /// Idle days after which the resource is deleted (strictly greater)
    pub delete_after_days: u32,
}

impl ThresholdConfig {
    /// Create thresholds with the default one-day warning lead
    pub fn new(disable_after_days: u32, delete_after_days: u32) -> Self {
        Self {
            warn_before_days: DEFAULT_WARN_BEFORE_DAYS,
            disable_after_days,
            delete_after_days,
        }
    }

    /// Override the warning lead
    pub fn with_warn_before_days(mut self, days: u32) -> Self {
        self.warn_before_days = days;
        self
    }

    /// Whether the thresholds are ordered `warn < disable < delete`
    pub fn is_ordered(&self) -> bool {
        self.warn_before_days > 0 && self.disable_after_days < self.delete_after_days
    }

    /// Idle day on which the warning fires (may be negative for tiny thresholds)
    pub fn warn_day(&self) -> i64 {
        i64::from(self.disable_after_days) - i64::from(self.warn_before_days)
    }
}

/// Action derived for a resource; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleAction {
    None,
    Warn,
    Disable,
    Delete,
}

impl std::fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleAction::None => write!(f, "NONE"),
            LifecycleAction::Warn => write!(f, "WARNING"),
            LifecycleAction::Disable => write!(f, "DISABLE"),
            LifecycleAction::Delete => write!(f, "DELETE"),
        }
    }
}

/// Event handed to the notification sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub action: LifecycleAction,
    pub resource_kind: ResourceKind,
    pub resource_id: String,
    pub owner: String,
    pub owner_contact: Option<String>,
    /// Threshold the action is reported against
    pub threshold_days: u32,
    pub last_activity_date: NaiveDate,
    pub days_idle: i64,
    /// Days left before the disable threshold (warnings only)
    pub days_until_disable: Option<u32>,
}

/// Result of executing an action against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Nothing to do
    NoOp,
    /// Notification only (warnings)
    Notified,
    /// Remote mutation performed
    Applied,
    /// Resource already disabled or already gone
    AlreadyApplied,
    /// Mutation skipped because the run is a dry run
    DryRun,
}

/// What happened to a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionReport {
    pub resource_id: String,
    pub action: LifecycleAction,
    pub outcome: ActionOutcome,
    pub event: Option<NotificationEvent>,
    /// Whether the notification sink accepted the event
    pub notified: bool,
}

/// A resource whose action failed; the run continued past it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceFailure {
    pub resource_id: String,
    pub action: LifecycleAction,
    pub error: String,
}

/// Terminal summary of a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub kind: ResourceKind,
    pub dry_run: bool,
    pub evaluated: usize,
    pub unchanged: usize,
    pub warned: Vec<String>,
    pub disabled: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<ResourceFailure>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Start an empty summary
    pub fn new(kind: ResourceKind, dry_run: bool, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            kind,
            dry_run,
            evaluated: 0,
            unchanged: 0,
            warned: Vec::new(),
            disabled: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            started_at,
            completed_at: None,
        }
    }

    /// Record a successfully handled resource
    pub fn record(&mut self, report: &ActionReport) {
        self.evaluated += 1;
        if report.outcome == ActionOutcome::NoOp {
            self.unchanged += 1;
            return;
        }
        let id = report.resource_id.clone();
        match report.action {
            LifecycleAction::None => self.unchanged += 1,
            LifecycleAction::Warn => self.warned.push(id),
            LifecycleAction::Disable => self.disabled.push(id),
            LifecycleAction::Delete => self.deleted.push(id),
        }
    }

    /// Record a resource whose action failed
    pub fn record_failure(&mut self, resource_id: &str, action: LifecycleAction, error: &LifecycleError) {
        self.evaluated += 1;
        self.failed.push(ResourceFailure {
            resource_id: resource_id.to_string(),
            action,
            error: error.to_string(),
        });
    }

    /// Whether every evaluated resource was handled without error
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let title = match self.kind {
            ResourceKind::IamAccessKey => "IAM USERS SUSPENSION AND DELETION",
            ResourceKind::TableauUser => "TABLEAU USERS SUSPENSION AND DELETION",
        };
        writeln!(
            f,
            "{}{} (run {})",
            title,
            if self.dry_run { " [dry run]" } else { "" },
            self.run_id
        )?;
        writeln!(
            f,
            "  evaluated: {}  unchanged: {}  warned: {}  disabled: {}  deleted: {}  failed: {}",
            self.evaluated,
            self.unchanged,
            self.warned.len(),
            self.disabled.len(),
            self.deleted.len(),
            self.failed.len()
        )?;
        for (label, ids) in [
            ("warned", &self.warned),
            ("disabled", &self.disabled),
            ("deleted", &self.deleted),
        ] {
            if !ids.is_empty() {
                writeln!(f, "  {}: {}", label, ids.join(", "))?;
            }
        }
        for failure in &self.failed {
            writeln!(
                f,
                "  failed: {} ({}): {}",
                failure.resource_id, failure.action, failure.error
            )?;
        }
        Ok(())
    }
}

/// Errors raised by lifecycle operations
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Missing or invalid configuration; fatal before any remote call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Remote store call failed (auth, network, throttling, API error)
    #[error("{store} {operation} failed: {message}")]
    RemoteStore {
        store: ResourceKind,
        operation: &'static str,
        message: String,
    },

    /// User has no contact tag; never aborts an action
    #[error("No contact recorded for user: {0}")]
    MissingContact(String),

    /// Notification sink rejected an event
    #[error("Notification failed: {0}")]
    Notification(String),
}

impl LifecycleError {
    /// Build a remote store error from any displayable cause
    pub fn remote(store: ResourceKind, operation: &'static str, err: impl std::fmt::Display) -> Self {
        LifecycleError::RemoteStore {
            store,
            operation,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(id: &str, action: LifecycleAction) -> ActionReport {
        ActionReport {
            resource_id: id.to_string(),
            action,
            outcome: ActionOutcome::Applied,
            event: None,
            notified: true,
        }
    }

    #[test]
    fn test_threshold_defaults() {
        let cfg = ThresholdConfig::new(90, 180);
        assert_eq!(cfg.warn_before_days, 1);
        assert_eq!(cfg.warn_day(), 89);
        assert!(cfg.is_ordered());
        assert!(!ThresholdConfig::new(90, 90).is_ordered());
        assert_eq!(ThresholdConfig::new(0, 10).warn_day(), -1);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(LifecycleAction::Warn.to_string(), "WARNING");
        assert_eq!(LifecycleAction::Delete.to_string(), "DELETE");
        assert_eq!(ResourceKind::IamAccessKey.to_string(), "iam");
    }

    #[test]
    fn test_summary_tallies() {
        let mut summary = RunSummary::new(ResourceKind::IamAccessKey, false, Utc::now());
        summary.record(&report("AKIA1", LifecycleAction::None));
        summary.record(&report("AKIA2", LifecycleAction::Warn));
        summary.record(&report("AKIA3", LifecycleAction::Delete));
        summary.record_failure(
            "AKIA4",
            LifecycleAction::Disable,
            &LifecycleError::remote(ResourceKind::IamAccessKey, "update_access_key", "throttled"),
        );

        assert_eq!(summary.evaluated, 4);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.warned, vec!["AKIA2".to_string()]);
        assert_eq!(summary.deleted, vec!["AKIA3".to_string()]);
        assert!(!summary.is_clean());

        let text = summary.to_string();
        assert!(text.starts_with("IAM USERS SUSPENSION AND DELETION"));
        assert!(text.contains("failed: AKIA4 (DISABLE): iam update_access_key failed: throttled"));
    }

    #[test]
    fn test_resource_builder() {
        let resource = ManagedResource::new(ResourceKind::TableauUser, "jdoe", "luid-1", "jdoe")
            .contact(Some("jdoe@example.com".to_string()))
            .state(ResourceState::Active);

        assert_eq!(resource.handle, "luid-1");
        assert_eq!(resource.owner_contact.as_deref(), Some("jdoe@example.com"));
        assert!(resource.last_activity.is_none());
        assert_eq!(resource.state, ResourceState::Active);
    }
}
