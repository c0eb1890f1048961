//! Inactivity Policy Evaluator
//!
//! Pure classification of a resource's idle time against the configured
//! thresholds. Both pipelines share one boundary convention:
//!
//! - `days_idle == disable - warn_before` → WARN (checked first)
//! - `disable <= days_idle <= delete` → DISABLE
//! - `days_idle > delete` → DELETE
//! - anything else → NONE
//!
//! Idle days are counted between calendar dates in UTC, so the time of day
//! of either timestamp never matters.

use chrono::{DateTime, Utc};

use super::types::{LifecycleAction, ManagedResource, ThresholdConfig};

/// Whole calendar days between the last activity and `now`
pub fn days_idle(last_activity: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now.date_naive() - last_activity.date_naive()).num_days()
}

/// Classify an idle-day count
pub fn classify_days(days_idle: i64, cfg: &ThresholdConfig) -> LifecycleAction {
    let disable = i64::from(cfg.disable_after_days);
    let delete = i64::from(cfg.delete_after_days);

    if days_idle == cfg.warn_day() {
        LifecycleAction::Warn
    } else if disable <= days_idle && days_idle <= delete {
        LifecycleAction::Disable
    } else if days_idle > delete {
        LifecycleAction::Delete
    } else {
        LifecycleAction::None
    }
}

/// Classify a last-activity timestamp at `now`
pub fn classify(
    last_activity: DateTime<Utc>,
    now: DateTime<Utc>,
    cfg: &ThresholdConfig,
) -> LifecycleAction {
    classify_days(days_idle(last_activity, now), cfg)
}

/// Classify a resource; resources that were never used are left alone
pub fn classify_resource(
    resource: &ManagedResource,
    now: DateTime<Utc>,
    cfg: &ThresholdConfig,
) -> LifecycleAction {
    resource
        .last_activity
        .map_or(LifecycleAction::None, |at| classify(at, now, cfg))
}

/// Whether a resource counts as inactive for reporting
///
/// Requires a recorded last activity at least `disable_after_days` old.
pub fn is_inactive(
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cfg: &ThresholdConfig,
) -> bool {
    last_activity.is_some_and(|at| days_idle(at, now) >= i64::from(cfg.disable_after_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::inactivity::types::ResourceKind;
    use chrono::{Duration, TimeZone};

    fn cfg() -> ThresholdConfig {
        ThresholdConfig::new(90, 180)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 9, 15, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    #[test]
    fn test_none_below_warning_day() {
        for days in [-3, 0, 1, 45, 88] {
            assert_eq!(classify_days(days, &cfg()), LifecycleAction::None, "days={days}");
        }
    }

    #[test]
    fn test_warn_on_exactly_one_day() {
        assert_eq!(classify_days(89, &cfg()), LifecycleAction::Warn);
        for delete in [89, 90, 120, 10_000] {
            let cfg = ThresholdConfig::new(90, delete);
            assert_eq!(classify_days(89, &cfg), LifecycleAction::Warn, "delete={delete}");
        }
    }

    #[test]
    fn test_disable_range_is_inclusive() {
        for days in 90..=180 {
            assert_eq!(classify_days(days, &cfg()), LifecycleAction::Disable, "days={days}");
        }
    }

    #[test]
    fn test_delete_requires_strictly_greater() {
        assert_eq!(classify_days(180, &cfg()), LifecycleAction::Disable);
        for days in [181, 365, 5_000] {
            assert_eq!(classify_days(days, &cfg()), LifecycleAction::Delete, "days={days}");
        }
    }

    #[test]
    fn test_scenario_90_180() {
        assert_eq!(classify(days_ago(89), now(), &cfg()), LifecycleAction::Warn);
        assert_eq!(classify(days_ago(90), now(), &cfg()), LifecycleAction::Disable);
        assert_eq!(classify(days_ago(179), now(), &cfg()), LifecycleAction::Disable);
        assert_eq!(classify(days_ago(181), now(), &cfg()), LifecycleAction::Delete);
    }

    #[test]
    fn test_time_of_day_is_ignored() {
        let late = Utc.with_ymd_and_hms(2024, 4, 1, 23, 59, 59).unwrap();
        let early_now = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 1).unwrap();
        assert_eq!(days_idle(late, early_now), 90);
        assert_eq!(classify(late, early_now, &cfg()), LifecycleAction::Disable);
    }

    #[test]
    fn test_custom_warning_lead() {
        let cfg = ThresholdConfig::new(90, 180).with_warn_before_days(7);
        assert_eq!(classify_days(83, &cfg), LifecycleAction::Warn);
        assert_eq!(classify_days(89, &cfg), LifecycleAction::None);
    }

    #[test]
    fn test_inverted_thresholds_follow_check_order() {
        // Equal thresholds: the disable range collapses to a single day
        let equal = ThresholdConfig::new(90, 90);
        assert_eq!(classify_days(89, &equal), LifecycleAction::Warn);
        assert_eq!(classify_days(90, &equal), LifecycleAction::Disable);
        assert_eq!(classify_days(91, &equal), LifecycleAction::Delete);

        // Inverted thresholds: DISABLE is unreachable, warning still wins its day
        let inverted = ThresholdConfig::new(90, 30);
        assert_eq!(classify_days(89, &inverted), LifecycleAction::Warn);
        assert_eq!(classify_days(90, &inverted), LifecycleAction::Delete);
        assert_eq!(classify_days(31, &inverted), LifecycleAction::Delete);
        assert_eq!(classify_days(30, &inverted), LifecycleAction::None);
    }

    #[test]
    fn test_never_used_resource_is_left_alone() {
        let resource = ManagedResource::new(ResourceKind::TableauUser, "ghost", "luid", "ghost");
        assert_eq!(classify_resource(&resource, now(), &cfg()), LifecycleAction::None);

        let used = resource.last_activity(Some(days_ago(200)));
        assert_eq!(classify_resource(&used, now(), &cfg()), LifecycleAction::Delete);
    }

    #[test]
    fn test_inactive_report_filter() {
        assert!(!is_inactive(None, now(), &cfg()));
        assert!(!is_inactive(Some(days_ago(89)), now(), &cfg()));
        assert!(is_inactive(Some(days_ago(90)), now(), &cfg()));
        assert!(is_inactive(Some(days_ago(1_000)), now(), &cfg()));
    }
}
