//! Lornu AI Lifecycle Library
//!
//! Inactivity lifecycle enforcement for Tableau users and AWS IAM access keys.

pub mod agents;
pub mod config;

pub use agents::iam::IamKeyStore;
pub use agents::inactivity::{
    handle, InactivityLifecycleAgent, LifecycleAction, LifecycleError, RunSummary,
    ThresholdConfig,
};
pub use agents::tableau::TableauUserStore;
