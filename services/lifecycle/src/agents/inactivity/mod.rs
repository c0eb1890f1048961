//! Inactivity Lifecycle Policy
//!
//! Generic warn → disable → delete lifecycle for credentials and accounts
//! that have gone unused:
//!
//! - `types`: resources, thresholds, actions, reports and errors
//! - `policy`: pure classification of idle days into an action
//! - `store`: the `ResourceStore` seam implemented by each backend
//! - `notifier`: owner notifications (structured log, webhook)
//! - `actuator`: applies one action and emits its notification
//! - `orchestrator`: one full fetch → classify → act pass
//! - `handler`: serverless-style `handle(event, context)` entry point

pub mod actuator;
pub mod handler;
pub mod notifier;
pub mod orchestrator;
pub mod policy;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use actuator::LifecycleActuator;
pub use handler::{handle, HandlerResponse, InvocationContext, InvocationEvent, Pipeline};
pub use notifier::{LogNotifier, NotificationSink, WebhookNotifier};
pub use orchestrator::InactivityLifecycleAgent;
pub use store::ResourceStore;
pub use types::{LifecycleAction, LifecycleError, ManagedResource, RunSummary, ThresholdConfig};
