//! Agent modules for the lifecycle service
//!
//! - `inactivity`: backend-independent policy, actuator and orchestrator
//! - `iam`: AWS IAM access key store
//! - `tableau`: Tableau Server user store and REST client

pub mod iam;
pub mod inactivity;
pub mod tableau;

pub use inactivity::InactivityLifecycleAgent;
