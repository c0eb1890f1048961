//! Resource Store Adapters
//!
//! Trait-based abstraction over the remote stores that own the managed
//! resources. The IAM and Tableau pipelines each provide one implementation.

use async_trait::async_trait;

use super::types::{ActionOutcome, LifecycleError, ManagedResource, ResourceKind};

/// Remote store holding lifecycle-managed resources
///
/// `disable` and `delete` must be idempotent: a resource already in the
/// target state, or already gone, reports [`ActionOutcome::AlreadyApplied`]
/// rather than an error.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get the resource kind served by this store
    fn kind(&self) -> ResourceKind;

    /// List every resource, enriched with last activity and owner contact
    async fn list_resources(&self) -> Result<Vec<ManagedResource>, LifecycleError>;

    /// Put the resource into its inactive state
    async fn disable(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError>;

    /// Remove the resource
    async fn delete(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError>;

    /// Release any session held by the store
    async fn release(&self) -> Result<(), LifecycleError> {
        Ok(())
    }
}
