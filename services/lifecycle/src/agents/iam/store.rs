//! IAM Access Key Store
//!
//! Enumerates IAM users and their access keys through the AWS SDK, resolving
//! each key's last use and each user's `email` tag. Credentials and region
//! come from the default AWS provider chain.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_iam::config::Region;
use aws_sdk_iam::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_iam::primitives::DateTime as AwsDateTime;
use aws_sdk_iam::types::StatusType;
use aws_sdk_iam::Client;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::agents::inactivity::store::ResourceStore;
use crate::agents::inactivity::types::{
    ActionOutcome, LifecycleError, ManagedResource, ResourceKind, ResourceState,
};

/// Tag key holding the owner's contact address
pub const CONTACT_TAG: &str = "email";

const NO_SUCH_ENTITY: &str = "NoSuchEntity";
const DELETE_CONFLICT: &str = "DeleteConflict";

/// IAM-backed resource store for access keys
pub struct IamKeyStore {
    client: Client,
}

impl IamKeyStore {
    /// Create a store from the default AWS configuration chain
    pub async fn new(region: Option<String>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region));
        }
        let sdk_config = loader.load().await;

        debug!(region = ?sdk_config.region(), "IAM client initialized");

        Self {
            client: Client::new(&sdk_config),
        }
    }

    /// Wrap an existing SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn list_user_names(&self) -> Result<Vec<String>, LifecycleError> {
        let mut users = self.client.list_users().into_paginator().items().send();
        let mut names = Vec::new();

        while let Some(user) = users.try_next().await.map_err(|e| sdk_error("list_users", e))? {
            names.push(user.user_name().to_string());
        }

        Ok(names)
    }

    /// Map of user name to contact address for every user carrying the tag
    pub async fn contacts(&self, users: &[String]) -> Result<HashMap<String, String>, LifecycleError> {
        let mut contacts = HashMap::new();

        for user in users {
            let output = self
                .client
                .list_user_tags()
                .user_name(user)
                .send()
                .await
                .map_err(|e| sdk_error("list_user_tags", e))?;

            let tags = output.tags().iter().map(|t| (t.key(), t.value()));
            match contact_from_tags(user, tags) {
                Ok(contact) => {
                    contacts.insert(user.clone(), contact);
                }
                Err(e) => debug!(user = %user, "{}", e),
            }
        }

        Ok(contacts)
    }

    async fn list_keys(
        &self,
        user: &str,
        contact: Option<&String>,
    ) -> Result<Vec<ManagedResource>, LifecycleError> {
        let mut keys = self
            .client
            .list_access_keys()
            .user_name(user)
            .into_paginator()
            .items()
            .send();
        let mut resources = Vec::new();

        while let Some(key) = keys
            .try_next()
            .await
            .map_err(|e| sdk_error("list_access_keys", e))?
        {
            let Some(key_id) = key.access_key_id() else {
                warn!(user = %user, "Access key without an ID, skipping");
                continue;
            };

            let last_used = self
                .client
                .get_access_key_last_used()
                .access_key_id(key_id)
                .send()
                .await
                .map_err(|e| sdk_error("get_access_key_last_used", e))?;

            let last_activity = resolve_last_activity(
                last_used
                    .access_key_last_used()
                    .and_then(|u| u.last_used_date()),
                key.create_date(),
            );

            resources.push(
                ManagedResource::new(ResourceKind::IamAccessKey, key_id, key_id, user)
                    .last_activity(last_activity)
                    .contact(contact.cloned())
                    .state(key_state(key.status())),
            );
        }

        Ok(resources)
    }

    async fn delete_user(&self, user: &str) -> Result<(), LifecycleError> {
        match self.client.delete_user().user_name(user).send().await {
            Ok(_) => {
                info!(user = %user, "IAM user deleted");
                Ok(())
            }
            Err(e) if error_code(&e) == Some(NO_SUCH_ENTITY) => {
                debug!(user = %user, "IAM user already deleted");
                Ok(())
            }
            Err(e) if error_code(&e) == Some(DELETE_CONFLICT) => {
                warn!(
                    user = %user,
                    "IAM user still owns other credentials or policies, keeping the user"
                );
                Ok(())
            }
            Err(e) => Err(sdk_error("delete_user", e)),
        }
    }
}

#[async_trait]
impl ResourceStore for IamKeyStore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::IamAccessKey
    }

    async fn list_resources(&self) -> Result<Vec<ManagedResource>, LifecycleError> {
        let users = self.list_user_names().await?;
        let contacts = self.contacts(&users).await?;

        info!(
            users = users.len(),
            with_contact = contacts.len(),
            "Listed IAM users"
        );

        let mut resources = Vec::new();
        for user in &users {
            resources.extend(self.list_keys(user, contacts.get(user)).await?);
        }

        info!(keys = resources.len(), "Listed IAM access keys");
        Ok(resources)
    }

    async fn disable(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError> {
        let result = self
            .client
            .update_access_key()
            .user_name(&resource.owner)
            .access_key_id(&resource.handle)
            .status(StatusType::Inactive)
            .send()
            .await;

        match result {
            Ok(_) => Ok(ActionOutcome::Applied),
            Err(e) if error_code(&e) == Some(NO_SUCH_ENTITY) => {
                debug!(key = %resource.handle, "Access key no longer exists");
                Ok(ActionOutcome::AlreadyApplied)
            }
            Err(e) => Err(sdk_error("update_access_key", e)),
        }
    }

    async fn delete(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError> {
        let result = self
            .client
            .delete_access_key()
            .user_name(&resource.owner)
            .access_key_id(&resource.handle)
            .send()
            .await;

        let outcome = match result {
            Ok(_) => ActionOutcome::Applied,
            Err(e) if error_code(&e) == Some(NO_SUCH_ENTITY) => {
                debug!(key = %resource.handle, "Access key already deleted");
                ActionOutcome::AlreadyApplied
            }
            Err(e) => return Err(sdk_error("delete_access_key", e)),
        };

        // The key is gone either way; its deletion must still be reported
        if let Err(e) = self.delete_user(&resource.owner).await {
            warn!(
                user = %resource.owner,
                key = %resource.handle,
                error = %e,
                "Access key deleted but its user could not be removed"
            );
        }
        Ok(outcome)
    }
}

/// Last use of a key, falling back to its creation date
pub fn resolve_last_activity(
    last_used: Option<&AwsDateTime>,
    created: Option<&AwsDateTime>,
) -> Option<DateTime<Utc>> {
    last_used.or(created).and_then(to_chrono)
}

/// Extract the contact address from a user's tags
pub fn contact_from_tags<'a>(
    user: &str,
    tags: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<String, LifecycleError> {
    tags.into_iter()
        .find(|(key, value)| *key == CONTACT_TAG && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
        .ok_or_else(|| LifecycleError::MissingContact(user.to_string()))
}

fn key_state(status: Option<&StatusType>) -> ResourceState {
    match status {
        Some(StatusType::Active) => ResourceState::Active,
        Some(StatusType::Inactive) => ResourceState::Disabled,
        _ => ResourceState::Unknown,
    }
}

fn to_chrono(at: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(at.secs(), at.subsec_nanos())
}

fn error_code<E: ProvideErrorMetadata, R>(err: &SdkError<E, R>) -> Option<&str> {
    err.as_service_error().and_then(|e| e.code())
}

fn sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> LifecycleError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    LifecycleError::remote(ResourceKind::IamAccessKey, operation, DisplayErrorContext(&err))
}
