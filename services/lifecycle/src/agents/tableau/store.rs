//! Tableau User Store
//!
//! Exposes Tableau site users as lifecycle resources. One REST session is
//! opened lazily on first use and shared by every call in the run; it is
//! signed out by [`ResourceStore::release`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{TableauClient, TableauSession, TableauUser, UNLICENSED_ROLE};
use crate::agents::inactivity::policy::is_inactive;
use crate::agents::inactivity::store::ResourceStore;
use crate::agents::inactivity::types::{
    ActionOutcome, LifecycleError, ManagedResource, ResourceKind, ResourceState, ThresholdConfig,
};
use crate::config::TableauConfig;

/// Tableau-backed resource store for site users
pub struct TableauUserStore {
    client: TableauClient,
    session: Mutex<Option<Arc<TableauSession>>>,
}

impl TableauUserStore {
    /// Create a store; no request is made until the first operation
    pub fn new(config: TableauConfig) -> Result<Self, LifecycleError> {
        Ok(Self::from_client(TableauClient::new(config)?))
    }

    pub fn from_client(client: TableauClient) -> Self {
        Self {
            client,
            session: Mutex::new(None),
        }
    }

    /// Current session, signing in on first use
    async fn session(&self) -> Result<Arc<TableauSession>, LifecycleError> {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        let session = Arc::new(self.client.sign_in().await?);
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Users whose last sign-in is at least `disable_after_days` old
    ///
    /// Users who never signed in are not reported.
    pub async fn list_inactive_users(
        &self,
        config: &ThresholdConfig,
        now: DateTime<Utc>,
    ) -> Result<Vec<ManagedResource>, LifecycleError> {
        let users = self.list_resources().await?;
        let total = users.len();

        let inactive: Vec<_> = users
            .into_iter()
            .filter(|u| is_inactive(u.last_activity, now, config))
            .collect();

        info!(
            total = total,
            inactive = inactive.len(),
            disable_after_days = config.disable_after_days,
            "Listed inactive Tableau users"
        );
        Ok(inactive)
    }

    /// Create a user, returning the existing one if the name is taken
    pub async fn create_user(
        &self,
        username: &str,
        site_role: &str,
    ) -> Result<ManagedResource, LifecycleError> {
        let session = self.session().await?;

        if let Some(existing) = self.client.find_user(&session, username).await? {
            info!(user = %username, role = %existing.site_role, "Tableau user already exists");
            return Ok(to_resource(existing));
        }

        let created = self.client.add_user(&session, username, site_role).await?;
        Ok(to_resource(created))
    }
}

#[async_trait]
impl ResourceStore for TableauUserStore {
    fn kind(&self) -> ResourceKind {
        ResourceKind::TableauUser
    }

    async fn list_resources(&self) -> Result<Vec<ManagedResource>, LifecycleError> {
        let session = self.session().await?;
        let users = self.client.list_users(&session).await?;

        info!(
            server = %self.client.server_url(),
            site_id = %session.site_id(),
            users = users.len(),
            "Listed Tableau users"
        );

        Ok(users.into_iter().map(to_resource).collect())
    }

    async fn disable(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError> {
        let session = self.session().await?;

        match self
            .client
            .update_site_role(&session, &resource.handle, UNLICENSED_ROLE)
            .await?
        {
            Some(()) => {
                info!(user = %resource.id, "Tableau user unlicensed");
                Ok(ActionOutcome::Applied)
            }
            None => {
                debug!(user = %resource.id, "Tableau user no longer exists");
                Ok(ActionOutcome::AlreadyApplied)
            }
        }
    }

    async fn delete(&self, resource: &ManagedResource) -> Result<ActionOutcome, LifecycleError> {
        let session = self.session().await?;

        if self.client.remove_user(&session, &resource.handle).await? {
            info!(user = %resource.id, "Tableau user removed");
            Ok(ActionOutcome::Applied)
        } else {
            debug!(user = %resource.id, "Tableau user already removed");
            Ok(ActionOutcome::AlreadyApplied)
        }
    }

    async fn release(&self) -> Result<(), LifecycleError> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };

        match Arc::try_unwrap(session) {
            Ok(session) => self.client.sign_out(session).await,
            Err(_) => {
                warn!("Tableau session still in use at release; leaving sign-out to drop");
                Ok(())
            }
        }
    }
}

/// Map a REST user onto a lifecycle resource
///
/// The username is the stable identifier in reports and notices; the LUID is
/// the handle used for mutations.
pub fn to_resource(user: TableauUser) -> ManagedResource {
    let state = if user.is_unlicensed() {
        ResourceState::Disabled
    } else {
        ResourceState::Active
    };
    let contact = user
        .email
        .filter(|e| !e.trim().is_empty())
        .or_else(|| user.name.contains('@').then(|| user.name.clone()));

    ManagedResource::new(ResourceKind::TableauUser, &user.name, &user.id, &user.name)
        .last_activity(user.last_login)
        .contact(contact)
        .state(state)
}
