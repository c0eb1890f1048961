//! Tableau REST API Client
//!
//! Thin wrapper over the Tableau Server REST API (JSON flavour): PAT sign-in
//! and sign-out, user listing with pagination, and user create/update/remove.

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agents::inactivity::types::{LifecycleError, ResourceKind};
use crate::config::TableauConfig;

/// REST version used only to discover the server's own version
const DISCOVERY_API_VERSION: &str = "2.4";

/// Users requested per page
const PAGE_SIZE: u32 = 100;

const AUTH_HEADER: &str = "X-Tableau-Auth";

/// Site role that keeps the account but removes its license
pub const UNLICENSED_ROLE: &str = "Unlicensed";

/// Role given to newly created users unless told otherwise
pub const DEFAULT_SITE_ROLE: &str = "Creator";

// ============================================================
// API Types
// ============================================================

#[derive(Debug, Serialize)]
struct SignInRequest<'a> {
    credentials: PatCredentials<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PatCredentials<'a> {
    personal_access_token_name: &'a str,
    personal_access_token_secret: &'a str,
    site: SiteRef<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SiteRef<'a> {
    content_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInResponse {
    credentials: SignInCredentials,
}

#[derive(Debug, Deserialize)]
struct SignInCredentials {
    token: String,
    site: SiteInfo,
}

#[derive(Debug, Deserialize)]
struct SiteInfo {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    server_info: ServerInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfo {
    rest_api_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(deserialize_with = "count")]
    page_number: u32,
    #[serde(deserialize_with = "count")]
    total_available: u32,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    pagination: Pagination,
    #[serde(default)]
    users: UserList,
}

#[derive(Debug, Default, Deserialize)]
struct UserList {
    #[serde(default)]
    user: Vec<TableauUser>,
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: TableauUser,
}

#[derive(Debug, Serialize)]
struct UserRequest<'a> {
    user: UserFields<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    site_role: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    detail: String,
}

/// A user as returned by the REST API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableauUser {
    /// User LUID
    pub id: String,
    /// Username
    pub name: String,
    pub site_role: String,
    /// Absent when the user never signed in
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub email: Option<String>,
}

impl TableauUser {
    /// Whether the user has been unlicensed
    pub fn is_unlicensed(&self) -> bool {
        self.site_role.eq_ignore_ascii_case(UNLICENSED_ROLE)
    }
}

/// Tableau paginates counts as strings; accept either form
fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u32),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(n) => Ok(n),
        Count::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

// ============================================================
// Session
// ============================================================

/// Signed-in REST session
///
/// Call [`TableauClient::sign_out`] when done. A session dropped without
/// signing out is signed out in the background on a best-effort basis.
pub struct TableauSession {
    token: String,
    site_id: String,
    api_base: String,
    http_client: Client,
    released: bool,
}

impl TableauSession {
    /// Site LUID the session is scoped to
    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    fn users_url(&self) -> String {
        format!("{}/sites/{}/users", self.api_base, self.site_id)
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/{}", self.users_url(), user_id)
    }

    fn sign_out_url(&self) -> String {
        format!("{}/auth/signout", self.api_base)
    }
}

impl Drop for TableauSession {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("Tableau session dropped outside a runtime; token left to expire");
            return;
        };

        debug!("Tableau session dropped without sign-out, signing out in background");
        let request = self
            .http_client
            .post(self.sign_out_url())
            .header(AUTH_HEADER, self.token.clone());
        handle.spawn(async move {
            if let Err(e) = request.send().await {
                warn!(error = %e, "Background Tableau sign-out failed");
            }
        });
    }
}

// ============================================================
// Client Implementation
// ============================================================

/// Tableau REST API client
pub struct TableauClient {
    http_client: Client,
    config: TableauConfig,
}

impl TableauClient {
    /// Create a new client
    pub fn new(config: TableauConfig) -> Result<Self, LifecycleError> {
        if !config.verify_tls {
            warn!(server = %config.server_url, "TLS certificate verification disabled");
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("lornu-lifecycle/0.1.0")
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| LifecycleError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http_client, config })
    }

    /// Get the configured server URL
    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }

    /// REST API version to use: configured, or reported by the server
    async fn api_version(&self) -> Result<String, LifecycleError> {
        if let Some(version) = &self.config.api_version {
            return Ok(version.clone());
        }

        let url = format!(
            "{}/api/{}/serverinfo",
            self.config.server_url, DISCOVERY_API_VERSION
        );

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| remote("serverinfo", e))?;

        let info: ServerInfoResponse = check(response, "serverinfo")
            .await?
            .json()
            .await
            .map_err(|e| remote("serverinfo", e))?;

        debug!(version = %info.server_info.rest_api_version, "Discovered REST API version");
        Ok(info.server_info.rest_api_version)
    }

    /// Sign in with the personal access token
    pub async fn sign_in(&self) -> Result<TableauSession, LifecycleError> {
        let version = self.api_version().await?;
        let api_base = format!("{}/api/{}", self.config.server_url, version);

        let request = SignInRequest {
            credentials: PatCredentials {
                personal_access_token_name: &self.config.token_name,
                personal_access_token_secret: &self.config.token_value,
                site: SiteRef {
                    content_url: &self.config.site,
                },
            },
        };

        let response = self
            .http_client
            .post(format!("{}/auth/signin", api_base))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| remote("signin", e))?;

        let signed_in: SignInResponse = check(response, "signin")
            .await?
            .json()
            .await
            .map_err(|e| remote("signin", e))?;

        info!(
            server = %self.config.server_url,
            site = %self.config.site,
            token_name = %self.config.token_name,
            "Signed in to Tableau"
        );

        Ok(TableauSession {
            token: signed_in.credentials.token,
            site_id: signed_in.credentials.site.id,
            api_base,
            http_client: self.http_client.clone(),
            released: false,
        })
    }

    /// Sign out and invalidate the session token
    pub async fn sign_out(&self, mut session: TableauSession) -> Result<(), LifecycleError> {
        session.released = true;

        let response = self
            .http_client
            .post(session.sign_out_url())
            .header(AUTH_HEADER, &session.token)
            .send()
            .await
            .map_err(|e| remote("signout", e))?;

        check(response, "signout").await?;
        debug!("Signed out of Tableau");
        Ok(())
    }

    /// List every user on the site
    pub async fn list_users(&self, session: &TableauSession) -> Result<Vec<TableauUser>, LifecycleError> {
        let mut users = Vec::new();
        let mut page_number = 1;

        loop {
            let page_size = PAGE_SIZE.to_string();
            let page = page_number.to_string();
            let response = self
                .http_client
                .get(session.users_url())
                .header(AUTH_HEADER, &session.token)
                .header(reqwest::header::ACCEPT, "application/json")
                .query(&[
                    ("pageSize", page_size.as_str()),
                    ("pageNumber", page.as_str()),
                    ("fields", "_all_"),
                ])
                .send()
                .await
                .map_err(|e| remote("list_users", e))?;

            let body: UsersPage = check(response, "list_users")
                .await?
                .json()
                .await
                .map_err(|e| remote("list_users", e))?;

            let received = body.users.user.len();
            users.extend(body.users.user);

            debug!(
                page = body.pagination.page_number,
                received = received,
                total = body.pagination.total_available,
                "Fetched user page"
            );

            if !has_more(received, users.len(), body.pagination.total_available) {
                break;
            }
            page_number += 1;
        }

        Ok(users)
    }

    /// Look up a user by exact username
    pub async fn find_user(
        &self,
        session: &TableauSession,
        name: &str,
    ) -> Result<Option<TableauUser>, LifecycleError> {
        let url = format!(
            "{}?filter=name:eq:{}",
            session.users_url(),
            urlencoding::encode(name)
        );

        let response = self
            .http_client
            .get(&url)
            .header(AUTH_HEADER, &session.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| remote("find_user", e))?;

        let body: UsersPage = check(response, "find_user")
            .await?
            .json()
            .await
            .map_err(|e| remote("find_user", e))?;

        Ok(body.users.user.into_iter().find(|u| u.name == name))
    }

    /// Add a user to the site
    pub async fn add_user(
        &self,
        session: &TableauSession,
        name: &str,
        site_role: &str,
    ) -> Result<TableauUser, LifecycleError> {
        let request = UserRequest {
            user: UserFields {
                name: Some(name),
                site_role,
            },
        };

        let response = self
            .http_client
            .post(session.users_url())
            .header(AUTH_HEADER, &session.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| remote("add_user", e))?;

        let created: UserEnvelope = check(response, "add_user")
            .await?
            .json()
            .await
            .map_err(|e| remote("add_user", e))?;

        info!(user = %name, role = %site_role, "Tableau user created");
        Ok(created.user)
    }

    /// Change a user's site role; `None` when the user no longer exists
    pub async fn update_site_role(
        &self,
        session: &TableauSession,
        user_id: &str,
        site_role: &str,
    ) -> Result<Option<()>, LifecycleError> {
        let request = UserRequest {
            user: UserFields {
                name: None,
                site_role,
            },
        };

        let response = self
            .http_client
            .put(session.user_url(user_id))
            .header(AUTH_HEADER, &session.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| remote("update_user", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        check(response, "update_user").await?;
        Ok(Some(()))
    }

    /// Remove a user from the site; `false` when the user was already gone
    pub async fn remove_user(
        &self,
        session: &TableauSession,
        user_id: &str,
    ) -> Result<bool, LifecycleError> {
        let response = self
            .http_client
            .delete(session.user_url(user_id))
            .header(AUTH_HEADER, &session.token)
            .send()
            .await
            .map_err(|e| remote("remove_user", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        check(response, "remove_user").await?;
        Ok(true)
    }
}

/// Whether another page should be requested
fn has_more(received: usize, fetched: usize, total_available: u32) -> bool {
    received > 0 && fetched < total_available as usize
}

fn remote(operation: &'static str, err: impl std::fmt::Display) -> LifecycleError {
    LifecycleError::remote(ResourceKind::TableauUser, operation, err)
}

/// Turn a non-success response into a `RemoteStore` error
async fn check(response: Response, operation: &'static str) -> Result<Response, LifecycleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(remote(operation, describe_error(status, &body)))
}

fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => format!(
            "{} {} ({}): {}",
            status, envelope.error.summary, envelope.error.code, envelope.error.detail
        ),
        Err(_) => format!("{}: {}", status, body),
    }
}
