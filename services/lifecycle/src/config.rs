//! Environment Configuration
//!
//! Every credential and endpoint is injected through the environment; there
//! are no compiled-in defaults for secrets or servers. Threshold values are
//! required and parsed before any remote call is made.

use std::env;

use crate::agents::inactivity::types::{LifecycleError, ThresholdConfig};

pub const DISABLE_IN_DAYS: &str = "DISABLE_IN_DAYS";
pub const DELETE_IN_DAYS: &str = "DELETE_IN_DAYS";
pub const WARN_BEFORE_DAYS: &str = "WARN_BEFORE_DAYS";

pub const TABLEAU_SERVER_URL: &str = "TABLEAU_SERVER_URL";
pub const TABLEAU_TOKEN_NAME: &str = "TABLEAU_TOKEN_NAME";
pub const TABLEAU_TOKEN_VALUE: &str = "TABLEAU_TOKEN_VALUE";
pub const TABLEAU_SITE: &str = "TABLEAU_SITE";
pub const TABLEAU_VERIFY_TLS: &str = "TABLEAU_VERIFY_TLS";
pub const TABLEAU_API_VERSION: &str = "TABLEAU_API_VERSION";

pub const NOTIFY_WEBHOOK_URL: &str = "NOTIFY_WEBHOOK_URL";

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, LifecycleError> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| LifecycleError::Configuration(format!("{key} must be set")))
}

fn parse_days(key: &str, raw: &str) -> Result<u32, LifecycleError> {
    raw.parse::<u32>().map_err(|_| {
        LifecycleError::Configuration(format!(
            "{key} must be a non-negative whole number of days, got {raw:?}"
        ))
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, LifecycleError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(LifecycleError::Configuration(format!(
            "{key} must be true or false, got {other:?}"
        ))),
    }
}

impl ThresholdConfig {
    /// Load thresholds from `DISABLE_IN_DAYS`, `DELETE_IN_DAYS` and the
    /// optional `WARN_BEFORE_DAYS`
    pub fn from_env() -> Result<Self, LifecycleError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load thresholds through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LifecycleError> {
        let disable = parse_days(DISABLE_IN_DAYS, &required(&lookup, DISABLE_IN_DAYS)?)?;
        let delete = parse_days(DELETE_IN_DAYS, &required(&lookup, DELETE_IN_DAYS)?)?;

        let mut config = ThresholdConfig::new(disable, delete);

        if let Some(raw) = lookup(WARN_BEFORE_DAYS).filter(|v| !v.trim().is_empty()) {
            let warn_before = parse_days(WARN_BEFORE_DAYS, raw.trim())?;
            if warn_before == 0 {
                return Err(LifecycleError::Configuration(format!(
                    "{WARN_BEFORE_DAYS} must be at least 1"
                )));
            }
            config = config.with_warn_before_days(warn_before);
        }

        Ok(config)
    }
}

/// Tableau Server connection settings
#[derive(Clone)]
pub struct TableauConfig {
    /// Server base URL (e.g. `https://tableau.example.com`)
    pub server_url: String,
    /// Personal access token name
    pub token_name: String,
    /// Personal access token secret
    pub token_value: String,
    /// Site content URL; empty selects the default site
    pub site: String,
    /// Verify the server's TLS certificate
    pub verify_tls: bool,
    /// REST API version; discovered from the server when unset
    pub api_version: Option<String>,
}

impl std::fmt::Debug for TableauConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableauConfig")
            .field("server_url", &self.server_url)
            .field("token_name", &self.token_name)
            .field("token_value", &"<redacted>")
            .field("site", &self.site)
            .field("verify_tls", &self.verify_tls)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl TableauConfig {
    /// Load Tableau settings from the environment
    pub fn from_env() -> Result<Self, LifecycleError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load Tableau settings through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LifecycleError> {
        let verify_tls = match lookup(TABLEAU_VERIFY_TLS) {
            Some(raw) if !raw.trim().is_empty() => parse_bool(TABLEAU_VERIFY_TLS, &raw)?,
            _ => true,
        };

        Ok(Self {
            server_url: required(&lookup, TABLEAU_SERVER_URL)?
                .trim_end_matches('/')
                .to_string(),
            token_name: required(&lookup, TABLEAU_TOKEN_NAME)?,
            token_value: required(&lookup, TABLEAU_TOKEN_VALUE)?,
            site: lookup(TABLEAU_SITE).unwrap_or_default().trim().to_string(),
            verify_tls,
            api_version: lookup(TABLEAU_API_VERSION)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

/// Webhook URL for notifications, if configured
pub fn webhook_url_from_env() -> Option<String> {
    env::var(NOTIFY_WEBHOOK_URL)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
