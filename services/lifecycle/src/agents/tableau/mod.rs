//! Tableau User Lifecycle
//!
//! Applies the inactivity policy to Tableau Server site users:
//!
//! - **Fetch**: every site user with role, email and last sign-in
//! - **Disable**: site role → `Unlicensed`
//! - **Delete**: remove the user from the site
//!
//! Also provides the inactive-user report and idempotent user creation.
//!
//! ## Security
//!
//! - Personal access token only, injected through the environment
//! - One session per run, signed out when the run ends

pub mod client;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{TableauClient, TableauSession, TableauUser, DEFAULT_SITE_ROLE, UNLICENSED_ROLE};
pub use store::TableauUserStore;
