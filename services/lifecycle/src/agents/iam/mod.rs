//! IAM Access Key Lifecycle
//!
//! Applies the inactivity policy to AWS IAM access keys:
//!
//! - **Fetch**: every user, every key, last-used date (creation date when the
//!   key was never used), and the owner's `email` tag
//! - **Disable**: key status → `Inactive`
//! - **Delete**: delete the key, then the owning user
//!
//! ## Security
//!
//! - No static credentials: the AWS default provider chain supplies them
//!   (environment, profile, IRSA, instance role)

pub mod store;

pub use store::IamKeyStore;
