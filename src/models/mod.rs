//! Data models for the application.
//!
//! These mirror the GitLab API payloads the watchdog reads.

pub mod merge_request;
pub mod owner;
pub mod project;

// Re-exports for convenient access
pub use merge_request::{MergeRequest, MergeRequestAuthor};
pub use owner::{Owner, OwnerKind};
pub use project::Project;
