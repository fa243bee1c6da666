//! GitLab project model.

use serde::Deserialize;

/// A GitLab project as returned by the project listing endpoints.
///
/// Once the watchdog has resolved its project this value is never replaced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Project {
    /// GitLab project ID.
    pub id: i64,

    /// Short project name (e.g., "GitLab").
    pub name: String,
}
