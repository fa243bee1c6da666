//! Merge request model.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Author of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MergeRequestAuthor {
    /// Display name.
    pub name: String,

    /// Handle passed to the notification command.
    pub username: String,
}

/// Snapshot of an open merge request taken during one poll.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MergeRequest {
    /// Project-scoped MR number.
    pub iid: i64,

    /// MR title.
    pub title: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Draft/WIP flag. Older GitLab versions may omit it.
    #[serde(default)]
    pub work_in_progress: bool,

    /// Web URL for the MR.
    pub web_url: String,

    pub author: MergeRequestAuthor,
}
