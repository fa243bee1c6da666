//! Application error types.
//!
//! Errors fall into two groups: startup errors (`Config`, and the resolution
//! failures `NotFound`, `AmbiguousOwner`, `ProjectNotFound`) which end the
//! process, and per-cycle errors (`GitLabApi`, `Network`, `Dispatch`) which the
//! watchdog logs before moving on to the next tick.

use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration file is missing, malformed, or incomplete.
    #[error("Config error: {message}")]
    Config {
        message: String,
        field: Option<String>,
    },

    /// GitLab API returned a non-success status.
    ///
    /// `message` carries the raw response body.
    #[error("GitLab API error: {message}")]
    GitLabApi {
        message: String,
        status_code: Option<u16>,
        endpoint: Option<String>,
    },

    /// Network request failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// Username lookup did not yield exactly one account.
    #[error("Expected exactly one account named '{username}', found {matches}")]
    AmbiguousOwner { username: String, matches: usize },

    /// Owner exists but holds no project with the requested name.
    #[error("Project '{project}' not found under '{owner}'")]
    ProjectNotFound { owner: String, project: String },

    /// Notification command could not be run.
    #[error("Dispatch error: {message}")]
    Dispatch { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a config error naming the offending field.
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a GitLab API error with status code and endpoint.
    pub fn gitlab_api_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::GitLabApi {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: None,
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    pub fn ambiguous_owner(username: impl Into<String>, matches: usize) -> Self {
        Self::AmbiguousOwner {
            username: username.into(),
            matches,
        }
    }

    pub fn project_not_found(owner: impl Into<String>, project: impl Into<String>) -> Self {
        Self::ProjectNotFound {
            owner: owner.into(),
            project: project.into(),
        }
    }

    /// Create a dispatch error.
    pub fn dispatch(message: impl Into<String>) -> Self {
        Self::Dispatch {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// Conversions from common error types

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network("Failed to connect to server")
        } else if err.is_decode() {
            Self::internal(format!("Failed to parse response: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("Invalid TOML: {}", err))
    }
}
