//! Watchdog configuration, loaded from `config.toml`.
//!
//! The file is first deserialized into an all-optional raw form so missing
//! fields can be reported by name, then validated into [`WatchdogConfig`].

use std::path::Path;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::owner::{Owner, OwnerKind};
use crate::services::dispatcher::USERNAME_PLACEHOLDER;
use crate::services::staleness::{ActiveWindow, Thresholds};

/// Default HTTP timeout for GitLab requests.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Reminder text substituted for `{message}` when none is configured.
pub const DEFAULT_REMINDER_MESSAGE: &str = "Your merge request is still opened, please check it!";

/// How often the same stale request may be notified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Notify on every cycle in which the request is stale.
    #[default]
    EveryCycle,

    /// Notify once, then again only after the request's `updated_at` moves.
    OncePerUpdate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    gitlab: RawGitLab,
    #[serde(default)]
    timeout: RawTimeout,
    #[serde(default)]
    watchdog: RawWatchdog,
    #[serde(default)]
    action: RawAction,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGitLab {
    host: Option<String>,
    owner_kind: Option<OwnerKind>,
    owner: Option<String>,
    project: Option<String>,
    token: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimeout {
    created_minutes: Option<f64>,
    updated_minutes: Option<f64>,
    active_start: Option<String>,
    active_end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWatchdog {
    interval_secs: Option<u64>,
    repeat: Option<RepeatPolicy>,
    skip_work_in_progress: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAction {
    command: Option<String>,
    message: Option<String>,
}

/// GitLab connection settings.
#[derive(Debug, Clone)]
pub struct GitLabSettings {
    /// Base URL of the GitLab instance (e.g., `https://gitlab.com`).
    pub host: String,
    pub owner: Owner,
    pub project: String,
    /// Personal access token sent as `PRIVATE-TOKEN`.
    pub token: String,
    pub request_timeout_secs: u64,
}

/// Notification command settings.
#[derive(Debug, Clone)]
pub struct ActionSettings {
    /// Shell command template; must contain `{username}`.
    pub command: String,
    pub message: String,
}

/// Validated watchdog configuration.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub gitlab: GitLabSettings,
    pub thresholds: Thresholds,
    pub active_window: Option<ActiveWindow>,
    pub interval_secs: u64,
    pub repeat: RepeatPolicy,
    pub skip_work_in_progress: bool,
    pub action: ActionSettings,
}

impl WatchdogConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(text: &str) -> Result<Self, AppError> {
        let raw: RawConfig = toml::from_str(text)?;
        raw.validate()
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::config_field(format!("{} is required", field), field))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    let value = required(value, field)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::config_field(
            format!("{} must not be empty", field),
            field,
        ));
    }
    Ok(trimmed.to_string())
}

fn threshold(value: Option<f64>, field: &str) -> Result<f64, AppError> {
    let minutes = required(value, field)?;
    if !minutes.is_finite() || minutes < 0.0 {
        return Err(AppError::config_field(
            format!("{} must be a non-negative number of minutes", field),
            field,
        ));
    }
    Ok(minutes)
}

fn time_of_day(value: &str, field: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        AppError::config_field(
            format!("{} must be HH:MM, got '{}'", field, value),
            field,
        )
    })
}

impl RawConfig {
    fn validate(self) -> Result<WatchdogConfig, AppError> {
        let host = required_text(self.gitlab.host, "gitlab.host")?;
        let owner_kind = required(self.gitlab.owner_kind, "gitlab.owner_kind")?;
        let owner_name = required_text(self.gitlab.owner, "gitlab.owner")?;
        let project = required_text(self.gitlab.project, "gitlab.project")?;
        let token = required_text(self.gitlab.token, "gitlab.token")?;

        let request_timeout_secs = self
            .gitlab
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if request_timeout_secs == 0 {
            return Err(AppError::config_field(
                "gitlab.request_timeout_secs must be greater than 0",
                "gitlab.request_timeout_secs",
            ));
        }

        let thresholds = Thresholds {
            created_minutes: threshold(self.timeout.created_minutes, "timeout.created_minutes")?,
            updated_minutes: threshold(self.timeout.updated_minutes, "timeout.updated_minutes")?,
        };

        let active_window = match (self.timeout.active_start, self.timeout.active_end) {
            (None, None) => None,
            (Some(start), Some(end)) => {
                let start = time_of_day(&start, "timeout.active_start")?;
                let end = time_of_day(&end, "timeout.active_end")?;
                // Overnight windows are not supported.
                if end <= start {
                    return Err(AppError::config_field(
                        format!(
                            "timeout.active_end ({}) must be later than timeout.active_start ({})",
                            end.format("%H:%M"),
                            start.format("%H:%M")
                        ),
                        "timeout.active_end",
                    ));
                }
                Some(ActiveWindow { start, end })
            }
            (Some(_), None) => {
                return Err(AppError::config_field(
                    "timeout.active_end is required when timeout.active_start is set",
                    "timeout.active_end",
                ))
            }
            (None, Some(_)) => {
                return Err(AppError::config_field(
                    "timeout.active_start is required when timeout.active_end is set",
                    "timeout.active_start",
                ))
            }
        };

        let interval_secs = required(self.watchdog.interval_secs, "watchdog.interval_secs")?;
        if interval_secs == 0 {
            return Err(AppError::config_field(
                "watchdog.interval_secs must be greater than 0",
                "watchdog.interval_secs",
            ));
        }

        let command = required_text(self.action.command, "action.command")?;
        if !command.contains(USERNAME_PLACEHOLDER) {
            return Err(AppError::config_field(
                format!("action.command must contain {}", USERNAME_PLACEHOLDER),
                "action.command",
            ));
        }

        Ok(WatchdogConfig {
            gitlab: GitLabSettings {
                host,
                owner: Owner::new(owner_kind, owner_name),
                project,
                token,
                request_timeout_secs,
            },
            thresholds,
            active_window,
            interval_secs,
            repeat: self.watchdog.repeat.unwrap_or_default(),
            skip_work_in_progress: self.watchdog.skip_work_in_progress.unwrap_or(false),
            action: ActionSettings {
                command,
                message: self
                    .action
                    .message
                    .unwrap_or_else(|| DEFAULT_REMINDER_MESSAGE.to_string()),
            },
        })
    }
}
