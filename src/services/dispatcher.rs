//! Notification dispatch.
//!
//! A stale merge request is turned into one command line by filling the
//! configured template, then handed to an [`ActionInvoker`]. Invokers report
//! failures as a [`DispatchOutcome`]; nothing here returns an error to the
//! watchdog loop.

use std::future::Future;
use std::process::Stdio;

use log::{info, warn};
use tokio::process::Command;

use crate::error::AppError;
use crate::models::merge_request::MergeRequest;

/// Replaced with the stale request author's username.
pub const USERNAME_PLACEHOLDER: &str = "{username}";

/// Replaced with the configured reminder message.
pub const MESSAGE_PLACEHOLDER: &str = "{message}";

/// Result of one notification.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Command ran and exited successfully; `output` is stdout followed by stderr.
    Success { output: String },

    /// Command could not be spawned or exited unsuccessfully.
    Failure { error: AppError },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Runs a rendered notification command.
pub trait ActionInvoker {
    fn invoke(&self, command: &str) -> impl Future<Output = DispatchOutcome> + Send;
}

/// Runs commands through `<shell> -c`, one child process per call.
#[derive(Debug, Clone)]
pub struct ShellInvoker {
    shell: String,
}

impl Default for ShellInvoker {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ShellInvoker {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl ActionInvoker for ShellInvoker {
    async fn invoke(&self, command: &str) -> DispatchOutcome {
        // kill_on_drop stays false: a child started before shutdown runs to completion.
        let result = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await;

        match result {
            Ok(output) => {
                let combined = combine_output(&output.stdout, &output.stderr);
                if output.status.success() {
                    DispatchOutcome::Success { output: combined }
                } else {
                    DispatchOutcome::Failure {
                        error: AppError::dispatch(format!(
                            "command exited with {}: {}",
                            output.status, combined
                        )),
                    }
                }
            }
            Err(e) => DispatchOutcome::Failure {
                error: AppError::dispatch(format!("failed to spawn {}: {}", self.shell, e)),
            },
        }
    }
}

/// Logs the command instead of running it.
#[derive(Debug, Clone, Default)]
pub struct DryRunInvoker;

impl ActionInvoker for DryRunInvoker {
    async fn invoke(&self, command: &str) -> DispatchOutcome {
        info!("[dry-run] would run: {}", command);
        DispatchOutcome::Success {
            output: String::new(),
        }
    }
}

/// Renders notification commands and hands them to an invoker.
#[derive(Debug, Clone)]
pub struct Dispatcher<I> {
    invoker: I,
    template: String,
    message: String,
}

impl<I: ActionInvoker> Dispatcher<I> {
    pub fn new(invoker: I, template: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            invoker,
            template: template.into(),
            message: message.into(),
        }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Fill the template for `username`. Substituted values are shell-quoted
    /// and never scanned for placeholders themselves.
    pub fn render(&self, username: &str) -> String {
        let username = shell_quote(username);
        let message = shell_quote(&self.message);
        self.template
            .split(USERNAME_PLACEHOLDER)
            .map(|part| part.replace(MESSAGE_PLACEHOLDER, &message))
            .collect::<Vec<_>>()
            .join(&username)
    }

    /// Notify the author of `mr`.
    pub async fn notify(&self, mr: &MergeRequest) -> DispatchOutcome {
        let command = self.render(&mr.author.username);
        let outcome = self.invoker.invoke(&command).await;

        match &outcome {
            DispatchOutcome::Success { output } => info!(
                "Notified {} about !{} ({}): {}",
                mr.author.username,
                mr.iid,
                mr.web_url,
                output.trim_end()
            ),
            DispatchOutcome::Failure { error } => warn!(
                "Failed to notify {} about !{}: {}",
                mr.author.username, mr.iid, error
            ),
        }

        outcome
    }
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut combined = String::from_utf8_lossy(stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(stderr));
    combined.trim_end().to_string()
}

/// Quote `value` for a POSIX shell unless it is made only of safe characters.
fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.@%+=:,/".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}
