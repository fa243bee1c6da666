//! Business logic services.
//!
//! `watchdog` drives the loop; everything else is a leaf it calls into.

pub mod dispatcher;
pub mod gitlab_client;
pub mod resolver;
pub mod staleness;
pub mod watchdog;

pub use dispatcher::{ActionInvoker, DispatchOutcome, Dispatcher, DryRunInvoker, ShellInvoker};
pub use gitlab_client::{GitLabClient, GitLabClientConfig, SourceControl};
pub use watchdog::{
    handle_interrupts, CycleOutcome, CycleReport, Watchdog, WatchdogSettings, WatchdogState,
};
