//! MR Watchdog - flags stale GitLab merge requests and pings their authors.
//!
//! The binary in `main.rs` loads the config, resolves the watched project and
//! hands control to [`services::watchdog::Watchdog`].

pub mod config;
pub mod error;
pub mod models;
pub mod services;
