//! Watchdog loop.
//!
//! Resolves the project once, then on every tick fetches the open merge
//! requests, picks out the stale ones and notifies their authors.
//!
//! - One task drives the loop; a cycle finishes before the next tick is awaited.
//! - Ticks missed while a cycle runs are skipped, never queued.
//! - A failed fetch or notification is logged and the loop carries on.
//! - Shutdown is observed between cycles only; a second interrupt exits at once.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use log::{debug, error, info, warn};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{RepeatPolicy, WatchdogConfig};
use crate::error::AppError;
use crate::models::merge_request::MergeRequest;
use crate::models::owner::Owner;
use crate::models::project::Project;
use crate::services::dispatcher::{ActionInvoker, Dispatcher};
use crate::services::gitlab_client::SourceControl;
use crate::services::resolver;
use crate::services::staleness::{in_active_window, ActiveWindow, StalenessPolicy};

/// Lifecycle of the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogState {
    Starting,
    Resolving,
    Ready,
    Gated,
    Cycling,
    Stopped,
}

/// Evaluation and scheduling settings.
#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    pub policy: StalenessPolicy,
    pub active_window: Option<ActiveWindow>,
    pub interval: Duration,
    pub repeat: RepeatPolicy,
}

impl From<&WatchdogConfig> for WatchdogSettings {
    fn from(config: &WatchdogConfig) -> Self {
        Self {
            policy: StalenessPolicy {
                thresholds: config.thresholds,
                skip_work_in_progress: config.skip_work_in_progress,
            },
            active_window: config.active_window,
            interval: Duration::from_secs(config.interval_secs),
            repeat: config.repeat,
        }
    }
}

/// Counts from one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Open merge requests fetched.
    pub open: usize,

    /// Requests that exceeded both thresholds.
    pub stale: usize,

    /// Stale requests skipped because they were already notified.
    pub suppressed: usize,

    /// Successful notifications.
    pub notified: usize,

    /// Failed notifications.
    pub failed: usize,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Outside the active window; nothing fetched.
    Gated,

    /// The fetch failed; the cycle was skipped.
    FetchFailed { error: String },

    Completed(CycleReport),
}

/// In-memory record of which request versions were already notified.
///
/// Keyed by IID, storing the `updated_at` seen at notification time.
#[derive(Debug, Default)]
pub struct NotificationHistory {
    notified: HashMap<i64, DateTime<Utc>>,
}

impl NotificationHistory {
    pub fn should_notify(&self, mr: &MergeRequest) -> bool {
        self.notified.get(&mr.iid) != Some(&mr.updated_at)
    }

    pub fn record(&mut self, mr: &MergeRequest) {
        self.notified.insert(mr.iid, mr.updated_at);
    }

    /// Forget requests that are no longer open.
    pub fn retain_open(&mut self, open: &[MergeRequest]) {
        self.notified
            .retain(|iid, _| open.iter().any(|mr| mr.iid == *iid));
    }

    pub fn len(&self) -> usize {
        self.notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notified.is_empty()
    }
}

/// The polling engine.
pub struct Watchdog<S, I> {
    client: S,
    project: Project,
    dispatcher: Dispatcher<I>,
    settings: WatchdogSettings,
    history: NotificationHistory,
    state: WatchdogState,
    cycles: u64,
}

impl<S: SourceControl, I: ActionInvoker> Watchdog<S, I> {
    /// Resolve the project and return a watchdog ready to tick.
    ///
    /// A resolution error is returned as-is; the caller treats it as fatal.
    pub async fn start(
        client: S,
        owner: &Owner,
        project_name: &str,
        dispatcher: Dispatcher<I>,
        settings: WatchdogSettings,
    ) -> Result<Self, AppError> {
        debug!("Watchdog state: {:?}", WatchdogState::Starting);
        info!("Resolving project '{}' of {}", project_name, owner);
        debug!("Watchdog state: {:?}", WatchdogState::Resolving);

        let project = resolver::resolve(&client, owner, project_name).await?;

        Ok(Self::with_project(client, project, dispatcher, settings))
    }

    /// Build a watchdog around an already resolved project.
    pub fn with_project(
        client: S,
        project: Project,
        dispatcher: Dispatcher<I>,
        settings: WatchdogSettings,
    ) -> Self {
        Self {
            client,
            project,
            dispatcher,
            settings,
            history: NotificationHistory::default(),
            state: WatchdogState::Ready,
            cycles: 0,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    /// Number of cycles that got past the active-window gate.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn dispatcher(&self) -> &Dispatcher<I> {
        &self.dispatcher
    }

    pub fn history(&self) -> &NotificationHistory {
        &self.history
    }

    /// Handle one tick at local time `now`.
    pub async fn tick(&mut self, now: DateTime<Local>) -> CycleOutcome {
        let outcome = if in_active_window(now.time(), self.settings.active_window.as_ref()) {
            self.state = WatchdogState::Cycling;
            self.run_cycle(now.with_timezone(&Utc)).await
        } else {
            self.state = WatchdogState::Gated;
            info!("Not in active window, skipping");
            CycleOutcome::Gated
        };

        self.state = WatchdogState::Ready;
        outcome
    }

    /// Fetch, evaluate, and dispatch.
    async fn run_cycle(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        self.cycles += 1;
        let cycle = self.cycles;
        info!(
            "Cycle #{}: checking open merge requests of '{}' (id {})",
            cycle, self.project.name, self.project.id
        );

        let requests = match self.client.open_merge_requests(self.project.id).await {
            Ok(requests) => requests,
            Err(e) => {
                error!("Cycle #{}: failed to fetch merge requests: {}", cycle, e);
                return CycleOutcome::FetchFailed {
                    error: e.to_string(),
                };
            }
        };

        self.history.retain_open(&requests);

        // Evaluate everything before any dispatch runs.
        let policy = self.settings.policy;
        let stale: Vec<&MergeRequest> = requests
            .iter()
            .filter(|mr| policy.is_stale(mr, now))
            .collect();

        let mut report = CycleReport {
            open: requests.len(),
            stale: stale.len(),
            ..Default::default()
        };

        for mr in stale {
            if self.settings.repeat == RepeatPolicy::OncePerUpdate
                && !self.history.should_notify(mr)
            {
                debug!("!{} was already notified at this revision", mr.iid);
                report.suppressed += 1;
                continue;
            }

            if self.dispatcher.notify(mr).await.is_success() {
                report.notified += 1;
                if self.settings.repeat == RepeatPolicy::OncePerUpdate {
                    self.history.record(mr);
                }
            } else {
                report.failed += 1;
            }
        }

        info!(
            "Cycle #{}: {} open, {} stale, {} notified, {} failed, {} suppressed",
            cycle, report.open, report.stale, report.notified, report.failed, report.suppressed
        );

        CycleOutcome::Completed(report)
    }

    /// Tick every `interval` until `shutdown` is cancelled.
    ///
    /// The first tick fires immediately. Returns the stopped watchdog.
    pub async fn run(mut self, shutdown: CancellationToken) -> Self {
        let mut interval = time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Watching project '{}' (id {}) every {}s",
            self.project.name,
            self.project.id,
            self.settings.interval.as_secs()
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    self.tick(Local::now()).await;
                }
            }
        }

        self.state = WatchdogState::Stopped;
        warn!("Watchdog stopped after {} cycle(s)", self.cycles);
        self
    }
}

/// Cancel `shutdown` on the first interrupt, then return on the second.
///
/// `next_interrupt` is called once per awaited signal. Returning lets the
/// caller exit without waiting for a stuck cycle.
pub async fn handle_interrupts<F, Fut>(
    mut next_interrupt: F,
    shutdown: CancellationToken,
) -> io::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<()>>,
{
    next_interrupt().await?;
    warn!("Received SIGINT. Exiting after the current cycle; press Ctrl-C again to exit now.");
    shutdown.cancel();

    next_interrupt().await?;
    warn!("Received second SIGINT. Exiting immediately.");
    Ok(())
}
