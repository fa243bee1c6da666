use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{CommandFactory, Parser};
use log::error;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use mr_watchdog_lib::config::WatchdogConfig;
use mr_watchdog_lib::error::AppError;
use mr_watchdog_lib::models::{Owner, OwnerKind};
use mr_watchdog_lib::services::{
    handle_interrupts, ActionInvoker, Dispatcher, DryRunInvoker, GitLabClient,
    GitLabClientConfig, ShellInvoker, Watchdog, WatchdogSettings,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Pings authors of stale GitLab merge requests", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Override `gitlab.owner_kind` from the config file
    #[arg(long, value_enum)]
    owner_kind: Option<OwnerKind>,

    /// Log notification commands instead of running them
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Run a single cycle immediately, then exit
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("{}", Args::command().render_help());
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    let mut config = WatchdogConfig::load(&args.config)?;
    if let Some(kind) = args.owner_kind {
        config.gitlab.owner = Owner::new(kind, config.gitlab.owner.name());
    }

    let client = GitLabClient::new(GitLabClientConfig {
        base_url: config.gitlab.host.clone(),
        token: config.gitlab.token.clone(),
        timeout_secs: config.gitlab.request_timeout_secs,
    })?;

    if args.dry_run {
        watch(config, client, DryRunInvoker, args.once).await
    } else {
        watch(config, client, ShellInvoker::default(), args.once).await
    }
}

async fn watch<I: ActionInvoker>(
    config: WatchdogConfig,
    client: GitLabClient,
    invoker: I,
    once: bool,
) -> Result<(), AppError> {
    let dispatcher = Dispatcher::new(
        invoker,
        config.action.command.clone(),
        config.action.message.clone(),
    );
    let mut watchdog = Watchdog::start(
        client,
        &config.gitlab.owner,
        &config.gitlab.project,
        dispatcher,
        WatchdogSettings::from(&config),
    )
    .await?;

    if once {
        watchdog.tick(Local::now()).await;
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match handle_interrupts(signal::ctrl_c, signal_token).await {
            Ok(()) => std::process::exit(130),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    });

    watchdog.run(shutdown).await;
    Ok(())
}
