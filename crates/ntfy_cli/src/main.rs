//! Command-line front end for the local notification store.
//!
//! # Responsibility
//! - Act as the composition root: open the database once and build the one
//!   shared `Repository`.
//! - Run a single store operation per invocation and print JSON lines.

use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use log::error;
use ntfy_core::db::open_db;
use ntfy_core::{
    default_log_level, init_logging, open_stores, NewSubscription, Notification, Repository,
    RepositoryCell, StoreOptions, SubscriptionId,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser, Debug)]
#[command(
    name = "ntfy-store",
    version,
    about = "Inspect and edit the local ntfy subscription store"
)]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "NTFY_DB", default_value = "ntfy.sqlite3")]
    db: PathBuf,
    /// trace|debug|info|warn|error; defaults by build mode.
    #[arg(long, env = "NTFY_LOG_LEVEL")]
    log_level: Option<String>,
    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "NTFY_LOG_DIR")]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a subscription unless it already exists.
    Subscribe {
        base_url: String,
        topic: String,
    },
    /// Remove a subscription and its notifications.
    Unsubscribe { id: SubscriptionId },
    /// List subscriptions, most recently active first.
    Subscriptions,
    /// List known server roots.
    BaseUrls,
    /// Store a notification unless its id was already seen.
    Notify(NotifyArgs),
    /// List notifications of one subscription, newest first.
    Notifications { subscription_id: SubscriptionId },
    /// Remove one notification.
    Remove { notification_id: String },
    /// Remove all notifications of one subscription.
    Clear { subscription_id: SubscriptionId },
    /// Print subscription (or notification) snapshots as they change, until Ctrl-C.
    Watch {
        #[arg(long)]
        subscription: Option<SubscriptionId>,
    },
}

#[derive(Args, Debug)]
struct NotifyArgs {
    subscription_id: SubscriptionId,
    id: String,
    message: String,
    #[arg(long, default_value = "")]
    title: String,
    /// Epoch seconds; defaults to now.
    #[arg(long)]
    timestamp: Option<i64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

async fn run(cli: Cli) -> CliResult {
    let conn = open_db(&cli.db)?;
    let (subscriptions, notifications) = open_stores(conn, StoreOptions::default());
    let cell = RepositoryCell::new();
    let repository = cell.get_or_init(subscriptions, notifications);

    match cli.command {
        Command::Subscribe { base_url, topic } => {
            let existing = repository.subscription(&base_url, &topic).await?;
            let subscription = match existing {
                Some(existing) => existing,
                None => {
                    repository
                        .add_subscription(NewSubscription::new(&base_url, topic))
                        .await?
                }
            };
            print_json(&subscription)?;
        }
        Command::Unsubscribe { id } => repository.remove_subscription(id).await?,
        Command::Subscriptions => {
            for subscription in blocking(&repository, |repo| repo.subscriptions()).await?? {
                print_json(&subscription)?;
            }
        }
        Command::BaseUrls => {
            for base_url in blocking(&repository, |repo| repo.base_urls()).await?? {
                println!("{base_url}");
            }
        }
        Command::Notify(args) => {
            let timestamp = match args.timestamp {
                Some(timestamp) => timestamp,
                None => now_epoch_seconds()?,
            };
            let notification =
                Notification::new(args.id, args.subscription_id, timestamp, args.message)
                    .with_title(args.title);
            let inserted = repository.add_notification(notification).await?;
            println!("{}", json!({ "inserted": inserted }));
        }
        Command::Notifications { subscription_id } => {
            for notification in repository.notifications(subscription_id).await? {
                print_json(&notification)?;
            }
        }
        Command::Remove { notification_id } => {
            repository.remove_notification(&notification_id).await?
        }
        Command::Clear { subscription_id } => {
            blocking(&repository, move |repo| {
                repo.remove_all_notifications(subscription_id)
            })
            .await??
        }
        Command::Watch { subscription } => watch(&repository, subscription).await?,
    }

    Ok(())
}

async fn watch(repository: &Repository, subscription: Option<SubscriptionId>) -> CliResult {
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    match subscription {
        Some(subscription_id) => {
            let mut live = repository.notifications_live(subscription_id);
            loop {
                tokio::select! {
                    _ = &mut shutdown => return Ok(()),
                    snapshot = live.next() => match snapshot {
                        Some(snapshot) => print_json(&snapshot?)?,
                        None => return Ok(()),
                    },
                }
            }
        }
        None => {
            let mut live = repository.subscriptions_live();
            loop {
                tokio::select! {
                    _ = &mut shutdown => return Ok(()),
                    snapshot = live.next() => match snapshot {
                        Some(snapshot) => print_json(&snapshot?)?,
                        None => return Ok(()),
                    },
                }
            }
        }
    }
}

/// Runs a blocking repository call off the async worker threads.
async fn blocking<T, F>(
    repository: &Arc<Repository>,
    call: F,
) -> Result<T, tokio::task::JoinError>
where
    T: Send + 'static,
    F: FnOnce(&Repository) -> T + Send + 'static,
{
    let repository = Arc::clone(repository);
    tokio::task::spawn_blocking(move || call(&repository)).await
}

fn print_json(value: &impl serde::Serialize) -> CliResult {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn now_epoch_seconds() -> Result<i64, Box<dyn std::error::Error + Send + Sync>> {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH)?;
    Ok(i64::try_from(elapsed.as_secs())?)
}
