//! shoin-watch: follow one project's sync stream and log what happens.
//!
//! Usage:
//!   # Watch a project with default settings
//!   shoin-watch ws://localhost:8080/sync project-1
//!
//!   # With a RON session config and lock labels for two blocks
//!   shoin-watch ws://localhost:8080/sync project-1 --config shoin.ron \
//!       --lock /documents/d1/blocks/0 --lock /documents/d1/blocks/1
//!
//! Logs go to stderr; set `RUST_LOG=shoin_client=debug` for session
//! internals.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use shoin_client::tasks::summarize;
use shoin_client::{
    PendingTasks, ResyncPolicy, SessionConfig, SessionEvent, SessionView, WsTransport,
    spawn_session,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Follow a Shoin project and log status, document changes and locks.
#[derive(Parser, Debug)]
#[command(name = "shoin-watch")]
#[command(about = "Follow a Shoin project's sync stream")]
struct Args {
    /// Sync endpoint, e.g. ws://localhost:8080/sync
    endpoint: String,

    /// Project to follow
    project: String,

    /// RON session config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the config's resync policy
    #[arg(long, value_enum)]
    resync: Option<Resync>,

    /// Region (JSON Pointer) whose lock to report after every change
    #[arg(long = "lock", value_name = "POINTER")]
    locks: Vec<String>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Resync {
    Reconnect,
    Request,
}

impl From<Resync> for ResyncPolicy {
    fn from(value: Resync) -> Self {
        match value {
            Resync::Reconnect => ResyncPolicy::Reconnect,
            Resync::Request => ResyncPolicy::Request,
        }
    }
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading session config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(resync) = args.resync {
        config.resync = resync.into();
    }
    Ok(config)
}

fn log_view(view: &SessionView, locks: &[String]) {
    info!(
        status = %view.status,
        version = view.version,
        desynced = view.desynced,
        error = view.last_error.as_deref().unwrap_or(""),
        "session"
    );
    if view.document.is_none() {
        return;
    }
    for region in locks {
        match view.lock_at(region) {
            Ok(lock) => info!(region = %region, lock = %lock, "lock"),
            Err(e) => warn!(region = %region, error = %e, "unreadable lock"),
        }
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::SnapshotApplied { version } => info!(version, "snapshot"),
        SessionEvent::DocumentsChanged { ids, version } => {
            let mut ids: Vec<_> = ids.iter().map(String::as_str).collect();
            ids.sort_unstable();
            info!(version, documents = ?ids, "documents changed");
        }
        SessionEvent::Desynchronized { error } => warn!(error = %error, "desynchronized"),
        SessionEvent::ProtocolWarning { message } => warn!(message = %message, "protocol"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let tasks = Arc::new(PendingTasks::new());
    let _status_line = tasks.subscribe(|map| match summarize(map) {
        Some(line) => info!(pending = map.len(), "{line}"),
        None => info!("idle"),
    });

    let session = spawn_session(WsTransport, config);
    let mut view = session.watch();
    let mut events = session.events();

    info!(endpoint = %args.endpoint, project = %args.project, "starting");
    session
        .connect(args.endpoint.as_str(), args.project.as_str())
        .await
        .context("starting session")?;
    let mut initial_sync = Some(tasks.track_new(args.project.clone()));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("interrupted, disconnecting");
                break;
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                if current.document.is_some() {
                    initial_sync.take();
                }
                log_view(&current, &args.locks);
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.disconnect().await.context("stopping session")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "shoin-watch",
            "ws://localhost:8080/sync",
            "p1",
            "--resync",
            "request",
            "--lock",
            "/documents/a",
            "--lock",
            "/documents/b",
        ]);
        assert_eq!(args.project, "p1");
        assert_eq!(args.locks, ["/documents/a", "/documents/b"]);

        let config = load_config(&args).unwrap();
        assert_eq!(config.resync, ResyncPolicy::Request);
    }
}
