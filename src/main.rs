mod cli;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use comment_thread::config::{AppConfig, SyncBackend};
use comment_thread::domain::comment::Comment;
use comment_thread::domain::tree;
use comment_thread::repository::sqlite::{create_pool, run_migrations, SqliteCommentRepository};
use comment_thread::sync::local::LocalSyncBus;
use comment_thread::sync::nats::NatsSyncChannel;
use comment_thread::telemetry::{self, TelemetryConfig};
use comment_thread::usecase::comments::{ChangeListener, CommentStore};
use comment_thread::usecase::contracts::SyncChannel;

use crate::cli::{Command, CommandError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize tracing subscriber with optional OpenTelemetry layer
    if config.telemetry_enabled {
        telemetry::init_telemetry_with_subscriber(&TelemetryConfig::from(&config), env_filter)
            .map_err(|e| anyhow::anyhow!(e))
            .context("failed to initialize telemetry")?;
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
    }

    tracing::info!("starting comment-thread");

    if config.metrics_enabled {
        let addr: SocketAddr = config
            .metrics_listen_addr
            .parse()
            .context("invalid METRICS_LISTEN_ADDR")?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        tracing::info!(%addr, "prometheus metrics initialized");
    }

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("failed to open comment database")?;
    run_migrations(&pool)
        .await
        .context("failed to apply database migrations")?;
    tracing::info!(database_url = %config.database_url, "database ready");

    let local_bus = LocalSyncBus::default();
    let channel: Box<dyn SyncChannel> = match config.sync_backend {
        SyncBackend::Local => Box::new(local_bus.channel()),
        SyncBackend::Nats => match NatsSyncChannel::connect(&config.nats_url, &config.sync_subject).await {
            Ok(channel) => Box::new(channel),
            Err(e) => {
                tracing::warn!(error = %e, nats_url = %config.nats_url, "failed to connect to NATS, other processes will not be notified");
                Box::new(local_bus.channel())
            }
        },
    };

    let listener: ChangeListener = Arc::new(|comments: &[Comment]| {
        tracing::info!(roots = comments.len(), total = tree::count(comments), "comment tree updated");
    });

    let store = CommentStore::open(SqliteCommentRepository::new(pool), channel, Some(listener)).await;
    if let Some(message) = store.error() {
        println!("{message}");
    }

    println!("{}", cli::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match cli::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => cli::execute(&store, command).await,
            Err(CommandError::Empty) => continue,
            Err(e) => println!("{e}"),
        }
    }

    store.close();
    tracing::info!("comment-thread stopped");
    Ok(())
}
