//! CLI entrypoint and subcommand orchestration.

mod commands;
mod config;
#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use serde_json::Value;

use channels::{ChannelRegistry, ClientFactory, CredentialStore, RetryPolicy};
use commands::{Outcome, PushKind, Runner};
use config::{ConnectionsFile, load_payload, options_payload, parse_datetime, parse_option};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Top-level command-line arguments for channel-sync.
#[derive(Parser)]
#[command(name = "channel-sync")]
#[command(about = "Sync reservations, availability and rates with booking channels", version = "0.1.0")]
struct Cli {
    /// Path to the channel registry file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the connections file
    #[arg(long)]
    connections: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// Enable debug logging to ~/.channel-sync/logs/debug.log
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured channels, environments, endpoints and rate limits
    Channels,

    /// Check that a connection can reach its channel
    Test {
        /// Connection id
        #[arg(short = 'c', long)]
        connection: String,

        /// Total attempts for transient failures
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },

    /// Pull reservations for a date range
    Pull {
        /// Connection id
        #[arg(short = 'c', long)]
        connection: String,

        /// Range start (RFC 3339)
        #[arg(long, value_parser = parse_datetime)]
        start: DateTime<FixedOffset>,

        /// Range end (RFC 3339)
        #[arg(long, value_parser = parse_datetime)]
        end: DateTime<FixedOffset>,

        /// Query override as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, Value)>,

        /// Total attempts for transient failures
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },

    /// Push availability to one or more connections
    PushAvailability {
        /// Connection ids (repeatable)
        #[arg(short = 'c', long = "connection", required = true)]
        connections: Vec<String>,

        /// JSON object file with the availability payload
        #[arg(long)]
        payload: PathBuf,

        /// Body override as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, Value)>,
    },

    /// Push rates to one or more connections
    PushRates {
        /// Connection ids (repeatable)
        #[arg(short = 'c', long = "connection", required = true)]
        connections: Vec<String>,

        /// JSON object file with the rates payload
        #[arg(long)]
        payload: PathBuf,

        /// Body override as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_parser = parse_option)]
        options: Vec<(String, Value)>,
    },

    /// Verify an inbound webhook signature
    VerifyWebhook {
        /// Channel name in the registry
        #[arg(long)]
        channel: String,

        /// Shared webhook secret
        #[arg(long)]
        secret: String,

        /// Signature header value (hex, optional sha256= prefix)
        #[arg(long)]
        signature: String,

        /// File with the raw request body
        #[arg(long)]
        body: PathBuf,
    },
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Test { .. } => "test",
            Self::Pull { .. } => "pull",
            Self::PushAvailability { .. } => "push-availability",
            Self::PushRates { .. } => "push-rates",
            Self::VerifyWebhook { .. } => "verify-webhook",
        }
    }
}

/// Installs the console subscriber and, with `--debug`, a daily log file.
///
/// The returned guard must outlive `main` so buffered file writes are flushed.
fn init_tracing(
    log_level: &str,
    debug: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    // stdout carries the JSON output.
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    if !debug {
        tracing_subscriber::registry().with(console).init();
        return None;
    }

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let log_dir = PathBuf::from(home).join(".channel-sync").join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let appender = tracing_appender::rolling::daily(&log_dir, "debug.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug,hyper_util=info,rustls=info,reqwest=info"));
    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .init();
    Some(guard)
}

fn print_outcome(outcome: &Outcome) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&outcome.output)?);
    Ok(())
}

fn retry_policy(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts: attempts.max(1),
        ..RetryPolicy::default()
    }
}

#[tokio::main]
/// Program entrypoint.
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _file_guard = init_tracing(&cli.log_level, cli.debug);

    if cli.debug {
        info!(
            command = cli.command.label(),
            version = env!("CARGO_PKG_VERSION"),
            "channel-sync session started"
        );
    }

    let registry = Arc::new(ChannelRegistry::load(cli.config.as_deref())?);
    debug!(channels = ?registry.channel_names(), "Registry ready");

    let outcome = run(registry, cli.connections.as_deref(), cli.command).await?;
    print_outcome(&outcome)?;
    if !outcome.success {
        anyhow::bail!("one or more channel operations failed");
    }
    Ok(())
}

fn runner(registry: Arc<ChannelRegistry>) -> Runner {
    Runner::new(ClientFactory::new(
        registry,
        Arc::new(CredentialStore::from_env()),
    ))
}

async fn run(
    registry: Arc<ChannelRegistry>,
    connections_path: Option<&Path>,
    command: Commands,
) -> anyhow::Result<Outcome> {
    let outcome = match command {
        Commands::Channels => commands::list_channels(&registry),
        Commands::VerifyWebhook {
            channel,
            secret,
            signature,
            body,
        } => {
            let body = std::fs::read(&body)?;
            commands::verify_webhook(&registry, &channel, &secret, &signature, &body)
        }
        Commands::Test {
            connection,
            attempts,
        } => {
            let connections = ConnectionsFile::load(connections_path)?;
            let connection = connections.find(&connection)?;
            runner(registry)
                .test(connection, &retry_policy(attempts))
                .await?
        }
        Commands::Pull {
            connection,
            start,
            end,
            options,
            attempts,
        } => {
            let connections = ConnectionsFile::load(connections_path)?;
            let connection = connections.find(&connection)?;
            runner(registry)
                .pull(
                    connection,
                    start,
                    end,
                    &options_payload(options),
                    &retry_policy(attempts),
                )
                .await?
        }
        Commands::PushAvailability {
            connections: ids,
            payload,
            options,
        } => {
            push(registry, connections_path, PushKind::Availability, &ids, &payload, options)
                .await?
        }
        Commands::PushRates {
            connections: ids,
            payload,
            options,
        } => push(registry, connections_path, PushKind::Rates, &ids, &payload, options).await?,
    };
    Ok(outcome)
}

async fn push(
    registry: Arc<ChannelRegistry>,
    connections_path: Option<&Path>,
    kind: PushKind,
    ids: &[String],
    payload_path: &Path,
    options: Vec<(String, Value)>,
) -> anyhow::Result<Outcome> {
    let connections = ConnectionsFile::load(connections_path)?;
    let targets = ids
        .iter()
        .map(|id| connections.find(id))
        .collect::<Result<Vec<_>, _>>()?;
    let payload = load_payload(payload_path)?;
    Ok(runner(registry)
        .push(kind, &targets, &payload, &options_payload(options))
        .await)
}
