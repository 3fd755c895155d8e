use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroom::store::{QueueStore, QueueStoreExt, SqliteQueueStore};
use stockroom::sync::{
    Connectivity, HttpExecutor, HttpExecutorConfig, ManualConnectivity, SyncManager,
};
use stockroom::{
    Engine, EngineConfig, HealthCheckConfig, NewOperation, OperationType, QueueLimits, SyncConfig,
    SyncOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "stockroom")]
#[command(about = "Inspect and drain an offline inventory write queue", long_about = None)]
struct Cli {
    /// Queue database file
    #[arg(long, env = "STOCKROOM_DB", default_value = "stockroom.db", global = true)]
    db: PathBuf,

    /// Base URL operations are replayed against
    #[arg(long, env = "STOCKROOM_BASE_URL", default_value = "http://localhost:3000", global = true)]
    base_url: String,

    /// Bearer token sent with every replayed request
    #[arg(long, env = "STOCKROOM_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Extra request header, as `Name: value` (repeatable)
    #[arg(long = "header", value_name = "HEADER", global = true)]
    headers: Vec<String>,

    /// Failed attempts before an operation is quarantined
    #[arg(long, default_value_t = 3, global = true)]
    max_retries: u32,

    /// Quarantine on the first 4xx response instead of retrying
    #[arg(long, global = true)]
    quarantine_client_errors: bool,

    /// Queue bounds preset: default, mobile, desktop or unbounded
    #[arg(long, default_value = "default", global = true)]
    limits: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every queued operation
    List {
        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Print the number of operations awaiting replay
    Pending,

    /// Queue an operation
    Enqueue {
        /// CREATE, UPDATE, DELETE, COLLECT or WRITE_OFF
        #[arg(long = "type", value_name = "TYPE")]
        op_type: String,

        /// Endpoint path, relative to the base URL
        #[arg(long)]
        endpoint: String,

        /// HTTP method overriding the type's default
        #[arg(long)]
        method: Option<String>,

        /// JSON object payload
        #[arg(long)]
        data: Option<String>,

        /// Tenant the operation belongs to
        #[arg(long)]
        hotel_id: Option<String>,
    },

    /// Delete quarantined operations
    ClearFailed,

    /// Run one drain pass and print the report
    Sync,

    /// Run the engine until Ctrl-C
    Run {
        /// Health endpoint polled to detect connectivity
        #[arg(long, default_value = "/health")]
        health_path: String,

        /// Seconds between health checks
        #[arg(long, default_value_t = 10)]
        health_interval: u64,

        /// Seconds between periodic drain checks
        #[arg(long, default_value_t = 30)]
        sync_interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockroom=info,stockroom_sync=info,stockroom_store=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::List { json } => list(&cli, *json).await,
        Command::Pending => {
            let store = open_store(&cli)?;
            println!("{}", store.pending_count().await?);
            Ok(())
        }
        Command::Enqueue {
            op_type,
            endpoint,
            method,
            data,
            hotel_id,
        } => {
            let mut new = NewOperation::new(OperationType::from(op_type.to_ascii_uppercase()), endpoint);
            if !new.op_type.is_known() {
                tracing::warn!(op_type = %new.op_type, "unknown operation type, it will fail on replay");
            }
            if let Some(method) = method {
                new = new.method(method);
            }
            if let Some(data) = data {
                let value: serde_json::Value =
                    serde_json::from_str(data).context("--data must be valid JSON")?;
                new = new.data(value);
            }
            if let Some(hotel_id) = hotel_id {
                new = new.hotel_id(hotel_id);
            }

            // Only persist here; draining is left to `sync` or `run`.
            let manager = Arc::new(manager(&cli, false)?);
            let id = manager.queue_operation(new).await?;
            println!("{}", id);
            Ok(())
        }
        Command::ClearFailed => {
            let manager = manager(&cli, false)?;
            println!("{}", manager.clear_failed_operations().await?);
            Ok(())
        }
        Command::Sync => {
            let manager = manager(&cli, true)?;
            match manager.sync().await {
                SyncOutcome::Completed(report) => {
                    println!(
                        "synced {} failed {} quarantined {}",
                        report.synced, report.failed, report.quarantined
                    );
                    Ok(())
                }
                SyncOutcome::LeaseHeld => bail!("another process is draining this queue"),
                SyncOutcome::Aborted(message) => bail!("drain pass aborted: {}", message),
                other => bail!("drain pass did not run: {:?}", other),
            }
        }
        Command::Run {
            health_path,
            health_interval,
            sync_interval,
        } => {
            let mut config = engine_config(&cli)?;
            config.sync.sync_interval = Duration::from_secs((*sync_interval).max(1));
            config.health = Some(HealthCheckConfig {
                interval: Duration::from_secs((*health_interval).max(1)),
                ..HealthCheckConfig::new(health_path.clone())
            });

            let engine = Engine::open(config).await?;
            let subscription = engine.subscribe(|event| match serde_json::to_string(event) {
                Ok(line) => tracing::info!(event = %line, "sync event"),
                Err(e) => tracing::warn!(error = %e, "unprintable sync event"),
            });

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
            tracing::info!("shutting down");

            subscription.unsubscribe();
            engine.shutdown().await;
            Ok(())
        }
    }
}

async fn list(cli: &Cli, json: bool) -> anyhow::Result<()> {
    let store = open_store(cli)?;
    for op in store.list().await? {
        if json {
            println!("{}", serde_json::to_string(&op)?);
            continue;
        }
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            op.id,
            op.op_type,
            op.endpoint,
            op.status.as_str(),
            op.retry_count,
            op.last_error.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn limits(name: &str) -> anyhow::Result<QueueLimits> {
    Ok(match name {
        "default" => QueueLimits::default(),
        "mobile" => QueueLimits::mobile(),
        "desktop" => QueueLimits::desktop(),
        "unbounded" => QueueLimits::unbounded(),
        other => bail!("unknown limits preset: {}", other),
    })
}

fn open_store(cli: &Cli) -> anyhow::Result<SqliteQueueStore> {
    let store = SqliteQueueStore::open(&cli.db)
        .with_context(|| format!("failed to open queue at {}", cli.db.display()))?;
    Ok(store.with_limits(limits(&cli.limits)?))
}

fn engine_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut http = HttpExecutorConfig::new(cli.base_url.clone());
    http.bearer_token = cli.token.clone();
    for header in &cli.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header must look like `Name: value`, got {:?}", header);
        };
        http = http.header(name.trim(), value.trim());
    }

    let config = EngineConfig {
        database_path: cli.db.clone(),
        limits: limits(&cli.limits)?,
        http,
        sync: SyncConfig {
            max_retries: cli.max_retries,
            quarantine_client_errors: cli.quarantine_client_errors,
            ..Default::default()
        },
        health: None,
    }
    // Several CLI invocations may share one queue file.
    .shared();
    config.validate()?;
    Ok(config)
}

/// A manager without background triggers, for one-shot commands.
fn manager(
    cli: &Cli,
    online: bool,
) -> anyhow::Result<SyncManager<SqliteQueueStore, HttpExecutor>> {
    let mut config = engine_config(cli)?;
    config.sync.sync_on_enqueue = false;

    let executor = HttpExecutor::new(config.http)?;
    let connectivity: Arc<dyn Connectivity> = Arc::new(ManualConnectivity::new(online));
    let store = open_store(cli)?;
    Ok(SyncManager::new(store, executor, connectivity, config.sync))
}
