use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_config::Config;
use metrics::server::{run_metrics_server, MetricsServerConfig};
use metrics::{Metrics, SharedMetrics};
use networking::sync::SyncMode;
use networking::{FetchClient, Syncer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use storage::{BlockStore, RedisConnector, StoreConnector};
use tokio::task;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(about = "Mirror a bitcoin node's blocks into Redis and serve them over REST")]
struct Args {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy blocks from the chain's upstream node into storage.
    Sync {
        chain: String,

        /// Keep syncing as new blocks arrive.
        #[arg(long)]
        follow: bool,

        /// Commit blocks one by one instead of on the worker pool.
        #[arg(long)]
        sequential: bool,
    },
    /// Serve stored blocks over the REST interface.
    Serve { chain: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load_from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let metrics = start_metrics(&config)?;

    match args.command {
        Command::Sync {
            chain,
            follow,
            sequential,
        } => {
            let mode = if sequential {
                SyncMode::Sequential
            } else {
                SyncMode::Pipelined
            };
            sync(&config, &chain, mode, follow, metrics).await
        }
        Command::Serve { chain } => serve(&config, &chain).await,
    }
}

fn start_metrics(config: &Config) -> Result<Option<SharedMetrics>> {
    let Some(metrics_config) = &config.metrics else {
        return Ok(None);
    };
    let metrics = Arc::new(Metrics::new().context("registering metrics")?);
    let server_config = MetricsServerConfig {
        metrics_address: metrics_config.host,
        metrics_port: metrics_config.port,
    };

    let server_metrics = metrics.clone();
    task::spawn(async move {
        if let Err(err) = run_metrics_server(server_config, server_metrics).await {
            error!(error = ?err, "Metrics server stopped");
        }
    });
    Ok(Some(metrics))
}

async fn sync(
    config: &Config,
    chain: &str,
    mode: SyncMode,
    follow: bool,
    metrics: Option<SharedMetrics>,
) -> Result<()> {
    let chain_config = config.chain(chain)?;
    let connector = RedisConnector::new(&config.redis_url).context("opening redis client")?;

    let mut client = FetchClient::http(&chain_config.rest_url, &config.sync)?;
    if let Some(metrics) = &metrics {
        client = client.with_metrics(metrics.clone());
    }
    let mut syncer = Syncer::new(
        connector,
        Arc::new(client),
        chain,
        config.key_prefix.as_str(),
        config.sync.clone(),
    );
    if let Some(metrics) = metrics {
        syncer = syncer.with_metrics(metrics);
    }

    tokio::select! {
        result = run_syncer(&mut syncer, mode, follow) => result,
        _ = tokio::signal::ctrl_c() => {
            info!(chain, "Interrupted, stopping sync");
            Ok(())
        }
    }
}

async fn run_syncer<C, S>(syncer: &mut Syncer<C, S>, mode: SyncMode, follow: bool) -> Result<()>
where
    C: StoreConnector,
    S: networking::BlockSource,
{
    if follow {
        syncer.follow(mode).await?;
    } else {
        syncer.run_once(mode).await?;
    }
    Ok(())
}

async fn serve(config: &Config, chain: &str) -> Result<()> {
    let chain_config = config.chain(chain)?;
    let connector = RedisConnector::new(&config.redis_url).context("opening redis client")?;
    let store = BlockStore::new(
        connector.connect().context("connecting to redis")?,
        chain,
        config.key_prefix.as_str(),
    );
    let app = rest::create_app(store);

    tokio::select! {
        result = rest::run_rest_server(SocketAddr::from(&chain_config.server), app) => result,
        _ = tokio::signal::ctrl_c() => {
            info!(chain, "Interrupted, stopping server");
            Ok(())
        }
    }
}
