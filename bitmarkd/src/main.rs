//! bitmarkd: a node for the bitmark property-registration chain.
//!
//! The binary is glue: it loads configuration, opens the store, and wires
//! the responder, the connection registry, and the expiry sweeper together.
//! The peer transport, RPC server, and the key/certificate setup tooling are
//! external collaborators that attach through the message bus and the
//! connection registry.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::Result;
use gumdrop::Options;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bitmark_peer::{Connections, Responder};
use bitmark_state::{Prepaid, Store};

use config::Config;

#[derive(Debug, Options)]
struct Args {
    #[options(help = "print this help message")]
    help: bool,

    #[options(help = "path to the configuration file", meta = "FILE")]
    config: Option<PathBuf>,

    #[options(command)]
    command: Option<Command>,
}

#[derive(Debug, Options)]
enum Command {
    #[options(help = "run the node")]
    Run(RunArgs),

    #[options(help = "write time and difficulty to a text file for a range of blocks")]
    BlockTimes(BlockTimesArgs),
}

#[derive(Debug, Options)]
struct RunArgs {
    #[options(help = "print this help message")]
    help: bool,
}

#[derive(Debug, Options)]
struct BlockTimesArgs {
    #[options(help = "print this help message")]
    help: bool,

    #[options(free, help = "FILE BEGIN END ('' or '-' for stdout, '0' for min/max)")]
    arguments: Vec<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse_args_default_or_exit();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Some(Command::BlockTimes(block_times)) => {
            let store = open_store(&config)?;
            commands::block_times(&store, &block_times.arguments)
        }
        Some(Command::Run(_)) | None => run_node(config),
    }
}

fn open_store(config: &Config) -> Result<Store> {
    let store = Store::open(
        &bitmark_state::Config {
            path: config.data_dir.clone(),
        },
        config.network,
    )?;
    Ok(store)
}

#[tokio::main]
async fn run_node(config: Config) -> Result<()> {
    info!(network = %config.network, "starting");

    let store = Arc::new(open_store(&config)?);
    let connections = Arc::new(Connections::new());

    // the peer transport and RPC collaborators feed this bus
    let (_bus, queue) = mpsc::unbounded_channel();
    let (stop, shutdown) = watch::channel(false);

    let responder = Arc::new(Responder::new(
        store.clone(),
        connections.clone(),
        Arc::new(Prepaid),
    ));
    let worker = tokio::spawn(responder.run(queue, shutdown));

    // expiry sweep on the configured policy interval
    let sweeper = {
        let store = store.clone();
        let horizon = chrono::Duration::hours(config.expiry_hours);
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(60 * config.sweep_minutes));
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                let expired = store.expire_older_than(chrono::Utc::now() - horizon);
                if expired > 0 {
                    info!(expired, "expired unpaid transactions");
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("interrupt received");

    stop.send(true).ok();
    sweeper.abort();
    if let Err(error) = worker.await {
        warn!(%error, "responder exit");
    }

    store.flush()?;
    info!("stopped");
    Ok(())
}
