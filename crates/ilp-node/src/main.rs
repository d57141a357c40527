//! ILP connector node: entry point.
//!
//! Starts the connector with configuration from a TOML file or defaults.

mod api;
mod ccp;
mod config;
mod node;
mod state;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::NodeConfig;
use ilp_core::Address;
use node::ConnectorNode;

#[derive(Parser, Debug)]
#[command(name = "ilp-node", version, about = "Interledger connector node")]
struct Args {
    /// TOML config file; missing means defaults.
    #[arg(short, long, default_value = "ilp-node.toml")]
    config: PathBuf,

    /// HTTP listen address, e.g. 0.0.0.0:7768.
    #[arg(long)]
    bind: Option<String>,

    /// ILP address of this connector.
    #[arg(long)]
    ilp_address: Option<String>,

    /// Tracing filter directive, e.g. `info,ilp_routing=debug`.
    #[arg(long)]
    log: Option<String>,

    /// Write the effective config to `--config` and exit.
    #[arg(long)]
    init: bool,
}

fn init_tracing(filter: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(&args.config)?;
    if let Some(filter) = args.log {
        config.log.filter = filter;
    }
    if let Some(bind) = args.bind {
        config.http.bind_address = bind;
    }
    if let Some(address) = &args.ilp_address {
        config.connector.ilp_address = Some(Address::parse(address)?);
    }

    init_tracing(&config.log.filter, config.log.json);

    if args.init {
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote config");
        return Ok(());
    }

    tracing::info!("ILP connector node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = ConnectorNode::new(config)?;
    node.start().await?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        tracing::info!("received shutdown signal");
    };

    tokio::select! {
        result = node.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "route broadcast loop error");
            }
        }
        _ = shutdown => {
            tracing::info!("initiating graceful shutdown");
        }
    }

    node.shutdown().await?;
    tracing::info!("ILP connector node exited cleanly");
    Ok(())
}
