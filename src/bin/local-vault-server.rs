//! Local Vault API Server binary.
//!
//! Standalone HTTP control plane for the credential vault. Loads
//! configuration from the environment, opens the on-disk record store, and
//! serves the REST API until interrupted.

use clap::Parser;
use std::net::SocketAddr;

use local_vault::api_server::{self, AppState};
use local_vault::config::AppConfig;
use local_vault::store::RecordStore;

#[derive(Parser, Debug)]
#[command(name = "local-vault-server")]
#[command(about = "Local credential vault REST API server", long_about = None)]
struct Args {
    /// Overrides APP_HOST.
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Overrides APP_PORT.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(host) = args.host {
        config.app_host = host;
    }
    if let Some(port) = args.port {
        config.app_port = port;
    }

    local_vault::logging::init(&config.app_log_level);
    config.ensure_data_dir()?;

    let store = RecordStore::open(&config.database_path())?;
    let addr: SocketAddr = format!("{}:{}", config.app_host, config.app_port).parse()?;
    let state = AppState::new(store, config);

    api_server::start_server(state, addr).await
}
