use anyhow::Context;
use clap::Parser;
use researchpilot_lib::gateway::{GatewayConfig, HttpWorkerGateway};
use researchpilot_lib::orchestrator::Orchestrator;
use researchpilot_lib::server::{run_server, AppState};
use researchpilot_lib::store::sessions::SessionStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Research session orchestrator server
#[derive(Parser, Debug)]
#[command(name = "researchpilot", version, about)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 5000, env = "RESEARCH_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1", env = "RESEARCH_BIND")]
    bind: String,

    /// Data directory for session storage (defaults to the platform data dir)
    #[arg(long, env = "RESEARCH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Allowed CORS origins, comma separated (default: any)
    #[arg(long, env = "RESEARCH_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("researchpilot")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
    log::info!("Session data directory: {}", data_dir.display());

    let store = SessionStore::new(&data_dir)
        .with_context(|| format!("failed to open session store at {}", data_dir.display()))?;
    let gateway = HttpWorkerGateway::new(GatewayConfig::from_env());
    let orchestrator = Orchestrator::new(store, Arc::new(gateway));

    run_server(args.port, &args.bind, AppState::new(orchestrator), args.cors_origins)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
