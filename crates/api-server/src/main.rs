use clap::Parser;
use common::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Google Drive upload, download, delete and share web app
#[derive(Parser, Debug)]
#[command(name = "cloud-drive", version, about)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CLOUD_DRIVE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal outside development
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    api_server::run_server_blocking(config).await
}
