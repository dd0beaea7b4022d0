use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use json_collector::CollectorConfig;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "json-collector")]
#[command(about = "Append-only JSON collection service with per-project JSONL logs")]
struct Cli {
    /// Bind address for the HTTP listener
    #[arg(long, env = "COLLECTOR_BIND", default_value = "0.0.0.0:8000")]
    bind: String,
    /// Directory where project log files are stored
    #[arg(long, env = "DATA_DIR", default_value = CollectorConfig::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
    /// Rotation threshold in bytes for project log files
    #[arg(long, env = "MAX_JSONL_FILE_SIZE", default_value_t = CollectorConfig::DEFAULT_MAX_FILE_SIZE)]
    max_jsonl_file_size: u64,
    /// Path to the authorized tokens file (enables token authentication)
    #[arg(long, env = "AUTHORIZED_TOKENS_FILE")]
    authorized_tokens_file: Option<PathBuf>,
    /// Header checked for the client token
    #[arg(long, env = "JSON_COLLECTOR_TOKEN_HEADER", default_value = CollectorConfig::DEFAULT_TOKEN_HEADER)]
    token_header_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("json_collector=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = CollectorConfig {
        data_dir: cli.data_dir,
        max_file_size: cli.max_jsonl_file_size,
        authorized_tokens_file: cli.authorized_tokens_file,
        token_header_name: cli.token_header_name,
    };

    info!("Using data directory {}", config.data_dir.display());
    if config.authorized_tokens_file.is_some() {
        info!("Token authentication required (header '{}')", config.token_header_name);
    } else {
        info!("Token authentication disabled (open access)");
    }

    let app = json_collector::create_app(&config)?;

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    info!("JSON collector listening on http://{}", cli.bind);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
