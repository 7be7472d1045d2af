use clap::Parser;
use log::info;
use server::network::{ChessServer, ServerConfig};
use shared::codec::DEFAULT_MAX_FRAME_LEN;
use shared::{ConnectionConfig, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "20")]
    tick_rate: u32,

    /// Directory for saved game records
    #[arg(short, long, default_value = "matches")]
    matches_dir: PathBuf,

    /// Maximum number of simultaneous connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Largest accepted frame in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_size: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let tick_rate = args.tick_rate.max(1);

    let config = ServerConfig {
        address: format!("{}:{}", args.host, args.port),
        tick_duration: Duration::from_secs_f64(1.0 / tick_rate as f64),
        matches_dir: args.matches_dir,
        max_connections: args.max_connections,
        connection: ConnectionConfig {
            max_frame_len: args.max_frame_size,
            ..ConnectionConfig::default()
        },
    };

    info!("Starting chess server on {}", config.address);
    info!("Tick rate: {} Hz, records in {}", tick_rate, config.matches_dir.display());

    let mut server = ChessServer::bind(&config)?;
    server.run(config.tick_duration).await?;

    Ok(())
}
