use clap::Parser;
use client::network::{ChessClient, Client};
use log::info;
use shared::{ConnectionConfig, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Nickname shown to the other players
    #[arg(short = 'n', long, default_value = "newbie")]
    nick: String,

    /// Milliseconds between polls of the connection
    #[arg(short = 't', long, default_value = "50")]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let chess = ChessClient::connect(&args.server, &args.nick, ConnectionConfig::default())?;
    let mut client = Client::new(chess);

    client.run(Duration::from_millis(args.tick_ms.max(1))).await?;

    Ok(())
}
