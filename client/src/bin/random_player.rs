//! Bot that plays uniformly random legal moves. Handy for exercising a server
//! without a second human at the keyboard.

use clap::Parser;
use client::game::{ClientSessionView, DisplayStatus};
use client::network::ChessClient;
use client::rendering::{outcome_text, status_line};
use rand::seq::SliceRandom;
use shared::chess::square_name;
use shared::{ConnectionConfig, Status, DEFAULT_PORT};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Nickname shown to the other players
    #[arg(short = 'n', long, default_value = "random")]
    nick: String,

    /// Pause before each move in milliseconds
    #[arg(short = 'd', long, default_value = "500")]
    delay_ms: u64,

    /// Milliseconds between polls of the connection
    #[arg(short = 't', long, default_value = "50")]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let tick = Duration::from_millis(args.tick_ms.max(1));

    println!("Connecting to {} as {}", args.server, args.nick);
    let mut chess = ChessClient::connect(&args.server, &args.nick, ConnectionConfig::default())?;
    let mut view = ClientSessionView::new();
    let mut last_status = String::new();

    loop {
        let frames = chess.update();
        view.apply_frames(frames.as_deref());

        let status = status_line(&view);
        if status != last_status {
            println!("{}", status);
            last_status = status;
        }

        match view.status() {
            DisplayStatus::NotConnected
            | DisplayStatus::Session(Status::ServerStopped)
            | DisplayStatus::Session(Status::GameEndedPlayerLeft) => break,
            DisplayStatus::Session(Status::GameEnded) => {
                if let Some(outcome) = view.outcome() {
                    println!("{}", outcome_text(&outcome, &view));
                }
                break;
            }
            _ => {}
        }

        if view.is_my_turn() {
            let choice = view
                .parsed_board()
                .and_then(|board| board.legal_moves().choose(&mut rand::thread_rng()).copied());
            if let Some(mv) = choice {
                sleep(Duration::from_millis(args.delay_ms)).await;
                println!("Playing {}-{}", square_name(mv.from), square_name(mv.to));
                view.local_move_started();
                chess.send_move(mv.from, mv.to)?;
                // Wait for the new board before choosing again
                while view.is_my_turn() && chess.is_connected() {
                    sleep(tick).await;
                    let frames = chess.update();
                    view.apply_frames(frames.as_deref());
                }
                continue;
            }
        }

        sleep(tick).await;
    }

    if chess.is_connected() {
        chess.disconnect()?;
    }
    Ok(())
}
