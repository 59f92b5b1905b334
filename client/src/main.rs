use clap::Parser;
use client::network::{discover, Client};
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:4000")]
    server: String,

    /// Player name to join with
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Play as a bot, clicking a random free cell every N milliseconds
    #[arg(short = 'c', long)]
    click_interval: Option<u64>,

    /// Only ping the server and print what it reports
    #[arg(long)]
    ping: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.ping {
        let info = discover(args.server.parse()?, Duration::from_secs(3)).await?;
        println!(
            "{} (protocol {}): {}/{} players, {} ms",
            info.name,
            info.version,
            info.players,
            info.max_players,
            info.latency.as_millis()
        );
        return Ok(());
    }

    info!("Connecting to: {}", args.server);
    let click_interval = args.click_interval.map(Duration::from_millis);
    let mut client = Client::new(&args.server, args.name, click_interval).await?;

    client.run().await?;

    if let Some(reason) = &client.game_state.kicked {
        println!("Disconnected: {}", reason);
    }

    Ok(())
}
