use clap::Parser;
use log::{error, info, LevelFilter};
use server::config::ServerConfig;
use server::network::{Server, ServerHandle};
use server::stats::{FileStats, MemoryStats, StatsManager};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name reported to clients that ping the server
    #[arg(long, default_value = "TrapGame Server")]
    name: String,

    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "4000")]
    port: u16,

    /// Maximum number of players
    #[arg(short, long, default_value = "16")]
    max_players: usize,

    /// Start a match automatically once this many players have joined
    #[arg(long)]
    min_players: Option<usize>,

    /// Initial board width
    #[arg(long, default_value = "10")]
    board_width: u32,

    /// Initial board height
    #[arg(long, default_value = "10")]
    board_height: u32,

    /// Player allowed to run commands (repeatable)
    #[arg(long = "op")]
    operators: Vec<String>,

    /// File to keep player statistics in
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            name: self.name,
            host: self.host,
            port: self.port,
            max_players: self.max_players,
            min_players: self.min_players,
            board_size: Some((self.board_width, self.board_height)),
            debug: self.debug,
            operators: self.operators,
            stats_path: self.stats,
            ..Default::default()
        }
    }
}

/// Forwards stdin lines to the server as console commands.
fn spawn_console(handle: ServerHandle) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            if !handle.console(line) {
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    let config = args.into_config();
    let stats: Box<dyn StatsManager> = match &config.stats_path {
        Some(path) => {
            info!("Loading player stats from {}", path.display());
            Box::new(FileStats::open(path)?)
        }
        None => Box::new(MemoryStats::new()),
    };

    let server = Server::bind(config, stats).await?;
    let handle = server.handle();
    spawn_console(handle.clone());

    let mut running = tokio::spawn(server.run());

    tokio::select! {
        result = &mut running => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server stopped: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown();
        }
    }

    running.await??;
    Ok(())
}
