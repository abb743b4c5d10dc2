use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::io::BufRead;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind both channels to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// TCP port for the control channel
    #[arg(short, long, default_value_t = shared::DEFAULT_TCP_PORT)]
    tcp_port: u16,

    /// UDP port for the state channel
    #[arg(short, long, default_value_t = shared::DEFAULT_UDP_PORT)]
    udp_port: u16,

    /// Match length in seconds
    #[arg(short, long, default_value_t = shared::GAME_TIME)]
    game_time: u32,

    /// Seconds between the last player joining and the match start
    #[arg(short, long, default_value_t = 3)]
    countdown: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    // The number of players to wait for comes from stdin.
    println!("How many players?");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let expected_players: usize = line.trim().parse()?;

    let server = Server::bind(ServerConfig {
        host: args.host,
        tcp_port: args.tcp_port,
        udp_port: args.udp_port,
        game_time: args.game_time,
        countdown: Duration::from_secs(args.countdown),
    })
    .await?;

    info!("Waiting for {} players to join", expected_players);
    server.run(expected_players).await?;
    info!("Match finished, shutting down");

    Ok(())
}
