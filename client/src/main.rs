use clap::Parser;
use log::{info, warn};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use client::game::{ClientPhase, ClientWorld};
use client::network::{Connection, ControlEvent};
use shared::{Vec2, DEFAULT_TCP_PORT, DEFAULT_UDP_PORT, TICK_RATE};

#[derive(Parser)]
#[command(about = "Maze shooter client")]
struct Args {
    /// Server host to connect to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server TCP control port
    #[arg(short, long, default_value_t = DEFAULT_TCP_PORT)]
    tcp_port: u16,

    /// Server UDP state port
    #[arg(short, long, default_value_t = DEFAULT_UDP_PORT)]
    udp_port: u16,

    /// Name shown to other players
    #[arg(short, long, default_value = "player")]
    name: String,

    /// Walk forward with random turns instead of standing still
    #[arg(short, long)]
    wander: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args = Args::parse();
    let mut conn = Connection::connect(&args.host, args.tcp_port, args.udp_port, &args.name).await?;
    let mut world = ClientWorld::new(conn.index(), args.name.clone());

    let mut ticker = interval(Duration::from_secs_f32(1.0 / TICK_RATE as f32));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_frame = Instant::now();

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let dt = (now - last_frame).as_secs_f32();
        last_frame = now;

        for event in conn.poll_control()? {
            match &event {
                ControlEvent::Roster(name) => info!("{} joined the lobby", name),
                ControlEvent::Start(_) => info!("Match started"),
                ControlEvent::Hit => warn!("We were hit"),
                ControlEvent::Score(points) => info!("Scored {} points", points),
                ControlEvent::End(text) => info!("Match over: {}", text),
                ControlEvent::PlayerLeft(index) => info!("Player {} left", index),
                ControlEvent::Timer(_) => {}
            }
            world.apply_event(event);
        }
        for packet in conn.drain_state() {
            world.apply_state(packet);
        }

        match world.phase {
            ClientPhase::Lobby => continue,
            ClientPhase::Ended => break,
            ClientPhase::Running => {}
        }

        let wasd = if args.wander {
            world.local.direction += rand::random::<f32>() * 0.2 - 0.1;
            Vec2::new(1.0, 0.0)
        } else {
            Vec2::ZERO
        };
        let moved = world.step_local(wasd, dt);
        conn.send_position(&world.local, moved).await?;

        world.step_interpolation(dt);
    }

    info!(
        "Final score {} with {} lives left",
        world.local.score, world.local.lives
    );
    conn.close().await
}
