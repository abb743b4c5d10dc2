//! Server network layer: the TCP control-channel listener and one handler
//! task per accepted connection.
//!
//! Each connection task blocks only on its own socket, so a stalled client
//! never holds up the others or the simulation loop. Outgoing control
//! traffic goes through a per-connection writer task fed by an unbounded
//! queue, which lets the simulation loop hand off messages without awaiting
//! a write while holding the session lock.

use crate::game::Game;
use crate::session::{ControlSender, Session};
use log::{error, info, warn};
use shared::protocol::key_value_message;
use shared::{ControlCodec, Maze, GAME_TIME};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub tcp_port: u16,
    pub udp_port: u16,
    /// Match length in seconds.
    pub game_time: u32,
    /// Delay between the last expected player joining and the match start.
    pub countdown: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            tcp_port: shared::DEFAULT_TCP_PORT,
            udp_port: shared::DEFAULT_UDP_PORT,
            game_time: GAME_TIME,
            countdown: Duration::from_secs(3),
        }
    }
}

/// One match's worth of server: a control-channel listener, a state-channel
/// socket and the shared session registries.
pub struct Server {
    session: Arc<RwLock<Session>>,
    maze: Arc<Maze>,
    listener: TcpListener,
    socket: UdpSocket,
    config: ServerConfig,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.tcp_port)).await?;
        let socket = UdpSocket::bind((config.host.as_str(), config.udp_port)).await?;
        info!(
            "Control channel on {}, state channel on {}",
            listener.local_addr()?,
            socket.local_addr()?
        );

        Ok(Self {
            session: Arc::new(RwLock::new(Session::new())),
            maze: Arc::new(Maze::generate()),
            listener,
            socket,
            config,
        })
    }

    /// Bound control-channel address (useful with an ephemeral port).
    pub fn tcp_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Bound state-channel address.
    pub fn udp_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs one match to completion: accepts connections until
    /// `expected_players` have registered, counts down, then drives the
    /// authoritative simulation until the match ends or everyone leaves.
    pub async fn run(self, expected_players: usize) -> io::Result<()> {
        let session = Arc::clone(&self.session);
        let maze = Arc::clone(&self.maze);
        tokio::spawn(run_listener(self.listener, session, maze));

        let mut game = Game::new(self.session, self.socket, self.maze, self.config.game_time);
        game.run(expected_players, self.config.countdown).await
    }
}

/// Accept loop. Handler tasks are fire-and-forget; a failed connection is
/// logged and deregistered but never joined.
async fn run_listener(listener: TcpListener, session: Arc<RwLock<Session>>, maze: Arc<Maze>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("Accepted control connection from {}", addr);
                let session = Arc::clone(&session);
                let maze = Arc::clone(&maze);
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, addr, session, maze).await {
                        error!("Connection {} failed: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Accept failed: {}", e);
                break;
            }
        }
    }
}

/// Drives one client's control channel until it closes, then deregisters
/// the player and announces the exit to everyone left.
async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    session: Arc<RwLock<Session>>,
    maze: Arc<Maze>,
) -> io::Result<()> {
    let (mut reader, writer) = stream.into_split();
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    tokio::spawn(write_queue(writer, control_rx));

    // Replay the current roster to the new client before anything else.
    for name in session.read().await.roster() {
        let _ = control_tx.send(key_value_message("player", &name));
    }

    let mut index = None;
    let result = client_loop(&mut reader, peer, &control_tx, &session, &maze, &mut index).await;

    if let Some(index) = index {
        let mut session = session.write().await;
        if session.deregister_player(index) {
            session.broadcast_control("exit", &index.to_string());
        }
    }

    result
}

async fn client_loop(
    reader: &mut OwnedReadHalf,
    peer: SocketAddr,
    control_tx: &ControlSender,
    session: &Arc<RwLock<Session>>,
    maze: &Maze,
    index: &mut Option<i8>,
) -> io::Result<()> {
    let mut codec = ControlCodec::new();
    let mut buf = [0u8; 1024];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            // Peer closed the control channel.
            return Ok(());
        }
        codec.extend(&buf[..n]);

        while let Some((key, value)) = codec.next_message() {
            match key.as_str() {
                "player" => {
                    let spawn = maze.random_empty_cell(&mut rand::thread_rng());
                    let assigned = session
                        .write()
                        .await
                        .register_player(&value, spawn, control_tx.clone());
                    *index = Some(assigned);

                    let _ = control_tx.send(key_value_message("index", &assigned.to_string()));
                    session.read().await.broadcast_control("player", &value);
                }
                "udp" => {
                    if let Some(assigned) = *index {
                        // A malformed port is a real failure for this
                        // connection, not a would-block.
                        let port: u16 = value
                            .parse()
                            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                        session
                            .write()
                            .await
                            .set_address(assigned, SocketAddr::new(peer.ip(), port));
                    }
                }
                "close" => return Ok(()),
                _ => warn!("Unknown control key {:?} from {}", key, peer),
            }
        }
    }
}

async fn write_queue(mut writer: OwnedWriteHalf, mut queue: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(bytes) = queue.recv().await {
        if let Err(e) = writer.write_all(&bytes).await {
            error!("Control write failed: {}", e);
            break;
        }
    }
}
