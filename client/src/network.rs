//! Client side of the two session channels.
//!
//! The TCP control stream carries lobby and match events as `key:value`
//! lines; the UDP state socket carries fixed-size position records. Both
//! are drained non-blockingly from the client's frame loop, so a slow
//! frame never stalls on the network.

use std::io;
use std::time::{Duration, Instant};

use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};

use shared::protocol::{key_value_message, STATE_PACKET_SIZE};
use shared::{ControlCodec, Maze, Player, StatePacket, SEND_RATE, WORLD_HEIGHT, WORLD_WIDTH};

/// Minimum spacing between outgoing position reports.
const SEND_INTERVAL: Duration = Duration::from_millis(1000 / SEND_RATE as u64);

/// A control-channel message, decoded into its domain meaning.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// A player (possibly us) joined the lobby.
    Roster(String),
    /// The match started; carries the maze all clients share.
    Start(Maze),
    /// Seconds remaining in the match.
    Timer(u32),
    /// We were hit by a bullet and lost a life.
    Hit,
    /// We earned points for eliminating another player.
    Score(i32),
    /// The match ended with this announcement text.
    End(String),
    /// The player with this index disconnected.
    PlayerLeft(i8),
}

/// An established session with the server: the control stream plus the
/// connected state socket, and the index the server assigned us.
pub struct Connection {
    tcp: TcpStream,
    codec: ControlCodec,
    udp: UdpSocket,
    index: i8,
    pending: Vec<ControlEvent>,
    awaiting_grid: bool,
    last_send: Option<Instant>,
}

impl Connection {
    /// Joins a server: sends our name, waits for the assigned index, then
    /// binds an ephemeral UDP socket and reports its port so the server
    /// can address state packets to us.
    ///
    /// Roster lines replayed before the index arrives are buffered and
    /// surfaced from the first [`poll_control`](Self::poll_control).
    pub async fn connect(host: &str, tcp_port: u16, udp_port: u16, name: &str) -> io::Result<Self> {
        let mut tcp = TcpStream::connect((host, tcp_port)).await?;
        tcp.write_all(&key_value_message("player", name)).await?;

        let mut codec = ControlCodec::new();
        let mut pending = Vec::new();
        let mut buf = [0u8; 1024];
        let index = loop {
            let n = tcp.read(&mut buf).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "control channel closed during handshake",
                ));
            }
            codec.extend(&buf[..n]);
            let mut assigned = None;
            while let Some((key, value)) = codec.next_message() {
                match key.as_str() {
                    "index" => {
                        // Anything after the index reply (the server may
                        // batch the start marker right behind it) stays
                        // buffered for poll_control.
                        assigned = Some(value.parse().map_err(invalid_data)?);
                        break;
                    }
                    "player" => pending.push(ControlEvent::Roster(value)),
                    _ => warn!("Unexpected control key during handshake: {:?}", key),
                }
            }
            if let Some(index) = assigned {
                break index;
            }
        };

        let udp = UdpSocket::bind("0.0.0.0:0").await?;
        udp.connect((host, udp_port)).await?;
        let port = udp.local_addr()?.port();
        tcp.write_all(&key_value_message("udp", &port.to_string()))
            .await?;

        info!("Joined {}:{} as player {}", host, tcp_port, index);
        Ok(Self {
            tcp,
            codec,
            udp,
            index,
            pending,
            awaiting_grid: false,
            last_send: None,
        })
    }

    /// The slot the server assigned us at join time.
    pub fn index(&self) -> i8 {
        self.index
    }

    /// Pulls any buffered control bytes and decodes the complete events
    /// among them. Returns immediately when nothing is pending.
    pub fn poll_control(&mut self) -> io::Result<Vec<ControlEvent>> {
        loop {
            let mut buf = [0u8; 1024];
            match self.tcp.try_read(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "control channel closed",
                    ))
                }
                Ok(n) => self.codec.extend(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        let mut events = std::mem::take(&mut self.pending);
        loop {
            if self.awaiting_grid {
                // The maze grid follows the start marker as a raw block,
                // not as a key:value line.
                match self.codec.next_raw(WORLD_WIDTH * WORLD_HEIGHT) {
                    Some(bytes) => {
                        self.awaiting_grid = false;
                        let maze = Maze::from_bytes(WORLD_WIDTH, WORLD_HEIGHT, &bytes);
                        events.push(ControlEvent::Start(maze));
                    }
                    None => break,
                }
            } else {
                match self.codec.next_message() {
                    Some((key, value)) => {
                        if let Some(event) = self.decode_event(&key, &value)? {
                            events.push(event);
                        }
                    }
                    None => break,
                }
            }
        }
        Ok(events)
    }

    fn decode_event(&mut self, key: &str, value: &str) -> io::Result<Option<ControlEvent>> {
        let event = match key {
            "player" => Some(ControlEvent::Roster(value.to_string())),
            "start" => {
                self.awaiting_grid = true;
                None
            }
            "timer" => Some(ControlEvent::Timer(value.parse().map_err(invalid_data)?)),
            "hit" => Some(ControlEvent::Hit),
            "score" => Some(ControlEvent::Score(value.parse().map_err(invalid_data)?)),
            "end" => Some(ControlEvent::End(value.to_string())),
            "exit" => Some(ControlEvent::PlayerLeft(
                value.parse().map_err(invalid_data)?,
            )),
            _ => {
                warn!("Unknown control key {:?} (value {:?})", key, value);
                None
            }
        };
        Ok(event)
    }

    /// Reports our position over the state channel, rate-limited to
    /// [`SEND_RATE`] and skipped entirely while we are standing still.
    pub async fn send_position(&mut self, player: &Player, moved: bool) -> io::Result<()> {
        if !moved {
            return Ok(());
        }
        if let Some(last) = self.last_send {
            if last.elapsed() < SEND_INTERVAL {
                return Ok(());
            }
        }
        self.last_send = Some(Instant::now());
        let packet = StatePacket::UpdatePlayer {
            index: self.index,
            pos: player.pos,
            direction: player.direction,
        };
        self.udp.send(&packet.encode()).await?;
        Ok(())
    }

    /// Fires a bullet from the given position and heading.
    pub async fn send_bullet(&self, pos: shared::Vec2, direction: f32) -> io::Result<()> {
        let packet = StatePacket::UpdateBullet {
            index: self.index,
            pos,
            direction,
        };
        self.udp.send(&packet.encode()).await?;
        Ok(())
    }

    /// Drains every state packet currently queued on the UDP socket.
    /// Records that fail to decode are dropped.
    pub fn drain_state(&mut self) -> Vec<StatePacket> {
        let mut packets = Vec::new();
        let mut buf = [0u8; STATE_PACKET_SIZE];
        loop {
            match self.udp.try_recv(&mut buf) {
                Ok(len) => {
                    if let Some(packet) = StatePacket::decode(&buf[..len]) {
                        packets.push(packet);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("State channel receive failed: {}", e);
                    break;
                }
            }
        }
        packets
    }

    /// Tells the server we are leaving so it can free our slot promptly.
    pub async fn close(mut self) -> io::Result<()> {
        self.tcp.write_all(&key_value_message("close", "")).await?;
        Ok(())
    }
}

fn invalid_data<E>(err: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::time::{sleep, Instant};

    /// A server under load may flush the index reply and the whole match
    /// bootstrap in one TCP segment; nothing after the index may be lost.
    #[tokio::test]
    async fn test_start_batched_with_index_reply_is_not_lost() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tcp_port = listener.local_addr().unwrap().port();
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let udp_port = udp.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            stream.read(&mut buf).await.unwrap(); // the player:<name> hello

            let mut batch = Vec::new();
            batch.extend_from_slice(&key_value_message("index", "0"));
            batch.extend_from_slice(&key_value_message("start", ""));
            batch.extend_from_slice(&Maze::generate().as_bytes());
            batch.extend_from_slice(&key_value_message("timer", "120"));
            stream.write_all(&batch).await.unwrap();

            // Keep the control stream open while the client polls.
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let mut conn = Connection::connect("127.0.0.1", tcp_port, udp_port, "tester")
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut got_start = false;
        let mut got_timer = false;
        while Instant::now() < deadline && !(got_start && got_timer) {
            for event in conn.poll_control().unwrap() {
                match event {
                    ControlEvent::Start(maze) => {
                        assert_eq!(maze.width(), WORLD_WIDTH);
                        got_start = true;
                    }
                    ControlEvent::Timer(seconds) => {
                        assert_eq!(seconds, 120);
                        got_timer = true;
                    }
                    _ => {}
                }
            }
            sleep(Duration::from_millis(5)).await;
        }

        assert!(got_start, "start marker lost behind the index reply");
        assert!(got_timer, "timer message lost behind the grid block");
    }
}
