//! Authoritative match simulation.
//!
//! The loop runs at a fixed tick rate with wall-clock delta times. Each tick
//! drains the state channel until it would block, advances and resolves the
//! bullets, rebroadcasts the surviving set, and once per second advances the
//! match timer. Player positions are trusted as reported by clients; only
//! bullets are simulated server-side.

use crate::session::Session;
use log::{debug, error, info};
use shared::entity::Player;
use shared::protocol::STATE_PACKET_SIZE;
use shared::{
    Bullet, Maze, StatePacket, HIT_RADIUS, KILL_REWARD, MAX_LIVES, TICK_RATE,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    WaitingForPlayers,
    Countdown,
    Running,
    Ended,
}

pub struct Game {
    session: Arc<RwLock<Session>>,
    socket: UdpSocket,
    maze: Arc<Maze>,
    bullets: Vec<Bullet>,
    phase: MatchPhase,
    timer: u32,
    tick: u64,
}

impl Game {
    pub fn new(
        session: Arc<RwLock<Session>>,
        socket: UdpSocket,
        maze: Arc<Maze>,
        game_time: u32,
    ) -> Self {
        Self {
            session,
            socket,
            maze,
            bullets: Vec::new(),
            phase: MatchPhase::WaitingForPlayers,
            timer: game_time,
            tick: 0,
        }
    }

    /// Blocks until the expected number of players have registered, counts
    /// down, bootstraps every client and runs the match to completion.
    pub async fn run(&mut self, expected_players: usize, countdown: Duration) -> io::Result<()> {
        info!("Waiting for {} players", expected_players);
        loop {
            // A player without a state-channel address would miss its
            // bootstrap spawn packets, so wait for both halves of the join.
            let ready = {
                let session = self.session.read().await;
                session.player_count() >= expected_players
                    && session.address_count() >= expected_players
            };
            if ready {
                break;
            }
            sleep(Duration::from_millis(100)).await;
        }

        self.phase = MatchPhase::Countdown;
        info!("All players joined, match starts in {:?}", countdown);
        sleep(countdown).await;

        self.bootstrap().await?;
        self.phase = MatchPhase::Running;
        self.run_match().await
    }

    /// Sends every client the match bootstrap sequence: `start`, the raw
    /// maze grid, the initial timer, then one spawn packet per player to
    /// every known UDP address.
    async fn bootstrap(&self) -> io::Result<()> {
        let (spawns, addresses) = {
            let session = self.session.read().await;
            session.broadcast_control("start", "");
            session.broadcast_raw(&self.maze.as_bytes());
            session.broadcast_control("timer", &self.timer.to_string());

            let spawns: Vec<StatePacket> = session
                .players()
                .map(|p| StatePacket::InitPlayer {
                    index: p.index,
                    pos: p.pos,
                    direction: p.direction,
                })
                .collect();
            (spawns, session.addresses())
        };

        for addr in &addresses {
            for packet in &spawns {
                self.socket.send_to(&packet.encode(), addr).await?;
            }
        }

        info!("Match started, {} seconds on the clock", self.timer);
        Ok(())
    }

    async fn run_match(&mut self) -> io::Result<()> {
        let mut ticker = interval(Duration::from_secs_f32(1.0 / TICK_RATE as f32));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately.
        ticker.tick().await;

        let mut last_tick = Instant::now();
        let mut second_accum = 0.0f32;

        while self.phase == MatchPhase::Running {
            ticker.tick().await;
            let now = Instant::now();
            let dt = (now - last_tick).as_secs_f32();
            last_tick = now;
            self.tick += 1;

            if self.session.read().await.is_empty() {
                info!("No players remain, stopping the match");
                self.phase = MatchPhase::Ended;
                break;
            }

            self.drain_state_channel().await?;
            self.step_bullets(dt).await?;
            self.broadcast_bullets().await?;

            second_accum += dt;
            if second_accum >= 1.0 {
                second_accum -= 1.0;
                self.tick_timer().await;
            }

            if self.tick % TICK_RATE as u64 == 0 {
                debug!(
                    "Tick {}: {:.1} Hz, {} live bullets",
                    self.tick,
                    1.0 / dt,
                    self.bullets.len()
                );
            }
        }

        Ok(())
    }

    /// Receives state packets until the socket would block. A tick may see
    /// zero or many packets; within one tick the last report for an index
    /// wins, and with no sequence numbers a stale report can overwrite a
    /// fresher one.
    async fn drain_state_channel(&mut self) -> io::Result<()> {
        let mut buf = [0u8; STATE_PACKET_SIZE];
        loop {
            match self.socket.try_recv_from(&mut buf) {
                Ok((len, _)) => {
                    // Anything unreadable counts as no packet at all.
                    if let Some(packet) = StatePacket::decode(&buf[..len]) {
                        self.handle_packet(packet).await?;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!("State channel receive failed: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }

    async fn handle_packet(&mut self, packet: StatePacket) -> io::Result<()> {
        match packet {
            StatePacket::UpdatePlayer {
                index,
                pos,
                direction,
            } => {
                let addresses = {
                    let mut session = self.session.write().await;
                    if let Some(player) = session.player_mut(index) {
                        player.pos = pos;
                        player.direction = direction;
                    }
                    session.addresses()
                };

                let bytes = packet.encode();
                for addr in addresses {
                    self.socket.send_to(&bytes, addr).await?;
                }
            }
            StatePacket::UpdateBullet {
                index,
                pos,
                direction,
            } => {
                self.bullets.push(Bullet::new(index, pos, direction));
            }
            // Clients never legitimately send these.
            StatePacket::InitPlayer { .. } | StatePacket::ClearBullets => {}
        }
        Ok(())
    }

    /// Advances every bullet, resolves player hits and culls bullets that
    /// hit someone, left the world or entered a wall.
    async fn step_bullets(&mut self, dt: f32) -> io::Result<()> {
        for bullet in &mut self.bullets {
            bullet.advance(dt);
        }

        let mut spent = vec![false; self.bullets.len()];
        let mut respawns = Vec::new();
        {
            let mut session = self.session.write().await;
            let indices = session.player_indices();

            for (slot, bullet) in self.bullets.iter().enumerate() {
                for &index in &indices {
                    if index == bullet.owner {
                        continue;
                    }
                    let Some(player) = session.player_mut(index) else {
                        continue;
                    };
                    if player.pos.distance_to(bullet.pos) > HIT_RADIUS {
                        continue;
                    }

                    player.lives -= 1;
                    if player.lives <= 0 {
                        let spawn = self.maze.random_empty_cell(&mut rand::thread_rng());
                        player.pos = spawn;
                        player.lives = MAX_LIVES;
                        let direction = player.direction;
                        info!("Player {} downed by player {}", index, bullet.owner);
                        respawns.push(StatePacket::InitPlayer {
                            index,
                            pos: spawn,
                            direction,
                        });

                        if let Some(shooter) = session.player_mut(bullet.owner) {
                            shooter.score += KILL_REWARD;
                        }
                        session.send_control(bullet.owner, "score", &KILL_REWARD.to_string());
                    } else {
                        session.send_control(index, "hit", "");
                    }

                    spent[slot] = true;
                    break;
                }
            }
        }

        let maze = Arc::clone(&self.maze);
        let mut slot = 0;
        self.bullets.retain(|bullet| {
            let hit_someone = spent[slot];
            slot += 1;
            !hit_someone && bullet.is_live(&maze)
        });

        if !respawns.is_empty() {
            let addresses = self.session.read().await.addresses();
            for addr in &addresses {
                for packet in &respawns {
                    self.socket.send_to(&packet.encode(), addr).await?;
                }
            }
        }

        Ok(())
    }

    /// Broadcasts this tick's bullet set: a clear marker, then one record
    /// per surviving bullet. The record index is only the broadcast slot.
    async fn broadcast_bullets(&self) -> io::Result<()> {
        let addresses = self.session.read().await.addresses();
        if addresses.is_empty() {
            return Ok(());
        }

        let mut packets = vec![StatePacket::ClearBullets];
        for (slot, bullet) in self.bullets.iter().enumerate() {
            packets.push(StatePacket::UpdateBullet {
                index: slot as i8,
                pos: bullet.pos,
                direction: bullet.dir.angle(),
            });
        }

        for addr in &addresses {
            for packet in &packets {
                self.socket.send_to(&packet.encode(), addr).await?;
            }
        }
        Ok(())
    }

    /// One-second sub-tick: counts the clock down, and at zero announces
    /// the winner and moves the match to `Ended`.
    async fn tick_timer(&mut self) {
        self.timer = self.timer.saturating_sub(1);

        let session = self.session.read().await;
        session.broadcast_control("timer", &self.timer.to_string());

        if self.timer > 0 {
            return;
        }

        let winners = winner_names(session.players());
        info!("Time is up, winners: {}", winners);
        session.broadcast_control("end", &format!("{} won!", winners));
        drop(session);

        self.phase = MatchPhase::Ended;
    }
}

/// Names of the player(s) holding the top score, comma-separated on a tie.
fn winner_names<'a>(players: impl Iterator<Item = &'a Player>) -> String {
    let players: Vec<&Player> = players.collect();
    let top = players.iter().map(|p| p.score).max().unwrap_or(0);
    let names: Vec<&str> = players
        .iter()
        .filter(|p| p.score == top)
        .map(|p| p.name.as_str())
        .collect();
    names.join(", ")
}
