//! Client-side world state.
//!
//! The local player moves immediately in response to input and only ever
//! snaps when the server respawns us. Remote players are rendered at a
//! smoothed position that chases the last reported one, which hides the
//! gaps between state packets.

use std::collections::HashMap;

use shared::{Bullet, Player, StatePacket, Vec2, CATCH_UP_SPEED, MAX_LIVES};

use crate::network::ControlEvent;

/// Where the session currently stands from this client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Lobby,
    Running,
    Ended,
}

/// A remote player's smoothed and last-reported positions.
#[derive(Debug, Clone, Copy)]
pub struct RemotePlayer {
    pub current: Vec2,
    pub target: Vec2,
    pub direction: f32,
}

/// Everything the client knows about the match.
pub struct ClientWorld {
    pub local: Player,
    pub remotes: HashMap<i8, RemotePlayer>,
    pub bullets: Vec<Bullet>,
    pub roster: Vec<String>,
    pub maze: Option<shared::Maze>,
    pub timer: u32,
    pub phase: ClientPhase,
    pub winner: Option<String>,
}

impl ClientWorld {
    pub fn new(index: i8, name: String) -> Self {
        Self {
            local: Player::new(index, Vec2::ZERO, name),
            remotes: HashMap::new(),
            bullets: Vec::new(),
            roster: Vec::new(),
            maze: None,
            timer: 0,
            phase: ClientPhase::Lobby,
            winner: None,
        }
    }

    /// Applies one control-channel event.
    pub fn apply_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Roster(name) => self.roster.push(name),
            ControlEvent::Start(maze) => {
                self.maze = Some(maze);
                self.phase = ClientPhase::Running;
            }
            ControlEvent::Timer(seconds) => self.timer = seconds,
            ControlEvent::Hit => self.local.lives = self.local.lives.saturating_sub(1),
            ControlEvent::Score(points) => self.local.score += points,
            ControlEvent::End(text) => {
                self.phase = ClientPhase::Ended;
                self.winner = Some(text);
            }
            ControlEvent::PlayerLeft(index) => {
                self.remotes.remove(&index);
            }
        }
    }

    /// Applies one state-channel packet.
    ///
    /// A spawn record for our own slot is the one case where the server
    /// overrides the locally simulated position; aim stays client-owned.
    pub fn apply_state(&mut self, packet: StatePacket) {
        match packet {
            StatePacket::InitPlayer { index, pos, .. } if index == self.local.index => {
                self.local.pos = pos;
                self.local.velocity = Vec2::ZERO;
                self.local.lives = MAX_LIVES;
            }
            StatePacket::UpdatePlayer { index, .. } if index == self.local.index => {
                // An echo of our own report; the local simulation wins.
            }
            StatePacket::InitPlayer {
                index,
                pos,
                direction,
            }
            | StatePacket::UpdatePlayer {
                index,
                pos,
                direction,
            } => {
                let remote = self.remotes.entry(index).or_insert(RemotePlayer {
                    current: pos,
                    target: pos,
                    direction,
                });
                remote.target = pos;
                remote.direction = direction;
            }
            StatePacket::UpdateBullet {
                index,
                pos,
                direction,
            } => self.bullets.push(Bullet::new(index, pos, direction)),
            StatePacket::ClearBullets => self.bullets.clear(),
        }
    }

    /// Advances the local player one frame from the current input vector.
    /// Returns whether we actually moved. Does nothing before the maze
    /// has arrived.
    pub fn step_local(&mut self, wasd: Vec2, dt: f32) -> bool {
        let Some(maze) = &self.maze else {
            return false;
        };
        self.local.calculate_velocity(wasd, dt);
        self.local.check_collision(maze);
        self.local.apply_movement()
    }

    /// Moves every remote's smoothed position toward its last report.
    pub fn step_interpolation(&mut self, dt: f32) {
        for remote in self.remotes.values_mut() {
            remote.current = remote.current.moved_towards(remote.target, CATCH_UP_SPEED * dt);
        }
    }
}
