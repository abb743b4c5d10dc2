//! State and logic shared between the maze-shooter server and client:
//! world constants, vector math, maze generation, the DDA visibility probe,
//! player/bullet physics and the two-channel wire protocol.

pub mod entity;
pub mod math;
pub mod maze;
pub mod protocol;
pub mod raycast;

pub use entity::{Bullet, Player};
pub use math::Vec2;
pub use maze::{Cell, Maze};
pub use protocol::{ControlCodec, StatePacket};
pub use raycast::{raycast, Ray};

/// Maze size in rooms; the world grid interleaves walls between them.
pub const MAZE_WIDTH: usize = 8;
pub const MAZE_HEIGHT: usize = 8;
pub const WORLD_WIDTH: usize = MAZE_WIDTH * 2 + 1;
pub const WORLD_HEIGHT: usize = MAZE_HEIGHT * 2 + 1;

pub const MAX_LIVES: i32 = 3;

/// Match length in seconds.
pub const GAME_TIME: u32 = 120;

/// Player movement speed in world units per second.
pub const PLAYER_SPEED: f32 = 2.0;
/// Distance probed ahead of the intended displacement for wall collision.
pub const COLLISION_RADIUS: f32 = 0.25;

pub const BULLET_SPEED: f32 = 10.0;
/// Bullet-to-player distance that counts as a hit.
pub const HIT_RADIUS: f32 = 0.3;
/// Points credited to the shooter for taking a player down.
pub const KILL_REWARD: i32 = 100;

/// Server simulation rate.
pub const TICK_RATE: u32 = 60;
/// Client position uplink rate.
pub const SEND_RATE: u32 = 30;
/// Speed at which a remote player's rendered position chases its last
/// reported position, in world units per second.
pub const CATCH_UP_SPEED: f32 = 10.0;

pub const DEFAULT_TCP_PORT: u16 = 23456;
pub const DEFAULT_UDP_PORT: u16 = 23456;
