//! Player and bullet state with their per-tick physics.

use crate::math::Vec2;
use crate::maze::Maze;
use crate::{BULLET_SPEED, COLLISION_RADIUS, MAX_LIVES, PLAYER_SPEED};

#[derive(Debug, Clone)]
pub struct Player {
    pub index: i8,
    pub pos: Vec2,
    /// Facing angle in radians.
    pub direction: f32,
    pub velocity: Vec2,
    pub lives: i32,
    pub score: i32,
    pub name: String,
}

impl Player {
    pub fn new(index: i8, pos: Vec2, name: String) -> Self {
        Self {
            index,
            pos,
            direction: 0.0,
            velocity: Vec2::ZERO,
            lives: MAX_LIVES,
            score: 0,
            name,
        }
    }

    /// Computes the velocity for this tick from a WASD-style input vector:
    /// the facing vector rotated by the input's angle, normalized and scaled
    /// by speed and delta time. Zero input means zero velocity.
    pub fn calculate_velocity(&mut self, wasd: Vec2, dt: f32) {
        if wasd != Vec2::ZERO {
            let movement_angle = wasd.angle();
            let (sin, cos) = movement_angle.sin_cos();

            let facing = Vec2::from_angle(self.direction);
            self.velocity = Vec2::new(
                facing.x * cos - facing.y * sin,
                facing.x * sin + facing.y * cos,
            );
        } else {
            self.velocity = Vec2::ZERO;
        }

        self.velocity = self.velocity.normalize_or_zero() * PLAYER_SPEED * dt;
    }

    /// Zeroes each velocity axis whose probed cell is a wall. Probing the
    /// axes independently keeps the other axis moving, so players slide
    /// along walls instead of stopping dead.
    pub fn check_collision(&mut self, maze: &Maze) {
        // signum() maps 0.0 to 1.0; a stationary axis must not probe ahead.
        let sign = |x: f32| ((x > 0.0) as i32 - (x < 0.0) as i32) as f32;
        let probe = Vec2::new(
            sign(self.velocity.x) * COLLISION_RADIUS,
            sign(self.velocity.y) * COLLISION_RADIUS,
        );

        if maze.is_wall_at(Vec2::new(
            self.pos.x,
            self.pos.y + self.velocity.y + probe.y,
        )) {
            self.velocity.y = 0.0;
        }
        if maze.is_wall_at(Vec2::new(
            self.pos.x + self.velocity.x + probe.x,
            self.pos.y,
        )) {
            self.velocity.x = 0.0;
        }
    }

    /// Advances the position by the current velocity. Returns whether the
    /// position actually changed, so callers can skip network updates for
    /// stationary ticks.
    pub fn apply_movement(&mut self) -> bool {
        if self.velocity == Vec2::ZERO {
            return false;
        }
        self.pos += self.velocity;
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bullet {
    pub owner: i8,
    pub pos: Vec2,
    /// Unit direction of travel.
    pub dir: Vec2,
}

impl Bullet {
    pub fn new(owner: i8, pos: Vec2, angle: f32) -> Self {
        Self {
            owner,
            pos,
            dir: Vec2::from_angle(angle),
        }
    }

    pub fn advance(&mut self, dt: f32) {
        self.pos += self.dir * BULLET_SPEED * dt;
    }

    /// A bullet dies once it leaves the world or enters a wall cell.
    pub fn is_live(&self, maze: &Maze) -> bool {
        maze.in_bounds(self.pos) && !maze.is_wall_at(self.pos)
    }
}
