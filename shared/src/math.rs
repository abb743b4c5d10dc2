//! 2D vector math used by the maze, physics and interpolation code.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// A unit vector pointing at `angle` radians.
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// The angle of the vector in radians.
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Normalizes to length 1, or returns zero for the zero vector.
    pub fn normalize_or_zero(self) -> Self {
        let magnitude = self.magnitude();
        if magnitude > 0.0 {
            Self {
                x: self.x / magnitude,
                y: self.y / magnitude,
            }
        } else {
            Self::ZERO
        }
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        (other - self).magnitude()
    }

    /// Steps toward `target` by at most `max_step`, without overshooting.
    pub fn moved_towards(self, target: Vec2, max_step: f32) -> Self {
        let to_target = target - self;
        let distance = to_target.magnitude();
        if distance <= max_step || distance == 0.0 {
            target
        } else {
            self + to_target * (max_step / distance)
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}
