//! 2D vector type used for robot positions, displacements and pixel
//! offsets. Units are centimetres unless a caller says otherwise.

use std::ops::{Add, Mul, Neg, Sub};

/// A point or displacement in the scan plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Vec2) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Squared distance, cheaper when only comparing.
    #[inline]
    pub fn distance_squared(&self, other: &Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    /// Length of this vector.
    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Polar angle of this vector in radians, in [-pi, pi].
    #[inline]
    pub fn angle(&self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Angle of the segment from this point to another.
    #[inline]
    pub fn angle_to(&self, other: &Vec2) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Unit vector in the same direction. Zero stays zero.
    #[inline]
    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len > 0.0 {
            Vec2::new(self.x / len, self.y / len)
        } else {
            Vec2::ZERO
        }
    }

    /// Point at `distance` along `angle` from this point.
    #[inline]
    pub fn point_at(&self, angle: f32, distance: f32) -> Vec2 {
        Vec2::new(
            self.x + distance * angle.cos(),
            self.y + distance * angle.sin(),
        )
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    #[inline]
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;

    #[inline]
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}
