//! Integer tile and pixel coordinates.

use serde::{Deserialize, Serialize};

use crate::math::{fixed_sqrt, Fixed, Vec2Fixed};

/// Edge length of one tile in pixels.
pub const TILESIZE: i32 = 64;

/// Integer coordinate pair.
///
/// Used as a tile coordinate on the map grid and, scaled by [`TILESIZE`],
/// as a pixel coordinate. [`Coord::INVALID`] marks "no coordinate" and is
/// what spatial searches return when they find nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coord {
    /// Sentinel for "no coordinate".
    pub const INVALID: Self = Self { x: -1, y: -1 };

    /// Origin.
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Whether this is a real coordinate rather than [`Coord::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.x >= 0 && self.y >= 0
    }

    /// Maximum of the axis distances (king-move distance).
    #[must_use]
    pub fn chebyshev_distance(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    /// Euclidean distance in tiles.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        let dx = Fixed::from_num(self.x - other.x);
        let dy = Fixed::from_num(self.y - other.y);
        fixed_sqrt(dx * dx + dy * dy)
    }

    /// Squared Euclidean distance in tiles (exact integer).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }

    /// Pixel position of this tile's centre.
    #[must_use]
    pub fn tile_center(self) -> Vec2Fixed {
        Vec2Fixed::from_ints(self.x * TILESIZE + TILESIZE / 2, self.y * TILESIZE + TILESIZE / 2)
    }

    /// Pixel position of this tile's top-left corner.
    #[must_use]
    pub fn tile_origin(self) -> Vec2Fixed {
        Vec2Fixed::from_ints(self.x * TILESIZE, self.y * TILESIZE)
    }

    /// Tile containing a pixel position.
    #[must_use]
    pub fn from_pixels(pos: Vec2Fixed) -> Self {
        let size = Fixed::from_num(TILESIZE);
        Self::new(
            (pos.x / size).floor().to_num::<i32>(),
            (pos.y / size).floor().to_num::<i32>(),
        )
    }

    /// The eight neighbouring coordinates, starting east and turning
    /// counter-clockwise.
    #[must_use]
    pub fn neighbours(self) -> [Self; 8] {
        [
            Self::new(self.x + 1, self.y),
            Self::new(self.x + 1, self.y - 1),
            Self::new(self.x, self.y - 1),
            Self::new(self.x - 1, self.y - 1),
            Self::new(self.x - 1, self.y),
            Self::new(self.x - 1, self.y + 1),
            Self::new(self.x, self.y + 1),
            Self::new(self.x + 1, self.y + 1),
        ]
    }

    /// Encode for a command parameter slot; invalid maps to `u32::MAX`.
    #[must_use]
    pub const fn x_param(self) -> u32 {
        if self.is_valid() {
            self.x as u32
        } else {
            u32::MAX
        }
    }

    /// Encode for a command parameter slot; invalid maps to `u32::MAX`.
    #[must_use]
    pub const fn y_param(self) -> u32 {
        if self.is_valid() {
            self.y as u32
        } else {
            u32::MAX
        }
    }

    /// Decode from two command parameter slots.
    #[must_use]
    pub fn from_params(x: u32, y: u32) -> Self {
        match (i32::try_from(x), i32::try_from(y)) {
            (Ok(x), Ok(y)) => Self::new(x, y),
            _ => Self::INVALID,
        }
    }
}

impl Default for Coord {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::ops::Add for Coord {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Coord {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<i32> for Coord {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Div<i32> for Coord {
    type Output = Self;

    fn div(self, rhs: i32) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_is_distinct() {
        assert!(!Coord::INVALID.is_valid());
        assert!(Coord::ZERO.is_valid());
        assert_ne!(Coord::INVALID, Coord::ZERO);
        assert_eq!(Coord::default(), Coord::INVALID);
    }

    #[test]
    fn test_componentwise_ops() {
        let a = Coord::new(3, 4);
        let b = Coord::new(1, 2);
        assert_eq!(a + b, Coord::new(4, 6));
        assert_eq!(a - b, Coord::new(2, 2));
        assert_eq!(a * 2, Coord::new(6, 8));
        assert_eq!(a / 2, Coord::new(1, 2));
    }

    #[test]
    fn test_pixel_round_trip() {
        let c = Coord::new(5, 9);
        assert_eq!(Coord::from_pixels(c.tile_center()), c);
        assert_eq!(Coord::from_pixels(c.tile_origin()), c);
        assert_eq!(c.tile_center(), Vec2Fixed::from_ints(5 * 64 + 32, 9 * 64 + 32));
    }

    #[test]
    fn test_param_encoding_of_invalid() {
        let c = Coord::INVALID;
        assert_eq!(Coord::from_params(c.x_param(), c.y_param()), Coord::INVALID);
        assert_eq!(Coord::from_params(7, 8), Coord::new(7, 8));
    }

    #[test]
    fn test_distances() {
        let a = Coord::new(0, 0);
        let b = Coord::new(3, 4);
        assert_eq!(a.chebyshev_distance(b), 4);
        assert_eq!(a.distance_squared(b), 25);
        assert!((a.distance(b) - Fixed::from_num(5)).abs() < Fixed::from_num(1) / Fixed::from_num(1000));
    }
}
