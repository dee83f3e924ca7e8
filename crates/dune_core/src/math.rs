//! Fixed-point math utilities for deterministic simulation.
//!
//! All game simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs,
//! which would desynchronize multiplayer games and replays.
//!
//! Angles are measured in eighths of a full turn (`0..8`), counter-clockwise
//! from east, with the y axis pointing down the map. `0` is east, `2` north,
//! `4` west and `6` south.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Number of angle units in a full turn.
pub const NUM_ANGLES: i32 = 8;

/// Fixed-point 2D vector, used for sub-tile pixel positions and speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer components.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x.saturating_mul(other.x) + self.y.saturating_mul(other.y)
    }

    /// Scale both components.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// The vector rotated a quarter turn (perpendicular).
    #[must_use]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Build a fixed-point constant from a ratio of integers.
#[must_use]
pub fn ratio(numerator: i32, denominator: i32) -> Fixed {
    Fixed::from_num(numerator) / Fixed::from_num(denominator)
}

/// Clamp a fixed-point value into `[lo, hi]`.
#[must_use]
pub fn clamp(value: Fixed, lo: Fixed, hi: Fixed) -> Fixed {
    value.max(lo).min(hi)
}

/// Wrap an angle into `[0, NUM_ANGLES)`.
#[must_use]
pub fn normalize_angle(angle: Fixed) -> Fixed {
    let full = Fixed::from_num(NUM_ANGLES);
    let mut a = angle % full;
    if a < Fixed::ZERO {
        a += full;
    }
    a
}

/// Arc tangent of `dy / dx` in angle units (`0..8`).
///
/// `dy` grows downward on the map, so a vector pointing up the screen
/// has a negative `dy` and yields angle 2.
#[must_use]
pub fn angle_of(dx: Fixed, dy: Fixed) -> Fixed {
    let y = -dy;
    let x = dx;
    if x == Fixed::ZERO && y == Fixed::ZERO {
        return Fixed::ZERO;
    }

    let ax = x.abs();
    let ay = y.abs();
    // Octant-reduced arctangent, in units of an eighth turn.
    let base = if ax >= ay {
        atan_unit(ay / ax)
    } else {
        Fixed::from_num(2) - atan_unit(ax / ay)
    };

    let angle = match (x >= Fixed::ZERO, y >= Fixed::ZERO) {
        (true, true) => base,
        (false, true) => Fixed::from_num(4) - base,
        (false, false) => Fixed::from_num(4) + base,
        (true, false) => Fixed::from_num(8) - base,
    };
    normalize_angle(angle)
}

/// Arctangent of `z` in `[0, 1]` scaled so that `atan(1) == 1`.
fn atan_unit(z: Fixed) -> Fixed {
    let a = ratio(31_157, 100_000);
    let b = ratio(8_442, 100_000);
    z + z * (Fixed::ONE - z) * (a + b * z)
}

/// Signed shortest rotation from `from` to `to`, in `(-4, 4]`.
#[must_use]
pub fn angle_diff(from: Fixed, to: Fixed) -> Fixed {
    let half = Fixed::from_num(4);
    let mut d = normalize_angle(to - from);
    if d > half {
        d -= Fixed::from_num(NUM_ANGLES);
    }
    d
}

/// Round an angle to one of the eight drawn facings.
#[must_use]
pub fn drawn_angle(angle: Fixed) -> u8 {
    let rounded = (normalize_angle(angle) + ratio(1, 2)).to_num::<i32>();
    rounded.rem_euclid(NUM_ANGLES) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near(a: Fixed, b: Fixed, eps: Fixed) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(0));
        let b = Vec2Fixed::new(Fixed::from_num(0), Fixed::from_num(4));
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
        assert!(near(a.distance(b), Fixed::from_num(5), ratio(1, 10_000)));
    }

    #[test]
    fn test_fixed_determinism() {
        let a = Fixed::from_num(1) / Fixed::from_num(3);
        let b = Fixed::from_num(1) / Fixed::from_num(3);
        assert_eq!(a, b);
        assert_eq!(a * Fixed::from_num(7), b * Fixed::from_num(7));
        assert_eq!(fixed_sqrt(Fixed::from_num(2)), fixed_sqrt(Fixed::from_num(2)));
    }

    #[test]
    fn test_sqrt_of_perfect_squares() {
        let eps = ratio(1, 100_000);
        assert!(near(fixed_sqrt(Fixed::from_num(16)), Fixed::from_num(4), eps));
        assert!(near(fixed_sqrt(Fixed::from_num(4096)), Fixed::from_num(64), eps));
        assert_eq!(fixed_sqrt(Fixed::from_num(-3)), Fixed::ZERO);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(4));
        let norm = v.normalize();
        let one = Fixed::ONE;
        let epsilon = one / Fixed::from_num(10000);
        assert!((norm.dot(norm) - one).abs() < epsilon);
        let ratio_diff = (norm.x * Fixed::from_num(4)) - (norm.y * Fixed::from_num(3));
        assert!(ratio_diff.abs() < epsilon);
    }

    #[test]
    fn test_angle_of_cardinal_directions() {
        let one = Fixed::ONE;
        let zero = Fixed::ZERO;
        let eps = ratio(1, 1000);
        assert!(near(angle_of(one, zero), Fixed::from_num(0), eps));
        assert!(near(angle_of(zero, -one), Fixed::from_num(2), eps));
        assert!(near(angle_of(-one, zero), Fixed::from_num(4), eps));
        assert!(near(angle_of(zero, one), Fixed::from_num(6), eps));
        assert!(near(angle_of(one, -one), Fixed::from_num(1), eps));
        assert!(near(angle_of(-one, one), Fixed::from_num(5), eps));
    }

    #[test]
    fn test_angle_diff_takes_short_way() {
        assert_eq!(angle_diff(Fixed::from_num(7), Fixed::from_num(1)), Fixed::from_num(2));
        assert_eq!(angle_diff(Fixed::from_num(1), Fixed::from_num(7)), Fixed::from_num(-2));
        assert_eq!(drawn_angle(Fixed::from_num(7) + ratio(3, 4)), 0);
    }
}
