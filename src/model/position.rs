use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

/// Pixel tolerance used when comparing positions.
const EPSILON: f64 = 1e-9;

/// Pixel sizes that turn a [`Position`] into screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node_width: f64,
    pub node_height: f64,
    pub node_gap: f64,
    pub row_gap: f64,
}

impl NodeMetrics {
    /// Top edge of a stamp in the given row.
    pub fn row_y(&self, row: usize) -> f64 {
        self.row_gap + row as f64 * (self.node_height + self.row_gap)
    }
}

/// Horizontal position counted in node widths and node gaps rather than
/// pixels, so a resize only changes the conversion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub widths: f64,
    pub gaps: f64,
}

impl Position {
    pub const ZERO: Position = Position::new(0.0, 0.0);
    /// Leftmost allowed position.
    pub const MARGIN: Position = Position::new(0.0, 1.0);
    /// Minimum distance between the left edges of two neighbours.
    pub const STEP: Position = Position::new(1.0, 1.0);

    pub const fn new(widths: f64, gaps: f64) -> Self { Position { widths, gaps } }

    pub fn pixels(self, metrics: &NodeMetrics) -> f64 {
        self.widths * metrics.node_width + self.gaps * metrics.node_gap
    }

    pub fn to_pixels(self, node_width: f64, node_gap: f64) -> i32 {
        (self.widths * node_width + self.gaps * node_gap).round() as i32
    }

    pub fn scale(self, factor: f64) -> Self {
        Position::new(self.widths * factor, self.gaps * factor)
    }

    pub fn midpoint(a: Position, b: Position) -> Self { (a + b).scale(0.5) }

    /// The more restrictive of two distances. Ties keep `self`.
    pub fn min_by(self, other: Position, metrics: &NodeMetrics) -> Self {
        if other.pixels(metrics) < self.pixels(metrics) - EPSILON {
            other
        } else {
            self
        }
    }

    pub fn is_positive(self, metrics: &NodeMetrics) -> bool { self.pixels(metrics) > EPSILON }

    /// Whether `self` lies left of `other` by more than the tolerance.
    pub fn is_left_of(self, other: Position, metrics: &NodeMetrics) -> bool {
        (other - self).is_positive(metrics)
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.widths + rhs.widths, self.gaps + rhs.gaps)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) { *self = *self + rhs; }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.widths - rhs.widths, self.gaps - rhs.gaps)
    }
}

impl SubAssign for Position {
    fn sub_assign(&mut self, rhs: Position) { *self = *self - rhs; }
}

impl Mul<f64> for Position {
    type Output = Position;

    fn mul(self, rhs: f64) -> Position { self.scale(rhs) }
}

impl Neg for Position {
    type Output = Position;

    fn neg(self) -> Position { Position::new(-self.widths, -self.gaps) }
}
