//! Basic geometry: positions and point/segment distance helpers.

use kurbo::{Affine, Point, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometry errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Invalid geometry: coordinate ({x}, {y}) is not finite")]
    InvalidGeometry { x: f64, y: f64 },
    #[error("Degenerate segment: start and end coincide at ({x}, {y})")]
    DegenerateSegment { x: f64, y: f64 },
    #[error("A line needs at least two points, got {count}")]
    NotEnoughPoints { count: usize },
    #[error("Item transform is not finite or not invertible")]
    InvalidTransform,
}

/// Result type for geometry operations.
pub type GeometryResult<T> = Result<T, GeometryError>;

/// A 2D coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    /// Create a position without validating the coordinates.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a position, rejecting NaN and infinite coordinates.
    pub fn try_new(x: f64, y: f64) -> GeometryResult<Self> {
        let pos = Self { x, y };
        pos.validate()?;
        Ok(pos)
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    /// Update both coordinates in place.
    pub fn set(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Check that both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn validate(&self) -> GeometryResult<()> {
        if self.is_finite() {
            Ok(())
        } else {
            Err(GeometryError::InvalidGeometry { x: self.x, y: self.y })
        }
    }

    /// Euclidean distance to another position.
    pub fn distance(&self, other: Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Linear interpolation towards `other` (`t = 0` is self, `t = 1` is other).
    pub fn lerp(&self, other: Position, t: f64) -> Position {
        Position::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }

    pub fn to_point(self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Apply an affine transform.
    pub fn transform(self, affine: Affine) -> Position {
        (affine * self.to_point()).into()
    }

    pub fn offset(self, delta: Vec2) -> Position {
        Position::new(self.x + delta.x, self.y + delta.y)
    }
}

impl From<Point> for Position {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<Position> for Point {
    fn from(p: Position) -> Self {
        Point::new(p.x, p.y)
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Projection parameter of `point` onto the segment `a -> b`, clamped to [0, 1].
///
/// Returns 0 for a zero-length segment.
pub fn segment_parameter(point: Position, a: Position, b: Position) -> f64 {
    let seg = Vec2::new(b.x - a.x, b.y - a.y);
    let pv = Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq == 0.0 {
        return 0.0;
    }
    (pv.dot(seg) / len_sq).clamp(0.0, 1.0)
}

/// Check that an item transform has finite coefficients and can be inverted.
pub fn validate_transform(affine: Affine) -> GeometryResult<()> {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let finite = [a, b, c, d, e, f].iter().all(|v| v.is_finite());
    if finite && a * d - b * c != 0.0 {
        Ok(())
    } else {
        Err(GeometryError::InvalidTransform)
    }
}

/// Nearest point on segment `a -> b` to `point`, and its distance.
pub fn nearest_on_segment(point: Position, a: Position, b: Position) -> (Position, f64) {
    let t = segment_parameter(point, a, b);
    let nearest = a.lerp(b, t);
    (nearest, point.distance(nearest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_non_finite() {
        assert!(Position::try_new(1.0, 2.0).is_ok());
        assert!(matches!(
            Position::try_new(f64::NAN, 0.0),
            Err(GeometryError::InvalidGeometry { .. })
        ));
        assert!(Position::try_new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_set_in_place() {
        let mut pos = Position::new(1.0, 2.0);
        pos.set(3.5, -4.0);
        assert_eq!(pos, Position::new(3.5, -4.0));
        assert_eq!(pos.x(), 3.5);
        assert_eq!(pos.y(), -4.0);
    }

    #[test]
    fn test_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_kurbo_conversion() {
        let pos: Position = Point::new(7.0, 8.0).into();
        assert_eq!(pos, Position::new(7.0, 8.0));
        let back: Point = pos.into();
        assert_eq!(back, Point::new(7.0, 8.0));
    }

    #[test]
    fn test_transform_translate() {
        let pos = Position::new(1.0, 1.0).transform(Affine::translate((10.0, 20.0)));
        assert_eq!(pos, Position::new(11.0, 21.0));
    }

    #[test]
    fn test_nearest_on_segment_clamps() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(10.0, 0.0);
        let (p, d) = nearest_on_segment(Position::new(-5.0, 0.0), a, b);
        assert_eq!(p, a);
        assert!((d - 5.0).abs() < f64::EPSILON);

        let (p, d) = nearest_on_segment(Position::new(14.0, 3.0), a, b);
        assert_eq!(p, b);
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_segment_parameter_degenerate() {
        let a = Position::new(2.0, 2.0);
        assert_eq!(segment_parameter(Position::new(9.0, 9.0), a, a), 0.0);
    }

    #[test]
    fn test_short_segment_is_not_a_point() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(1e-9, 0.0);
        let (p, d) = nearest_on_segment(Position::new(5e-10, 1.0), a, b);
        assert!((p.x - 5e-10).abs() < 1e-18);
        assert_eq!(p.y, 0.0);
        assert!((d - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_transform() {
        assert!(validate_transform(Affine::translate((3.0, 4.0))).is_ok());
        assert_eq!(validate_transform(Affine::scale(0.0)), Err(GeometryError::InvalidTransform));
        assert_eq!(
            validate_transform(Affine::translate((f64::NAN, 0.0))),
            Err(GeometryError::InvalidTransform)
        );
    }
}
