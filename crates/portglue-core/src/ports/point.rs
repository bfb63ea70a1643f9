//! Point port.

use super::{Anchor, PortTrait};
use crate::geometry::{GeometryResult, Position};
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};

/// A port whose attachable surface is a single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPort {
    point: Position,
    #[serde(default = "default_connectable")]
    connectable: bool,
}

fn default_connectable() -> bool {
    true
}

impl PointPort {
    /// Create a point port. Fails for non-finite coordinates.
    pub fn new(point: Position) -> GeometryResult<Self> {
        point.validate()?;
        Ok(Self {
            point,
            connectable: true,
        })
    }

    pub fn point(&self) -> Position {
        self.point
    }

    pub fn with_connectable(mut self, connectable: bool) -> Self {
        self.connectable = connectable;
        self
    }

    pub fn transform(&self, affine: Affine) -> Self {
        Self {
            point: self.point.transform(affine),
            connectable: self.connectable,
        }
    }
}

impl PortTrait for PointPort {
    fn distance(&self, point: Position) -> (Position, f64) {
        (self.point, point.distance(self.point))
    }

    fn is_connectable(&self) -> bool {
        self.connectable
    }

    fn bounds(&self) -> Rect {
        Rect::from_points(self.point.to_point(), self.point.to_point())
    }

    fn anchor(&self, _point: Position) -> Anchor {
        Anchor::Fixed
    }

    fn anchor_position(&self, _anchor: Anchor) -> Position {
        self.point
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_scenario() {
        let port = PointPort::new(Position::new(3.0, 4.0)).unwrap();
        let (nearest, d) = port.distance(Position::new(0.0, 0.0));
        assert_eq!(nearest, Position::new(3.0, 4.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distance_on_surface_is_zero() {
        let port = PointPort::new(Position::new(-2.0, 8.0)).unwrap();
        let (nearest, d) = port.distance(Position::new(-2.0, 8.0));
        assert_eq!(nearest, port.point());
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_distance_always_returns_fixed_point() {
        let port = PointPort::new(Position::new(1.0, 1.0)).unwrap();
        for &(x, y) in &[(0.0, 0.0), (100.0, -3.0), (1.0, 50.0), (-7.5, 2.25)] {
            let q = Position::new(x, y);
            let (nearest, d) = port.distance(q);
            assert_eq!(nearest, Position::new(1.0, 1.0));
            assert!((d - q.distance(Position::new(1.0, 1.0))).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_idempotent() {
        let port = PointPort::new(Position::new(2.0, 3.0)).unwrap();
        let q = Position::new(11.0, -4.0);
        assert_eq!(port.distance(q), port.distance(q));
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(PointPort::new(Position::new(f64::INFINITY, 0.0)).is_err());
    }

    #[test]
    fn test_anchor_is_fixed() {
        let port = PointPort::new(Position::new(5.0, 5.0)).unwrap();
        assert_eq!(port.anchor(Position::new(0.0, 0.0)), Anchor::Fixed);
        assert_eq!(port.anchor_position(Anchor::Along(0.7)), Position::new(5.0, 5.0));
    }
}
