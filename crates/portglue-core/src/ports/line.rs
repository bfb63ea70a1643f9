//! Line port.

use super::{Anchor, PortTrait};
use crate::geometry::{nearest_on_segment, segment_parameter, GeometryError, GeometryResult, Position};
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};

/// A port whose attachable surface is the segment `start -> end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinePort {
    start: Position,
    end: Position,
    #[serde(default = "default_connectable")]
    connectable: bool,
}

fn default_connectable() -> bool {
    true
}

impl LinePort {
    /// Create a line port.
    ///
    /// Fails with [`GeometryError::DegenerateSegment`] when `start == end`;
    /// use [`Port::from_segment`](super::Port::from_segment) to get a point
    /// port for that case instead.
    pub fn new(start: Position, end: Position) -> GeometryResult<Self> {
        start.validate()?;
        end.validate()?;
        if start == end {
            return Err(GeometryError::DegenerateSegment {
                x: start.x,
                y: start.y,
            });
        }
        Ok(Self {
            start,
            end,
            connectable: true,
        })
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn with_connectable(mut self, connectable: bool) -> Self {
        self.connectable = connectable;
        self
    }

    /// Transformed copy. A degenerate transform may collapse the segment; distance
    /// queries then fall back to point behaviour.
    pub fn transform(&self, affine: Affine) -> Self {
        Self {
            start: self.start.transform(affine),
            end: self.end.transform(affine),
            connectable: self.connectable,
        }
    }
}

impl PortTrait for LinePort {
    fn distance(&self, point: Position) -> (Position, f64) {
        nearest_on_segment(point, self.start, self.end)
    }

    fn is_connectable(&self) -> bool {
        self.connectable
    }

    fn bounds(&self) -> Rect {
        Rect::from_points(self.start.to_point(), self.end.to_point())
    }

    fn anchor(&self, point: Position) -> Anchor {
        Anchor::Along(segment_parameter(point, self.start, self.end))
    }

    fn anchor_position(&self, anchor: Anchor) -> Position {
        match anchor {
            Anchor::Along(t) => self.start.lerp(self.end, t.clamp(0.0, 1.0)),
            Anchor::Fixed => self.start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn horizontal() -> LinePort {
        LinePort::new(Position::new(0.0, 0.0), Position::new(10.0, 0.0)).unwrap()
    }

    #[test]
    fn test_distance_scenario() {
        let (nearest, d) = horizontal().distance(Position::new(5.0, 5.0));
        assert_eq!(nearest, Position::new(5.0, 0.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distance_beyond_end_clamps() {
        let (nearest, d) = horizontal().distance(Position::new(13.0, 4.0));
        assert_eq!(nearest, Position::new(10.0, 0.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_distance_on_surface_is_zero() {
        let port = LinePort::new(Position::new(1.0, 1.0), Position::new(5.0, 5.0)).unwrap();
        let (nearest, d) = port.distance(Position::new(3.0, 3.0));
        assert!(d < 1e-12);
        assert!(nearest.distance(Position::new(3.0, 3.0)) < 1e-12);
    }

    #[test]
    fn test_nearest_is_minimal_along_segment() {
        let port = LinePort::new(Position::new(-4.0, 2.0), Position::new(6.0, -3.0)).unwrap();
        let queries = [(0.0, 0.0), (10.0, 10.0), (-9.0, 5.0), (2.5, -7.0), (6.0, -3.0)];
        for &(x, y) in &queries {
            let q = Position::new(x, y);
            let (nearest, d) = port.distance(q);
            // Nearest lies on the segment.
            let t = segment_parameter(nearest, port.start(), port.end());
            assert!(port.start().lerp(port.end(), t).distance(nearest) < 1e-9);
            // No sampled point on the segment is closer.
            for i in 0..=100 {
                let sample = port.start().lerp(port.end(), i as f64 / 100.0);
                assert!(q.distance(sample) + 1e-9 >= d);
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let port = horizontal();
        let q = Position::new(7.25, -1.5);
        assert_eq!(port.distance(q), port.distance(q));
    }

    #[test]
    fn test_rejects_degenerate() {
        let p = Position::new(2.0, 2.0);
        assert_eq!(
            LinePort::new(p, p),
            Err(GeometryError::DegenerateSegment { x: 2.0, y: 2.0 })
        );
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(LinePort::new(Position::new(0.0, 0.0), Position::new(f64::NAN, 1.0)).is_err());
    }

    #[test]
    fn test_collapsed_by_transform_uses_point_distance() {
        let port = horizontal().transform(Affine::scale(0.0));
        let (nearest, d) = port.distance(Position::new(3.0, 4.0));
        assert_eq!(nearest, Position::new(0.0, 0.0));
        assert!((d - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_anchor_round_trip() {
        let port = horizontal();
        let anchor = port.anchor(Position::new(2.5, 9.0));
        assert_eq!(anchor, Anchor::Along(0.25));
        assert_eq!(port.anchor_position(anchor), Position::new(2.5, 0.0));
    }
}
