//! Element: a box with corner handles and side ports.

use super::{ItemId, ItemTrait};
use crate::geometry::{validate_transform, GeometryResult, Position};
use crate::handle::Handle;
use crate::ports::Port;
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rectangular element.
///
/// The top-left corner sits at the local origin; `matrix` places it in the
/// world. Corner handles resize the box, side ports accept connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub(crate) id: ItemId,
    matrix: Affine,
    width: f64,
    height: f64,
    min_width: f64,
    min_height: f64,
    pub(crate) handles: Vec<Handle>,
    ports: Vec<Port>,
}

impl Element {
    /// Top-left handle index.
    pub const NW: usize = 0;
    /// Top-right handle index.
    pub const NE: usize = 1;
    /// Bottom-right handle index.
    pub const SE: usize = 2;
    /// Bottom-left handle index.
    pub const SW: usize = 3;

    pub const TOP: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const LEFT: usize = 3;

    /// Default minimum width and height.
    pub const DEFAULT_MIN_SIZE: f64 = 10.0;

    /// Create an element with its top-left corner at `position` (world).
    pub fn new(position: Position, width: f64, height: f64) -> GeometryResult<Self> {
        position.validate()?;
        Position::new(width, height).validate()?;
        let mut element = Self {
            id: Uuid::new_v4(),
            matrix: Affine::translate(position.to_point().to_vec2()),
            width: width.max(Self::DEFAULT_MIN_SIZE),
            height: height.max(Self::DEFAULT_MIN_SIZE),
            min_width: Self::DEFAULT_MIN_SIZE,
            min_height: Self::DEFAULT_MIN_SIZE,
            handles: Vec::new(),
            ports: Vec::new(),
        };
        element.rebuild()?;
        Ok(element)
    }

    /// Set the minimum size; the current size grows to match if needed.
    pub fn with_min_size(mut self, min_width: f64, min_height: f64) -> GeometryResult<Self> {
        Position::new(min_width, min_height).validate()?;
        self.min_width = min_width.max(0.0);
        self.min_height = min_height.max(0.0);
        self.width = self.width.max(self.min_width);
        self.height = self.height.max(self.min_height);
        self.rebuild()?;
        Ok(self)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn min_width(&self) -> f64 {
        self.min_width
    }

    pub fn min_height(&self) -> f64 {
        self.min_height
    }

    /// Resize keeping the top-left corner fixed.
    pub fn resize(&mut self, width: f64, height: f64) -> GeometryResult<()> {
        Position::new(width, height).validate()?;
        self.width = width.max(self.min_width);
        self.height = height.max(self.min_height);
        self.rebuild()
    }

    fn corners(&self) -> [Position; 4] {
        [
            Position::new(0.0, 0.0),
            Position::new(self.width, 0.0),
            Position::new(self.width, self.height),
            Position::new(0.0, self.height),
        ]
    }

    /// Recompute handles and ports from width/height.
    fn rebuild(&mut self) -> GeometryResult<()> {
        let corners = self.corners();
        if self.handles.len() == corners.len() {
            for (handle, corner) in self.handles.iter_mut().zip(corners) {
                handle.move_to(corner);
            }
        } else {
            self.handles = corners.iter().map(|&c| Handle::new(c)).collect();
        }
        self.ports = (0..4)
            .map(|i| Port::from_segment(corners[i], corners[(i + 1) % 4]))
            .collect::<GeometryResult<Vec<_>>>()?;
        Ok(())
    }
}

impl ItemTrait for Element {
    fn id(&self) -> ItemId {
        self.id
    }

    fn matrix(&self) -> Affine {
        self.matrix
    }

    fn set_matrix(&mut self, matrix: Affine) {
        self.matrix = matrix;
    }

    fn handles(&self) -> &[Handle] {
        &self.handles
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn set_handle_position(&mut self, index: usize, local: Position) -> GeometryResult<bool> {
        if index >= self.handles.len() {
            return Ok(false);
        }
        local.validate()?;

        // Which edges this corner controls.
        let moves_left = matches!(index, Self::NW | Self::SW);
        let moves_top = matches!(index, Self::NW | Self::NE);

        let (shift_x, width) = if moves_left {
            let left = local.x.min(self.width - self.min_width);
            (left, self.width - left)
        } else {
            (0.0, local.x.max(self.min_width))
        };
        let (shift_y, height) = if moves_top {
            let top = local.y.min(self.height - self.min_height);
            (top, self.height - top)
        } else {
            (0.0, local.y.max(self.min_height))
        };

        // Keep the top-left corner at the local origin.
        self.matrix = self.matrix * Affine::translate((shift_x, shift_y));
        self.width = width;
        self.height = height;
        self.rebuild()?;
        Ok(true)
    }

    fn local_bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    fn restore(&mut self) -> GeometryResult<()> {
        validate_transform(self.matrix)?;
        Position::new(self.width, self.height).validate()?;
        Position::new(self.min_width, self.min_height).validate()?;
        self.min_width = self.min_width.max(0.0);
        self.min_height = self.min_height.max(0.0);
        self.width = self.width.max(self.min_width);
        self.height = self.height.max(self.min_height);
        self.rebuild()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortTrait;

    #[test]
    fn test_element_creation() {
        let e = Element::new(Position::new(10.0, 20.0), 100.0, 50.0).unwrap();
        assert_eq!(e.handles().len(), 4);
        assert_eq!(e.ports().len(), 4);
        assert_eq!(e.handles()[Element::SE].position(), Position::new(100.0, 50.0));
        assert!(e.handles().iter().all(|h| !h.connectable));
        assert!(e.ports().iter().all(|p| p.is_connectable()));
    }

    #[test]
    fn test_min_size_applied_on_creation() {
        let e = Element::new(Position::ORIGIN, 1.0, 2.0).unwrap();
        assert_eq!(e.width(), Element::DEFAULT_MIN_SIZE);
        assert_eq!(e.height(), Element::DEFAULT_MIN_SIZE);
    }

    #[test]
    fn test_side_ports() {
        let e = Element::new(Position::ORIGIN, 40.0, 20.0).unwrap();
        match &e.ports()[Element::RIGHT] {
            Port::Line(l) => {
                assert_eq!(l.start(), Position::new(40.0, 0.0));
                assert_eq!(l.end(), Position::new(40.0, 20.0));
            }
            other => panic!("expected line port, got {other:?}"),
        }
        let (nearest, d) = e.ports()[Element::LEFT].distance(Position::new(-3.0, 10.0));
        assert_eq!(nearest, Position::new(0.0, 10.0));
        assert!((d - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_drag_se_resizes() {
        let mut e = Element::new(Position::ORIGIN, 40.0, 20.0).unwrap();
        assert!(e.set_handle_position(Element::SE, Position::new(60.0, 30.0)).unwrap());
        assert_eq!(e.width(), 60.0);
        assert_eq!(e.height(), 30.0);
        assert_eq!(e.matrix(), Affine::IDENTITY);
    }

    #[test]
    fn test_drag_nw_moves_origin() {
        let mut e = Element::new(Position::new(100.0, 100.0), 40.0, 20.0).unwrap();
        assert!(e.set_handle_position(Element::NW, Position::new(-10.0, -5.0)).unwrap());
        assert_eq!(e.width(), 50.0);
        assert_eq!(e.height(), 25.0);
        let origin = Position::ORIGIN.transform(e.matrix());
        assert_eq!(origin, Position::new(90.0, 95.0));
        // Opposite corner did not move in world space.
        let se = e.handles()[Element::SE].position().transform(e.matrix());
        assert_eq!(se, Position::new(140.0, 120.0));
    }

    #[test]
    fn test_drag_respects_min_size() {
        let mut e = Element::new(Position::ORIGIN, 40.0, 40.0)
            .unwrap()
            .with_min_size(20.0, 15.0)
            .unwrap();
        e.set_handle_position(Element::SE, Position::new(5.0, 5.0)).unwrap();
        assert_eq!(e.width(), 20.0);
        assert_eq!(e.height(), 15.0);

        e.set_handle_position(Element::NW, Position::new(50.0, 50.0)).unwrap();
        assert_eq!(e.width(), 20.0);
        assert_eq!(e.height(), 15.0);
    }

    #[test]
    fn test_restore_regrows_to_min_size() {
        let mut e = Element::new(Position::ORIGIN, 40.0, 40.0).unwrap();
        e.width = 2.0;
        e.handles.clear();
        e.ports.clear();
        e.restore().unwrap();
        assert_eq!(e.width(), Element::DEFAULT_MIN_SIZE);
        assert_eq!(e.handles().len(), 4);
        assert_eq!(e.ports().len(), 4);

        e.height = f64::NAN;
        assert!(e.restore().is_err());
    }

    #[test]
    fn test_invalid_handle_index() {
        let mut e = Element::new(Position::ORIGIN, 40.0, 40.0).unwrap();
        assert!(!e.set_handle_position(7, Position::ORIGIN).unwrap());
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(Element::new(Position::new(f64::NAN, 0.0), 10.0, 10.0).is_err());
        let mut e = Element::new(Position::ORIGIN, 40.0, 40.0).unwrap();
        assert!(e.set_handle_position(Element::SE, Position::new(f64::INFINITY, 0.0)).is_err());
        assert!(e.resize(f64::NAN, 3.0).is_err());
    }
}
