//! Diagram items: things that own handles and ports.
//!
//! Handles and ports are stored in item-local coordinates; `matrix` maps
//! them into world coordinates.

mod element;
mod line;
mod pin;

pub use element::Element;
pub use line::Line;
pub use pin::Pin;

use crate::geometry::{GeometryResult, Position};
use crate::handle::Handle;
use crate::ports::Port;
use kurbo::{Affine, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for items.
pub type ItemId = Uuid;

/// Common trait for all items.
pub trait ItemTrait {
    /// Get the unique identifier.
    fn id(&self) -> ItemId;

    /// Item-to-world transform.
    fn matrix(&self) -> Affine;

    /// Replace the item-to-world transform.
    fn set_matrix(&mut self, matrix: Affine);

    /// Handles in item-local coordinates.
    fn handles(&self) -> &[Handle];

    /// Ports in item-local coordinates.
    fn ports(&self) -> &[Port];

    /// Move one handle (local coordinates), updating dependent geometry.
    /// Returns `Ok(false)` when the item has no handle at `index`.
    fn set_handle_position(&mut self, index: usize, local: Position) -> GeometryResult<bool>;

    /// Bounding box in item-local coordinates.
    fn local_bounds(&self) -> Rect;

    /// Check invariants and re-derive ports after the item was loaded.
    fn restore(&mut self) -> GeometryResult<()>;
}

/// Enum wrapper for all item types (for serialization).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    Element(Element),
    Line(Line),
    Pin(Pin),
}

impl Item {
    pub fn id(&self) -> ItemId {
        match self {
            Item::Element(i) => i.id(),
            Item::Line(i) => i.id(),
            Item::Pin(i) => i.id(),
        }
    }

    pub fn matrix(&self) -> Affine {
        match self {
            Item::Element(i) => i.matrix(),
            Item::Line(i) => i.matrix(),
            Item::Pin(i) => i.matrix(),
        }
    }

    pub fn set_matrix(&mut self, matrix: Affine) {
        match self {
            Item::Element(i) => i.set_matrix(matrix),
            Item::Line(i) => i.set_matrix(matrix),
            Item::Pin(i) => i.set_matrix(matrix),
        }
    }

    pub fn handles(&self) -> &[Handle] {
        match self {
            Item::Element(i) => i.handles(),
            Item::Line(i) => i.handles(),
            Item::Pin(i) => i.handles(),
        }
    }

    pub fn ports(&self) -> &[Port] {
        match self {
            Item::Element(i) => i.ports(),
            Item::Line(i) => i.ports(),
            Item::Pin(i) => i.ports(),
        }
    }

    pub fn set_handle_position(&mut self, index: usize, local: Position) -> GeometryResult<bool> {
        match self {
            Item::Element(i) => i.set_handle_position(index, local),
            Item::Line(i) => i.set_handle_position(index, local),
            Item::Pin(i) => i.set_handle_position(index, local),
        }
    }

    pub fn local_bounds(&self) -> Rect {
        match self {
            Item::Element(i) => i.local_bounds(),
            Item::Line(i) => i.local_bounds(),
            Item::Pin(i) => i.local_bounds(),
        }
    }

    pub fn restore(&mut self) -> GeometryResult<()> {
        match self {
            Item::Element(i) => i.restore(),
            Item::Line(i) => i.restore(),
            Item::Pin(i) => i.restore(),
        }
    }

    /// Bounding box in world coordinates.
    pub fn bounds(&self) -> Rect {
        self.matrix().transform_rect_bbox(self.local_bounds())
    }

    pub fn handle(&self, index: usize) -> Option<&Handle> {
        self.handles().get(index)
    }

    /// Mutable access for connection bookkeeping only; positions go through
    /// `set_handle_position` so ports stay in sync.
    pub(crate) fn handle_mut(&mut self, index: usize) -> Option<&mut Handle> {
        match self {
            Item::Element(i) => i.handles.get_mut(index),
            Item::Line(i) => i.handles.get_mut(index),
            Item::Pin(_) => None,
        }
    }

    pub fn port(&self, index: usize) -> Option<&Port> {
        self.ports().get(index)
    }

    /// Handle position in world coordinates.
    pub fn handle_world(&self, index: usize) -> Option<Position> {
        self.handle(index).map(|h| h.position().transform(self.matrix()))
    }

    /// Port geometry in world coordinates.
    pub fn port_world(&self, index: usize) -> Option<Port> {
        self.port(index).map(|p| p.transform(self.matrix()))
    }

    /// Convert a world position into this item's local coordinates.
    pub fn world_to_local(&self, world: Position) -> Position {
        world.transform(self.matrix().inverse())
    }

    /// Move a handle to a world position.
    pub fn set_handle_world(&mut self, index: usize, world: Position) -> GeometryResult<bool> {
        let local = self.world_to_local(world);
        self.set_handle_position(index, local)
    }

    /// Translate the whole item in world space.
    pub fn translate(&mut self, delta: Vec2) {
        let matrix = Affine::translate(delta) * self.matrix();
        self.set_matrix(matrix);
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Item::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&Line> {
        match self {
            Item::Line(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_pin(&self) -> Option<&Pin> {
        match self {
            Item::Pin(p) => Some(p),
            _ => None,
        }
    }
}

impl From<Element> for Item {
    fn from(e: Element) -> Self {
        Item::Element(e)
    }
}

impl From<Line> for Item {
    fn from(l: Line) -> Self {
        Item::Line(l)
    }
}

impl From<Pin> for Item {
    fn from(p: Pin) -> Self {
        Item::Pin(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_handle_follows_matrix() {
        let mut item: Item = Element::new(Position::new(10.0, 20.0), 50.0, 40.0).unwrap().into();
        assert_eq!(item.handle_world(Element::SE), Some(Position::new(60.0, 60.0)));

        item.translate(Vec2::new(5.0, -5.0));
        assert_eq!(item.handle_world(Element::NW), Some(Position::new(15.0, 15.0)));
        assert_eq!(item.handle_world(Element::SE), Some(Position::new(65.0, 55.0)));
    }

    #[test]
    fn test_port_world() {
        let item: Item = Element::new(Position::new(10.0, 10.0), 20.0, 20.0).unwrap().into();
        let top = item.port_world(Element::TOP).unwrap();
        let (nearest, d) = top.distance(Position::new(20.0, 0.0));
        assert_eq!(nearest, Position::new(20.0, 10.0));
        assert!((d - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_world_bounds() {
        let item: Item = Line::new(Position::new(0.0, 0.0), Position::new(30.0, 40.0)).unwrap().into();
        let bounds = item.bounds();
        assert_eq!(bounds, Rect::new(0.0, 0.0, 30.0, 40.0));
    }

    #[test]
    fn test_set_handle_world() {
        let mut item: Item = Line::new(Position::new(0.0, 0.0), Position::new(10.0, 0.0)).unwrap().into();
        item.translate(Vec2::new(100.0, 0.0));
        assert!(item.set_handle_world(1, Position::new(120.0, 5.0)).unwrap());
        assert_eq!(item.handle(1).unwrap().position(), Position::new(20.0, 5.0));
        assert_eq!(item.handle_world(1), Some(Position::new(120.0, 5.0)));
    }

    #[test]
    fn test_pin_has_no_handles() {
        let mut item: Item = Pin::new(Position::new(1.0, 2.0)).unwrap().into();
        assert!(item.handles().is_empty());
        assert!(item.handle_mut(0).is_none());
        assert!(!item.set_handle_position(0, Position::ORIGIN).unwrap());
    }
}
