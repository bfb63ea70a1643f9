//! Ports: attachment surfaces on an item's boundary.
//!
//! A port answers one question: given a point, what is the nearest point on
//! the port and how far away is it? Handles are glued to the port that gives
//! the smallest answer.

mod line;
mod point;

pub use line::LinePort;
pub use point::PointPort;

use crate::geometry::{GeometryResult, Position};
use crate::items::ItemId;
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};

/// Non-owning reference to a port: the owning item and the port's index in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub item: ItemId,
    pub index: usize,
}

impl PortRef {
    pub fn new(item: ItemId, index: usize) -> Self {
        Self { item, index }
    }
}

/// Where on a port a connected handle sits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Anchor {
    /// The port's single point.
    Fixed,
    /// Parameter along a segment (0 = start, 1 = end).
    Along(f64),
}

/// Common trait for all port kinds.
pub trait PortTrait {
    /// Nearest point on the port to `point`, and the Euclidean distance to it.
    fn distance(&self, point: Position) -> (Position, f64);

    /// Whether handles may connect to this port.
    fn is_connectable(&self) -> bool;

    /// Bounding box of the port geometry.
    fn bounds(&self) -> Rect;

    /// The anchor of the point on this port nearest to `point`.
    fn anchor(&self, point: Position) -> Anchor;

    /// Resolve an anchor back to a position on this port.
    fn anchor_position(&self, anchor: Anchor) -> Position;
}

/// Enum wrapper for all port kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Port {
    Point(PointPort),
    Line(LinePort),
}

impl Port {
    /// Port for the segment `start -> end`; coincident endpoints give a point port.
    pub fn from_segment(start: Position, end: Position) -> GeometryResult<Self> {
        if start == end {
            Ok(Port::Point(PointPort::new(start)?))
        } else {
            Ok(Port::Line(LinePort::new(start, end)?))
        }
    }

    pub fn distance(&self, point: Position) -> (Position, f64) {
        match self {
            Port::Point(p) => p.distance(point),
            Port::Line(p) => p.distance(point),
        }
    }

    pub fn is_connectable(&self) -> bool {
        match self {
            Port::Point(p) => p.is_connectable(),
            Port::Line(p) => p.is_connectable(),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Port::Point(p) => p.bounds(),
            Port::Line(p) => p.bounds(),
        }
    }

    pub fn anchor(&self, point: Position) -> Anchor {
        match self {
            Port::Point(p) => p.anchor(point),
            Port::Line(p) => p.anchor(point),
        }
    }

    pub fn anchor_position(&self, anchor: Anchor) -> Position {
        match self {
            Port::Point(p) => p.anchor_position(anchor),
            Port::Line(p) => p.anchor_position(anchor),
        }
    }

    /// Start and end of the port geometry; both are the point for a point port.
    pub fn endpoints(&self) -> (Position, Position) {
        match self {
            Port::Point(p) => (p.point(), p.point()),
            Port::Line(p) => (p.start(), p.end()),
        }
    }

    /// Map the port geometry through an affine transform (e.g. item to world).
    pub fn transform(&self, affine: Affine) -> Port {
        match self {
            Port::Point(p) => Port::Point(p.transform(affine)),
            Port::Line(p) => Port::Line(p.transform(affine)),
        }
    }

    /// Set whether handles may connect to this port.
    pub fn with_connectable(self, connectable: bool) -> Self {
        match self {
            Port::Point(p) => Port::Point(p.with_connectable(connectable)),
            Port::Line(p) => Port::Line(p.with_connectable(connectable)),
        }
    }
}

impl From<PointPort> for Port {
    fn from(p: PointPort) -> Self {
        Port::Point(p)
    }
}

impl From<LinePort> for Port {
    fn from(p: LinePort) -> Self {
        Port::Line(p)
    }
}
