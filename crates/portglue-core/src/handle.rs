//! Handles: movable, connectable endpoints of items.

use crate::geometry::Position;
use crate::items::ItemId;
use crate::ports::PortRef;
use serde::{Deserialize, Serialize};

/// Reference to a handle: the owning item and the handle's index in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleRef {
    pub item: ItemId,
    pub index: usize,
}

impl HandleRef {
    pub fn new(item: ItemId, index: usize) -> Self {
        Self { item, index }
    }
}

/// A movable endpoint of an item.
///
/// The handle owns its position (in the owning item's local coordinates) and
/// holds at most one non-owning reference to the port it is connected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handle {
    position: Position,
    /// Port this handle is attached to, if any.
    #[serde(default)]
    connected: Option<PortRef>,
    /// Whether this handle may be connected to a port.
    pub connectable: bool,
    /// Whether interactive tools may drag this handle.
    pub movable: bool,
}

impl Handle {
    /// Create a movable, non-connectable handle.
    pub fn new(position: Position) -> Self {
        Self {
            position,
            connected: None,
            connectable: false,
            movable: true,
        }
    }

    /// Create a handle that may be connected to ports.
    pub fn connectable(position: Position) -> Self {
        Self {
            connectable: true,
            ..Self::new(position)
        }
    }

    pub fn with_movable(mut self, movable: bool) -> Self {
        self.movable = movable;
        self
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Replace the handle's position.
    pub fn move_to(&mut self, position: Position) {
        self.position = position;
    }

    /// The port this handle is connected to.
    pub fn connected(&self) -> Option<PortRef> {
        self.connected
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    /// Attach to `port`, returning the reference it replaces.
    ///
    /// No notification is sent for the replaced port; callers that track
    /// connections elsewhere must drop the old record themselves.
    pub fn connect(&mut self, port: PortRef) -> Option<PortRef> {
        self.connected.replace(port)
    }

    /// Detach from the connected port, returning it.
    pub fn disconnect(&mut self) -> Option<PortRef> {
        self.connected.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_move_reads_back_exactly() {
        let mut handle = Handle::new(Position::new(0.0, 0.0));
        handle.move_to(Position::new(12.345, -0.1));
        assert_eq!(handle.position(), Position::new(12.345, -0.1));
        assert_eq!(handle.position().x(), 12.345);
        assert_eq!(handle.position().y(), -0.1);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut handle = Handle::connectable(Position::ORIGIN);
        let port = PortRef::new(Uuid::new_v4(), 2);

        assert!(!handle.is_connected());
        assert_eq!(handle.connect(port), None);
        assert_eq!(handle.connected(), Some(port));

        assert_eq!(handle.disconnect(), Some(port));
        assert!(!handle.is_connected());
        assert_eq!(handle.disconnect(), None);
    }

    #[test]
    fn test_connect_replaces_previous() {
        let mut handle = Handle::connectable(Position::ORIGIN);
        let first = PortRef::new(Uuid::new_v4(), 0);
        let second = PortRef::new(Uuid::new_v4(), 1);

        handle.connect(first);
        assert_eq!(handle.connect(second), Some(first));
        assert_eq!(handle.connected(), Some(second));
    }

    #[test]
    fn test_move_keeps_connection() {
        let mut handle = Handle::connectable(Position::ORIGIN);
        let port = PortRef::new(Uuid::new_v4(), 0);
        handle.connect(port);
        handle.move_to(Position::new(1.0, 1.0));
        assert_eq!(handle.connected(), Some(port));
    }

    #[test]
    fn test_defaults() {
        let handle = Handle::new(Position::ORIGIN);
        assert!(handle.movable);
        assert!(!handle.connectable);
        assert!(Handle::connectable(Position::ORIGIN).connectable);
        assert!(!Handle::new(Position::ORIGIN).with_movable(false).movable);
    }
}
