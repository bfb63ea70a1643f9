//! Diagram: items, their z-order and the handle-to-port connection table.
//!
//! Connections and element sizes are kept in shape by a [`Solver`]: every
//! element holds two minimum-size constraints and every connection a line
//! constraint that keeps the handle at its anchor on the port.

use crate::geometry::{GeometryError, Position};
use crate::glue::{self, GlueConfig, GlueTarget};
use crate::handle::{Handle, HandleRef};
use crate::items::{Element, Item, ItemId};
use crate::ports::{Anchor, Port, PortRef};
use crate::solver::{Constraint, ConstraintId, Solver, SolverError, SolverResult, Strength, VarId};
use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on solve-and-apply rounds when connections are settled.
pub const SETTLE_ITERATION_LIMIT: usize = 1000;

/// Diagram errors.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("Item not found: {0}")]
    UnknownItem(ItemId),
    #[error("Handle {} not found on item {}", .0.index, .0.item)]
    UnknownHandle(HandleRef),
    #[error("Port {} not found on item {}", .0.index, .0.item)]
    UnknownPort(PortRef),
    #[error("Handle {} on item {} is not connectable", .0.index, .0.item)]
    HandleNotConnectable(HandleRef),
    #[error("Handle {} on item {} is not movable", .0.index, .0.item)]
    HandleNotMovable(HandleRef),
    #[error("Port {} on item {} is not connectable", .0.index, .0.item)]
    PortNotConnectable(PortRef),
    #[error("Item {0} cannot connect to its own port")]
    SelfConnection(ItemId),
    #[error("Invalid diagram: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for diagram operations.
pub type DiagramResult<T> = Result<T, DiagramError>;

/// A handle attached to a port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub handle: HandleRef,
    pub port: PortRef,
    /// Where on the port the handle sits; kept when the port moves.
    pub anchor: Anchor,
}

/// Solver variables for an element's edges, in element-local coordinates.
#[derive(Debug, Clone, Copy)]
struct ElementVars {
    left: VarId,
    top: VarId,
    right: VarId,
    bottom: VarId,
    constraints: [ConstraintId; 2],
}

/// Solver variables for one connection, in world coordinates.
#[derive(Debug, Clone, Copy)]
struct ConnectionVars {
    start: (VarId, VarId),
    end: (VarId, VarId),
    handle: (VarId, VarId),
    constraint: ConstraintId,
}

/// A diagram containing items and the connections between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagram {
    /// Unique diagram identifier.
    pub id: String,
    /// Diagram name.
    pub name: String,
    /// Glue behaviour.
    #[serde(default)]
    pub config: GlueConfig,
    /// All items, keyed by ID.
    items: HashMap<ItemId, Item>,
    /// Z-order of items (back to front).
    z_order: Vec<ItemId>,
    /// Connection table.
    connections: Vec<Connection>,
    /// Rebuilt from items and connections on load.
    #[serde(skip)]
    solver: Solver,
    #[serde(skip)]
    element_vars: HashMap<ItemId, ElementVars>,
    #[serde(skip)]
    connection_vars: HashMap<HandleRef, ConnectionVars>,
}

impl Default for Diagram {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagram {
    /// Create a new empty diagram.
    pub fn new() -> Self {
        Self::with_config(GlueConfig::default())
    }

    pub fn with_config(config: GlueConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: "Untitled".to_string(),
            config,
            items: HashMap::new(),
            z_order: Vec::new(),
            connections: Vec::new(),
            solver: Solver::new(),
            element_vars: HashMap::new(),
            connection_vars: HashMap::new(),
        }
    }

    /// Add an item on top of the z-order.
    pub fn add_item(&mut self, item: impl Into<Item>) -> ItemId {
        let item = item.into();
        let id = item.id();
        if let Some(element) = item.as_element() {
            let size = (element.width(), element.height());
            let min = (element.min_width(), element.min_height());
            if let Err(err) = self.bind_element(id, size, min) {
                log::warn!("Element {} has no size constraints: {}", id, err);
            }
        }
        self.z_order.push(id);
        self.items.insert(id, item);
        id
    }

    /// Remove an item, dropping every connection to or from it and the
    /// constraints that held them.
    ///
    /// Handles on other items that were connected to this item's ports are
    /// disconnected; their positions are left where they are.
    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let item = self.items.remove(&id)?;
        self.z_order.retain(|&item_id| item_id != id);

        let (dropped, kept): (Vec<Connection>, Vec<Connection>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.port.item == id || c.handle.item == id);
        self.connections = kept;

        for conn in &dropped {
            self.unbind_connection(conn.handle);
            if conn.port.item == id {
                if let Some(handle) = self.handle_mut(conn.handle) {
                    handle.disconnect();
                }
            }
        }
        self.unbind_element(id);
        log::debug!("Removed item {} and {} connection(s)", id, dropped.len());
        Some(item)
    }

    /// Remove all items and connections.
    pub fn clear(&mut self) {
        self.items.clear();
        self.z_order.clear();
        self.connections.clear();
        self.solver = Solver::new();
        self.element_vars.clear();
        self.connection_vars.clear();
    }

    /// Get an item by ID.
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Items in z-order (back to front).
    pub fn items_ordered(&self) -> impl Iterator<Item = &Item> {
        self.z_order.iter().filter_map(|id| self.items.get(id))
    }

    /// Bring an item to the front, giving its ports glue priority on ties.
    pub fn bring_to_front(&mut self, id: ItemId) {
        self.z_order.retain(|&item_id| item_id != id);
        self.z_order.push(id);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The solver holding element and connection constraints.
    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// Bounding box of all items.
    pub fn bounds(&self) -> Option<Rect> {
        self.items
            .values()
            .map(Item::bounds)
            .reduce(|acc, b| acc.union(b))
    }

    pub fn handle(&self, handle: HandleRef) -> DiagramResult<&Handle> {
        self.items
            .get(&handle.item)
            .ok_or(DiagramError::UnknownItem(handle.item))?
            .handle(handle.index)
            .ok_or(DiagramError::UnknownHandle(handle))
    }

    fn handle_mut(&mut self, handle: HandleRef) -> Option<&mut Handle> {
        self.items.get_mut(&handle.item)?.handle_mut(handle.index)
    }

    /// Handle position in world coordinates.
    pub fn handle_position(&self, handle: HandleRef) -> DiagramResult<Position> {
        self.items
            .get(&handle.item)
            .ok_or(DiagramError::UnknownItem(handle.item))?
            .handle_world(handle.index)
            .ok_or(DiagramError::UnknownHandle(handle))
    }

    /// The connection of a handle, if any.
    pub fn connection(&self, handle: HandleRef) -> Option<&Connection> {
        self.connections.iter().find(|c| c.handle == handle)
    }

    /// All connections.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections whose port belongs to `item`.
    pub fn connections_to(&self, item: ItemId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.port.item == item)
    }

    /// Connections whose handle belongs to `item`.
    pub fn connections_from(&self, item: ItemId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.handle.item == item)
    }

    /// Find the port a handle would glue to at `world`, ignoring the handle's own item.
    pub fn glue(&self, handle: HandleRef, world: Position) -> DiagramResult<Option<GlueTarget>> {
        self.handle(handle)?;
        let front_to_back = self.z_order.iter().rev().filter_map(|id| self.items.get(id));
        Ok(glue::glue(
            front_to_back,
            world,
            Some(handle.item),
            self.config.glue_distance,
        ))
    }

    /// Move a handle to a world position.
    ///
    /// A connected handle stays connected and slides to the nearest point on
    /// its port. Handles connected to this item's ports follow.
    pub fn move_handle(&mut self, handle: HandleRef, world: Position) -> DiagramResult<()> {
        if !self.handle(handle)?.movable {
            return Err(DiagramError::HandleNotMovable(handle));
        }
        self.set_handle_world(handle, world)?;
        if let Some(pos) = self.connections.iter().position(|c| c.handle == handle) {
            let port = self.connections[pos].port;
            let world_port = self.port_world(port)?;
            let anchor = world_port.anchor(world);
            self.connections[pos].anchor = anchor;
            self.set_handle_world(handle, world_port.anchor_position(anchor))?;
            let conn = self.connections[pos];
            self.bind_connection(&conn)?;
        }
        self.settle()
    }

    /// Connect a handle to a port, snapping the handle onto the port.
    ///
    /// An existing connection of the handle is replaced and returned.
    pub fn connect(&mut self, handle: HandleRef, port: PortRef) -> DiagramResult<Option<PortRef>> {
        if !self.handle(handle)?.connectable {
            return Err(DiagramError::HandleNotConnectable(handle));
        }
        if handle.item == port.item {
            return Err(DiagramError::SelfConnection(handle.item));
        }
        let world_port = self.port_world(port)?;
        if !world_port.is_connectable() {
            return Err(DiagramError::PortNotConnectable(port));
        }

        let previous = self.drop_connection(handle);
        if let Some(old) = previous {
            log::debug!(
                "Handle {}:{} replaces connection to {}:{}",
                handle.item,
                handle.index,
                old.item,
                old.index
            );
        }

        let anchor = world_port.anchor(self.handle_position(handle)?);
        self.set_handle_world(handle, world_port.anchor_position(anchor))?;
        if let Some(h) = self.handle_mut(handle) {
            h.connect(port);
        }
        let conn = Connection { handle, port, anchor };
        self.connections.push(conn);
        self.bind_connection(&conn)?;
        log::debug!(
            "Connected handle {}:{} to port {}:{}",
            handle.item,
            handle.index,
            port.item,
            port.index
        );

        self.settle()?;
        Ok(previous)
    }

    /// Disconnect a handle, returning the port it was connected to.
    pub fn disconnect(&mut self, handle: HandleRef) -> DiagramResult<Option<PortRef>> {
        self.handle(handle)?;
        let previous = self.drop_connection(handle);
        if let Some(port) = previous {
            log::debug!(
                "Disconnected handle {}:{} from port {}:{}",
                handle.item,
                handle.index,
                port.item,
                port.index
            );
        }
        Ok(previous)
    }

    /// Drag a handle: move it and, if it is connectable, glue it to the
    /// nearest port in range or disconnect it when nothing is in range.
    pub fn drag_handle(&mut self, handle: HandleRef, world: Position) -> DiagramResult<Option<GlueTarget>> {
        let h = self.handle(handle)?;
        if !h.movable {
            return Err(DiagramError::HandleNotMovable(handle));
        }
        if !h.connectable {
            self.set_handle_world(handle, world)?;
            self.settle()?;
            return Ok(None);
        }

        match self.glue(handle, world)? {
            Some(target) => {
                log::debug!(
                    "Glued handle {}:{} to port {}:{} at distance {:.3}",
                    handle.item,
                    handle.index,
                    target.port.item,
                    target.port.index,
                    target.distance
                );
                self.set_handle_world(handle, world)?;
                self.connect(handle, target.port)?;
                Ok(Some(target))
            }
            None => {
                self.disconnect(handle)?;
                self.set_handle_world(handle, world)?;
                self.settle()?;
                Ok(None)
            }
        }
    }

    /// Translate an item. Its own connected handles stay on their ports and
    /// handles connected to its ports follow.
    pub fn move_item(&mut self, id: ItemId, delta: Vec2) -> DiagramResult<()> {
        self.items
            .get_mut(&id)
            .ok_or(DiagramError::UnknownItem(id))?
            .translate(delta);
        self.settle()
    }

    /// Serialize the diagram to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a diagram from JSON.
    ///
    /// The loaded diagram is checked before it is returned: item geometry
    /// must be valid, the z-order must list every item once, and the
    /// connection table must agree with the handles' references.
    pub fn from_json(json: &str) -> DiagramResult<Self> {
        let mut diagram: Diagram = serde_json::from_str(json)?;
        diagram.restore()?;
        Ok(diagram)
    }

    fn restore(&mut self) -> DiagramResult<()> {
        for (id, item) in self.items.iter_mut() {
            if item.id() != *id {
                return Err(DiagramError::InvalidDocument(format!(
                    "item {} is stored under key {}",
                    item.id(),
                    id
                )));
            }
            item.restore()?;
        }

        let listed: HashSet<ItemId> = self.z_order.iter().copied().collect();
        if listed.len() != self.z_order.len()
            || listed.len() != self.items.len()
            || !self.items.keys().all(|id| listed.contains(id))
        {
            return Err(DiagramError::InvalidDocument(
                "z-order must list every item exactly once".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for conn in &self.connections {
            let handle = conn.handle;
            if !seen.insert(handle) {
                return Err(DiagramError::InvalidDocument(format!(
                    "handle {}:{} has more than one connection",
                    handle.item, handle.index
                )));
            }
            let h = self.handle(handle)?;
            if !h.connectable {
                return Err(DiagramError::HandleNotConnectable(handle));
            }
            if h.connected() != Some(conn.port) {
                return Err(DiagramError::InvalidDocument(format!(
                    "handle {}:{} does not reference its connected port",
                    handle.item, handle.index
                )));
            }
            if handle.item == conn.port.item {
                return Err(DiagramError::SelfConnection(handle.item));
            }
            self.port_world(conn.port)?;
            if let Anchor::Along(t) = conn.anchor {
                if !(0.0..=1.0).contains(&t) {
                    return Err(DiagramError::InvalidDocument(format!(
                        "anchor {} of handle {}:{} is off the port",
                        t, handle.item, handle.index
                    )));
                }
            }
        }

        for item in self.items.values() {
            for (index, h) in item.handles().iter().enumerate() {
                if h.is_connected() && !seen.contains(&HandleRef::new(item.id(), index)) {
                    return Err(DiagramError::InvalidDocument(format!(
                        "handle {}:{} references a port but has no connection",
                        item.id(),
                        index
                    )));
                }
            }
        }

        self.rebuild_solver()?;
        self.settle()
    }

    fn port_world(&self, port: PortRef) -> DiagramResult<Port> {
        self.items
            .get(&port.item)
            .ok_or(DiagramError::UnknownItem(port.item))?
            .port_world(port.index)
            .ok_or(DiagramError::UnknownPort(port))
    }

    fn set_handle_world(&mut self, handle: HandleRef, world: Position) -> DiagramResult<()> {
        world.validate()?;
        let item = self
            .items
            .get(&handle.item)
            .ok_or(DiagramError::UnknownItem(handle.item))?;
        let mut local = item.world_to_local(world);
        let element_size = item
            .as_element()
            .filter(|_| item.handle(handle.index).is_some())
            .map(|e| (e.width(), e.height()));
        if let Some(size) = element_size {
            local = self.clamp_corner(handle, size, local)?;
        }

        let item = self
            .items
            .get_mut(&handle.item)
            .ok_or(DiagramError::UnknownItem(handle.item))?;
        if item.set_handle_position(handle.index, local)? {
            Ok(())
        } else {
            Err(DiagramError::UnknownHandle(handle))
        }
    }

    /// Run a corner drag through the element's minimum-size constraints.
    /// Returns the corner position (element-local) the constraints allow.
    fn clamp_corner(&mut self, handle: HandleRef, (width, height): (f64, f64), local: Position) -> DiagramResult<Position> {
        let Some(vars) = self.element_vars.get(&handle.item).copied() else {
            return Ok(local);
        };
        let moves_left = matches!(handle.index, Element::NW | Element::SW);
        let moves_top = matches!(handle.index, Element::NW | Element::NE);
        let (x_edge, x_opposite, x_opposite_value) = if moves_left {
            (vars.left, vars.right, width)
        } else {
            (vars.right, vars.left, 0.0)
        };
        let (y_edge, y_opposite, y_opposite_value) = if moves_top {
            (vars.top, vars.bottom, height)
        } else {
            (vars.bottom, vars.top, 0.0)
        };

        // Opposite edges first, so the dragged edges are the ones adjusted.
        self.solver.set_value(x_opposite, x_opposite_value)?;
        self.solver.set_value(y_opposite, y_opposite_value)?;
        self.solver.set_value(x_edge, local.x)?;
        self.solver.set_value(y_edge, local.y)?;
        self.solver.solve();

        Ok(Position::new(
            self.solver.value(x_edge).unwrap_or(local.x),
            self.solver.value(y_edge).unwrap_or(local.y),
        ))
    }

    /// Remove the connection record and clear the handle's reference.
    fn drop_connection(&mut self, handle: HandleRef) -> Option<PortRef> {
        let pos = self.connections.iter().position(|c| c.handle == handle)?;
        let conn = self.connections.remove(pos);
        self.unbind_connection(handle);
        if let Some(h) = self.handle_mut(handle) {
            h.disconnect();
        }
        Some(conn.port)
    }

    fn bind_element(&mut self, id: ItemId, (width, height): (f64, f64), (min_width, min_height): (f64, f64)) -> SolverResult<()> {
        let left = self.solver.add_variable(0.0, Strength::NORMAL);
        let top = self.solver.add_variable(0.0, Strength::NORMAL);
        let right = self.solver.add_variable(width, Strength::NORMAL);
        let bottom = self.solver.add_variable(height, Strength::NORMAL);
        let constraints = [
            self.solver.add_constraint(Constraint::less_than(left, right, min_width))?,
            self.solver.add_constraint(Constraint::less_than(top, bottom, min_height))?,
        ];
        self.element_vars.insert(
            id,
            ElementVars {
                left,
                top,
                right,
                bottom,
                constraints,
            },
        );
        Ok(())
    }

    fn unbind_element(&mut self, id: ItemId) {
        if let Some(vars) = self.element_vars.remove(&id) {
            for constraint in vars.constraints {
                self.solver.remove_constraint(constraint);
            }
        }
    }

    /// Add or update the line constraint holding a connected handle on its anchor.
    fn bind_connection(&mut self, conn: &Connection) -> DiagramResult<()> {
        let ratio = match conn.anchor {
            Anchor::Fixed => (0.0, 0.0),
            Anchor::Along(t) => (t, t),
        };
        if let Some(vars) = self.connection_vars.get(&conn.handle).copied() {
            let constraint = Constraint::line_at(vars.start, vars.end, vars.handle, ratio);
            self.solver.replace_constraint(vars.constraint, constraint)?;
            return Ok(());
        }

        let (start, end) = self.port_world(conn.port)?.endpoints();
        let position = self.handle_position(conn.handle)?;
        let start = self.add_point_vars(start, Strength::STRONG);
        let end = self.add_point_vars(end, Strength::STRONG);
        let handle = self.add_point_vars(position, Strength::WEAK);
        let constraint = self
            .solver
            .add_constraint(Constraint::line_at(start, end, handle, ratio))?;
        self.connection_vars.insert(
            conn.handle,
            ConnectionVars {
                start,
                end,
                handle,
                constraint,
            },
        );
        Ok(())
    }

    fn unbind_connection(&mut self, handle: HandleRef) {
        if let Some(vars) = self.connection_vars.remove(&handle) {
            self.solver.remove_constraint(vars.constraint);
        }
    }

    fn add_point_vars(&mut self, position: Position, strength: Strength) -> (VarId, VarId) {
        (
            self.solver.add_variable(position.x, strength),
            self.solver.add_variable(position.y, strength),
        )
    }

    fn set_point_vars(&mut self, (x, y): (VarId, VarId), position: Position) -> SolverResult<()> {
        if self.solver.value(x) != Some(position.x) {
            self.solver.set_value(x, position.x)?;
        }
        if self.solver.value(y) != Some(position.y) {
            self.solver.set_value(y, position.y)?;
        }
        Ok(())
    }

    fn rebuild_solver(&mut self) -> DiagramResult<()> {
        self.solver = Solver::new();
        self.element_vars.clear();
        self.connection_vars.clear();

        let elements: Vec<(ItemId, (f64, f64), (f64, f64))> = self
            .items
            .values()
            .filter_map(|item| {
                item.as_element().map(|e| {
                    (item.id(), (e.width(), e.height()), (e.min_width(), e.min_height()))
                })
            })
            .collect();
        for (id, size, min) in elements {
            self.bind_element(id, size, min)?;
        }
        for conn in self.connections.clone() {
            self.bind_connection(&conn)?;
        }
        Ok(())
    }

    /// Put every connected handle back on its anchor.
    ///
    /// Each round copies current port and handle positions into the solver,
    /// solves, and moves the handles the solver changed. Moving a handle can
    /// move that item's ports, so rounds repeat until nothing moves.
    fn settle(&mut self) -> DiagramResult<()> {
        for _ in 0..SETTLE_ITERATION_LIMIT {
            self.sync_connection_vars()?;
            self.solver.solve();
            if !self.apply_connection_vars()? {
                return Ok(());
            }
        }
        log::warn!(
            "Connections did not settle after {} rounds",
            SETTLE_ITERATION_LIMIT
        );
        Ok(())
    }

    fn sync_connection_vars(&mut self) -> DiagramResult<()> {
        for conn in self.connections.clone() {
            let Some(vars) = self.connection_vars.get(&conn.handle).copied() else {
                continue;
            };
            let (start, end) = self.port_world(conn.port)?.endpoints();
            let position = self.handle_position(conn.handle)?;
            self.set_point_vars(vars.start, start)?;
            self.set_point_vars(vars.end, end)?;
            self.set_point_vars(vars.handle, position)?;
        }
        Ok(())
    }

    /// Move handles to their solved positions. Returns whether any moved.
    fn apply_connection_vars(&mut self) -> DiagramResult<bool> {
        let solved: Vec<(HandleRef, (VarId, VarId))> = self
            .connection_vars
            .iter()
            .map(|(&handle, vars)| (handle, vars.handle))
            .collect();

        let mut moved = false;
        for (handle, (x, y)) in solved {
            let (Some(x), Some(y)) = (self.solver.value(x), self.solver.value(y)) else {
                continue;
            };
            let target = Position::new(x, y);
            if self.handle_position(handle)? != target {
                self.set_handle_world(handle, target)?;
                moved = true;
            }
        }
        Ok(moved)
    }
}
