//! PortGlue Core Library
//!
//! Connection geometry for diagram items: positions, handles, and the ports
//! handles glue to, plus a small one-way constraint solver.

pub mod diagram;
pub mod geometry;
pub mod glue;
pub mod handle;
pub mod items;
pub mod ports;
pub mod solver;

pub use diagram::{Connection, Diagram, DiagramError, DiagramResult, SETTLE_ITERATION_LIMIT};
pub use geometry::{GeometryError, GeometryResult, Position};
pub use glue::{glue, GlueConfig, GlueTarget, DEFAULT_GLUE_DISTANCE};
pub use handle::{Handle, HandleRef};
pub use items::{Element, Item, ItemId, ItemTrait, Line, Pin};
pub use ports::{Anchor, LinePort, PointPort, Port, PortRef, PortTrait};
pub use solver::{Constraint, Solver, SolverError, Strength, VarId};
