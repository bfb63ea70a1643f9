//! Pin: a fixed connection terminal.

use super::{ItemId, ItemTrait};
use crate::geometry::{validate_transform, GeometryResult, Position};
use crate::handle::Handle;
use crate::ports::{Port, PointPort};
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A terminal with a single point port at its origin and no handles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub(crate) id: ItemId,
    matrix: Affine,
    ports: Vec<Port>,
}

impl Pin {
    /// Create a pin at `position` (world).
    pub fn new(position: Position) -> GeometryResult<Self> {
        position.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            matrix: Affine::translate(position.to_point().to_vec2()),
            ports: vec![PointPort::new(Position::ORIGIN)?.into()],
        })
    }

    /// World position of the pin.
    pub fn position(&self) -> Position {
        Position::ORIGIN.transform(self.matrix)
    }
}

impl ItemTrait for Pin {
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
        &[]
    }

    fn ports(&self) -> &[Port] {
        &self.ports
    }

    fn set_handle_position(&mut self, _index: usize, _local: Position) -> GeometryResult<bool> {
        Ok(false)
    }

    fn local_bounds(&self) -> Rect {
        Rect::ZERO
    }

    fn restore(&mut self) -> GeometryResult<()> {
        validate_transform(self.matrix)?;
        self.ports = vec![PointPort::new(Position::ORIGIN)?.into()];
        Ok(())
    }
}
