//! Line: a polyline whose end handles can connect to ports.

use super::{ItemId, ItemTrait};
use crate::geometry::{validate_transform, GeometryError, GeometryResult, Position};
use crate::handle::Handle;
use crate::ports::Port;
use kurbo::{Affine, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line segment or polyline.
///
/// Each consecutive pair of handles forms one port, so other lines can
/// connect to any segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub(crate) id: ItemId,
    matrix: Affine,
    pub(crate) handles: Vec<Handle>,
    ports: Vec<Port>,
}

impl Line {
    /// Create a straight line (world coordinates).
    pub fn new(start: Position, end: Position) -> GeometryResult<Self> {
        Self::from_points(vec![start, end])
    }

    /// Create a polyline from at least two points (world coordinates).
    pub fn from_points(points: Vec<Position>) -> GeometryResult<Self> {
        if points.len() < 2 {
            return Err(GeometryError::NotEnoughPoints { count: points.len() });
        }
        for p in &points {
            p.validate()?;
        }
        let last = points.len() - 1;
        let handles = points
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                if i == 0 || i == last {
                    Handle::connectable(p)
                } else {
                    Handle::new(p)
                }
            })
            .collect();
        let mut line = Self {
            id: Uuid::new_v4(),
            matrix: Affine::IDENTITY,
            handles,
            ports: Vec::new(),
        };
        line.update_ports()?;
        Ok(line)
    }

    /// Index of the first (head) handle.
    pub fn head(&self) -> usize {
        0
    }

    /// Index of the last (tail) handle.
    pub fn tail(&self) -> usize {
        self.handles.len().saturating_sub(1)
    }

    /// All handle positions in local coordinates.
    pub fn all_points(&self) -> Vec<Position> {
        self.handles.iter().map(Handle::position).collect()
    }

    /// Total length of the polyline.
    pub fn length(&self) -> f64 {
        self.handles
            .windows(2)
            .map(|w| w[0].position().distance(w[1].position()))
            .sum()
    }

    fn update_ports(&mut self) -> GeometryResult<()> {
        self.ports = self
            .handles
            .windows(2)
            .map(|w| Port::from_segment(w[0].position(), w[1].position()))
            .collect::<GeometryResult<Vec<_>>>()?;
        Ok(())
    }
}

impl ItemTrait for Line {
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
        local.validate()?;
        let Some(handle) = self.handles.get_mut(index) else {
            return Ok(false);
        };
        handle.move_to(local);
        self.update_ports()?;
        Ok(true)
    }

    fn local_bounds(&self) -> Rect {
        let (min_x, max_x) = self.handles.iter().fold((f64::MAX, f64::MIN), |(mn, mx), h| {
            (mn.min(h.position().x), mx.max(h.position().x))
        });
        let (min_y, max_y) = self.handles.iter().fold((f64::MAX, f64::MIN), |(mn, mx), h| {
            (mn.min(h.position().y), mx.max(h.position().y))
        });
        Rect::new(min_x, min_y, max_x, max_y)
    }

    fn restore(&mut self) -> GeometryResult<()> {
        validate_transform(self.matrix)?;
        if self.handles.len() < 2 {
            return Err(GeometryError::NotEnoughPoints {
                count: self.handles.len(),
            });
        }
        for handle in &self.handles {
            handle.position().validate()?;
        }
        self.update_ports()
    }
}
