//! Glue: find the port nearest to a point.

use crate::geometry::Position;
use crate::items::{Item, ItemId};
use crate::ports::PortRef;
use serde::{Deserialize, Serialize};

/// Default maximum distance (world units) at which a handle glues to a port.
pub const DEFAULT_GLUE_DISTANCE: f64 = 10.0;

/// Glue settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlueConfig {
    /// Ports further away than this are ignored.
    pub glue_distance: f64,
}

impl Default for GlueConfig {
    fn default() -> Self {
        Self {
            glue_distance: DEFAULT_GLUE_DISTANCE,
        }
    }
}

/// Result of a glue query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlueTarget {
    /// The port that won.
    pub port: PortRef,
    /// Nearest point on that port (world coordinates).
    pub point: Position,
    /// Distance from the query point to `point`.
    pub distance: f64,
}

/// Find the closest connectable port within `max_distance` of `point`.
///
/// `items` should be ordered front-most first; on equal distance the first
/// port seen wins. Ports of `exclude` are skipped.
pub fn glue<'a, I>(items: I, point: Position, exclude: Option<ItemId>, max_distance: f64) -> Option<GlueTarget>
where
    I: IntoIterator<Item = &'a Item>,
{
    let mut best: Option<GlueTarget> = None;

    for item in items {
        let id = item.id();
        if Some(id) == exclude {
            continue;
        }
        let matrix = item.matrix();
        for (index, port) in item.ports().iter().enumerate() {
            if !port.is_connectable() {
                continue;
            }
            let (nearest, distance) = port.transform(matrix).distance(point);
            if distance > max_distance {
                continue;
            }
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(GlueTarget {
                    port: PortRef::new(id, index),
                    point: nearest,
                    distance,
                });
            }
        }
    }

    best
}
