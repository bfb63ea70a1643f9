//! Demo entry point: connect a line between two boxes and move them around.
//!
//! Run with `RUST_LOG=debug` to see glue and connection decisions.

use kurbo::Vec2;
use portglue_core::{Diagram, Element, HandleRef, Line, Position};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    log::info!("Starting PortGlue demo");

    let mut diagram = Diagram::new();
    diagram.name = "Demo".to_string();

    let left = diagram.add_item(Element::new(Position::new(0.0, 0.0), 100.0, 60.0)?);
    let right = diagram.add_item(Element::new(Position::new(300.0, 0.0), 100.0, 60.0)?);
    let line = diagram.add_item(Line::new(Position::new(150.0, 30.0), Position::new(250.0, 30.0))?);

    let head = HandleRef::new(line, 0);
    let tail = HandleRef::new(line, 1);

    for (handle, target) in [(head, Position::new(104.0, 30.0)), (tail, Position::new(297.0, 20.0))] {
        match diagram.drag_handle(handle, target)? {
            Some(glued) => log::info!(
                "Handle {} glued to port {} of {} at {:?}",
                handle.index,
                glued.port.index,
                glued.port.item,
                glued.point
            ),
            None => log::info!("Handle {} not glued", handle.index),
        }
    }

    diagram.move_item(right, Vec2::new(50.0, 40.0))?;
    log::info!(
        "After moving right box: head {:?}, tail {:?}",
        diagram.handle_position(head)?,
        diagram.handle_position(tail)?
    );

    diagram.drag_handle(head, Position::new(160.0, 200.0))?;
    log::info!(
        "Head dragged free: connected = {}",
        diagram.handle(head)?.is_connected()
    );

    diagram.remove_item(left);
    log::info!("{} connection(s) remain", diagram.connections().len());

    let json = diagram.to_json()?;
    let restored = Diagram::from_json(&json)?;
    log::info!(
        "Round-tripped diagram with {} item(s) and {} constraint(s)",
        restored.len(),
        restored.solver().constraint_count()
    );
    println!("{json}");

    Ok(())
}
