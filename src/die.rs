//! Die framing: envelope, write-field grid, corner markers, tag.
//!
//! A die wraps one generator's output in the fixed dressing every die on
//! the chip carries: the content centered inside a grid-rounded
//! envelope, thin write-field grid lines, quads of e-beam registration
//! squares at every grid intersection, and a text tag naming the die.

use crate::cell::{Cell, Namer};
use crate::config::Config;
use crate::path::Point;
use crate::{Float, PicmaskError};

/// Die envelope along one axis: the content extent rounded up to the
/// next grid multiple, plus one extra grid cell of margin.
fn envelope(extent: Float, grid: Float) -> Float {
    let mut cells = (extent / grid).floor();
    if extent % grid != 0.0 {
        cells += 1.0;
    }
    (cells + 1.0) * grid
}

/// Tag text for a die, combining the generator's own name with the
/// chip-level die number when one is assigned.
pub fn die_label(original: &str, number: Option<usize>) -> String {
    match number {
        None => original.to_owned(),
        Some(n) => format!("{original} / Die {n}"),
    }
}

/// Wraps `content` in the die dressing and returns the framed die cell.
///
/// The content is re-centered on its bounding box, shifted by the
/// configured array displacement, and surrounded by a grid whose origin
/// snaps to whole grid cells.
pub fn frame_die(
    mut content: Cell,
    label: &str,
    die_name: &str,
    config: &Config,
    namer: &mut Namer,
) -> Result<Cell, PicmaskError> {
    let grid_size = config.die_box.grid_size;
    let bbox = content.bbox()?;

    let die_width = envelope(bbox.width(), grid_size);
    let die_height = envelope(bbox.height(), grid_size);
    let n_x = (die_width / grid_size).round() as usize;
    let n_y = (die_height / grid_size).round() as usize;

    // Center the content at the die origin, then nudge it by the
    // configured displacement
    let center = bbox.center();
    content.translate(Point::new(-center.x, -center.y));
    let displacement = &config.array.displacement;
    if displacement.x != 0.0 || displacement.y != 0.0 {
        content.translate(Point::new(displacement.x, displacement.y));
    }

    // Snap the die corner to whole grid cells
    let die_x0 = -(die_width / 2.0 / grid_size).round() * grid_size;
    let die_y0 = -(die_height / 2.0 / grid_size).round() * grid_size;
    let corner = Point::new(die_x0, die_y0);

    let mut die = Cell::new(namer.unique(die_name));
    die.place(content, Point::new(0.0, 0.0));

    let line_width = config.die_box.grid_line_width;
    let mut die_grid = Cell::new(namer.unique("Die_Grid"));
    for i in 0..=n_x {
        let x = i as Float * grid_size;
        die_grid.rect(
            config.layers.die_grid,
            Point::new(x - line_width / 2.0, 0.0),
            (line_width, die_height),
        );
    }
    for j in 0..=n_y {
        let y = j as Float * grid_size;
        die_grid.rect(
            config.layers.die_grid,
            Point::new(0.0, y - line_width / 2.0),
            (die_width, line_width),
        );
    }
    die.place(die_grid, corner);

    let marker = &config.e_beam_marker;
    let mut markers = Cell::new(namer.unique("E_beam_markers"));
    for i in 0..=n_x {
        for j in 0..=n_y {
            let x = i as Float * grid_size;
            let y = j as Float * grid_size;
            let size = (marker.size, marker.size);
            // One square in each quadrant around the intersection
            markers.rect(
                config.layers.e_beam_marker,
                Point::new(x - marker.offset - marker.size, y + marker.offset),
                size,
            );
            markers.rect(
                config.layers.e_beam_marker,
                Point::new(x + marker.offset, y + marker.offset),
                size,
            );
            markers.rect(
                config.layers.e_beam_marker,
                Point::new(x - marker.offset - marker.size, y - marker.offset - marker.size),
                size,
            );
            markers.rect(
                config.layers.e_beam_marker,
                Point::new(x + marker.offset, y - marker.offset - marker.size),
                size,
            );
        }
    }
    die.place(markers, corner);

    let text = &config.die_text;
    let mut tag = Cell::new(namer.unique("Tag"));
    tag.label(
        config.layers.die_text,
        label,
        text.text_size,
        Point::new(text.offset_x, die_height - text.offset_y),
    );
    die.place(tag, corner);

    Ok(die)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> Config {
        serde_json::from_str(
            r#"{
            "geometry": { "r": 20.0, "L": 10000.0, "D": 3300.0,
                          "x": 165.0, "s": 20.0, "width": 0.556 }
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn envelope_rounds_up_plus_margin() {
        assert_relative_eq!(envelope(3300.0, 500.0), 4000.0);
        assert_relative_eq!(envelope(600.0, 500.0), 1500.0);
        // Exact multiples still pick up the margin cell
        assert_relative_eq!(envelope(1000.0, 500.0), 1500.0);
    }

    #[test]
    fn die_label_shows_both_names() {
        assert_eq!(die_label("w556", None), "w556");
        assert_eq!(die_label("w556", Some(3)), "w556 / Die 3");
    }

    #[test]
    fn framed_die_encloses_content() {
        let config = config();
        let mut namer = Namer::new();

        let mut content = Cell::new("content");
        content.rect((1, 0), Point::new(1000.0, 2000.0), (600.0, 300.0));

        let die = frame_die(content, "w556 / Die 1", "Die1", &config, &mut namer).unwrap();
        let bbox = die.bbox().unwrap();

        // 600 x 300 content sits in a 1500 x 1000 grid envelope; corner
        // markers poke out by offset + size
        assert!(bbox.width() >= 1500.0);
        assert!(bbox.height() >= 1000.0);
        // Content was re-centered: die envelope straddles the origin
        assert!(bbox.min.x < 0.0 && bbox.max.x > 0.0);
        assert!(bbox.min.y < 0.0 && bbox.max.y > 0.0);
    }
}
