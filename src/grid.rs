//! Chip-scale furniture: boundary, grid, markers, particles.
//!
//! Everything here is plain coordinate bookkeeping over the chip
//! extents; the components mirror the reticle furniture a mask shop
//! expects around the dies.

use crate::cell::{Cell, Namer};
use crate::config::{ChipConfig, Config, Layers, Particles};
use crate::path::Point;
use crate::{warnln, Float};

/// Four edge bars forming the chip outline.
fn chip_boundary(chip: &ChipConfig, layers: &Layers, namer: &mut Namer) -> Cell {
    let mut cell = Cell::new(namer.unique("chip_boundary"));
    let [w, h] = chip.chip_size;
    let lw = chip.grid_settings.boundary_line_width;
    let layer = layers.chip_boundary;

    cell.rect_centered(layer, Point::new(0.0, h / 2.0 - lw / 2.0), (w, lw));
    cell.rect_centered(layer, Point::new(0.0, -h / 2.0 + lw / 2.0), (w, lw));
    // Vertical bars run the full height to meet the horizontal ones
    cell.rect_centered(layer, Point::new(-w / 2.0 + lw / 2.0, 0.0), (lw, h));
    cell.rect_centered(layer, Point::new(w / 2.0 - lw / 2.0, 0.0), (lw, h));

    cell
}

/// Grid lines every grid box across the whole chip.
fn grid_lines(chip: &ChipConfig, layers: &Layers, namer: &mut Namer) -> Cell {
    let mut cell = Cell::new(namer.unique("grid_lines"));
    let [w, h] = chip.chip_size;
    let box_size = chip.grid_settings.grid_box_size;
    let lw = chip.grid_settings.grid_line_width;

    let num_x = (w / box_size).floor() as usize;
    let num_y = (h / box_size).floor() as usize;

    for i in 0..=num_x {
        let x = -w / 2.0 + i as Float * box_size;
        cell.rect_centered(layers.grid, Point::new(x, 0.0), (lw, h));
    }
    for i in 0..=num_y {
        let y = -h / 2.0 + i as Float * box_size;
        cell.rect_centered(layers.grid, Point::new(0.0, y), (w, lw));
    }

    cell
}

/// Box-style coordinate markers along all four chip edges, one per grid
/// box, each annotated with its own center coordinates.
fn coordinate_markers(chip: &ChipConfig, layers: &Layers, namer: &mut Namer) -> Cell {
    let mut cell = Cell::new(namer.unique("coordinate_markers"));
    let [w, h] = chip.chip_size;
    let markers = &chip.coordinate_markers;
    let spacing = chip.grid_settings.grid_box_size;

    let put = |cell: &mut Cell, x: Float, y: Float| {
        cell.rect_centered(
            layers.marker_boxes,
            Point::new(x, y),
            (markers.marker_size, markers.marker_size),
        );
        let text = format!("({},{})", x as i64, y as i64);
        cell.label(
            layers.marker_text,
            &text,
            markers.text_size,
            Point::new(x, y + markers.text_y_offset),
        );
    };

    // Top and bottom rows
    let num_h = (w / spacing).floor() as usize;
    for i in 0..num_h {
        let x = -w / 2.0 + i as Float * spacing + spacing / 2.0;
        put(&mut cell, x, h / 2.0 - markers.offsets.horizontal);
        put(&mut cell, x, -h / 2.0 + markers.offsets.horizontal);
    }

    // Left and right columns
    let num_v = (h / spacing).floor() as usize;
    for i in 0..num_v {
        let y = -h / 2.0 + i as Float * spacing + spacing / 2.0;
        put(&mut cell, -w / 2.0 + markers.offsets.vertical, y);
        put(&mut cell, w / 2.0 - markers.offsets.vertical, y);
    }

    cell
}

/// Registration squares at the four inner corners of every e-beam
/// write field, clipped to the chip outline.
fn ebeam_field_markers(chip: &ChipConfig, layers: &Layers, namer: &mut Namer) -> Cell {
    let mut cell = Cell::new(namer.unique("ebeam_field_markers"));
    let [w, h] = chip.chip_size;
    let field = chip.ebeam_field.field_size;
    let settings = &chip.ebeam_field.marker_settings;

    let fields_x = (w / field).floor() as i64;
    let fields_y = (h / field).floor() as i64;
    if fields_x <= 0 || fields_y <= 0 {
        warnln!("Chip too small for any e-beam fields; skipping field markers");
        return cell;
    }

    // Center the field array on the chip
    let start_x = -(fields_x as Float * field) / 2.0;
    let start_y = -(fields_y as Float * field) / 2.0;

    for ix in 0..fields_x {
        for iy in 0..fields_y {
            let left = start_x + ix as Float * field;
            let bottom = start_y + iy as Float * field;
            let right = left + field;
            let top = bottom + field;
            let o = settings.marker_offset;

            let corners = [
                Point::new(left + o, top - o),
                Point::new(right - o, top - o),
                Point::new(left + o, bottom + o),
                Point::new(right - o, bottom + o),
            ];
            for corner in corners {
                let inside = corner.x.abs() < w / 2.0 && corner.y.abs() < h / 2.0;
                if inside {
                    cell.rect_centered(
                        layers.ebeam_field_markers,
                        corner,
                        (settings.marker_size, settings.marker_size),
                    );
                }
            }
        }
    }

    cell
}

fn origin_marker(chip: &ChipConfig, layers: &Layers, namer: &mut Namer) -> Cell {
    let mut cell = Cell::new(namer.unique("origin_marker"));
    let [w, h] = chip.origin_marker_settings.size;
    cell.rect_centered(layers.origin_marker, Point::new(0.0, 0.0), (w, h));
    cell
}

/// Assembles the full chip grid cell.
pub fn chip_grid(config: &Config, namer: &mut Namer) -> Cell {
    let chip = &config.chip;
    let layers = &config.layers;

    let mut grid = Cell::new(namer.unique("Grid"));
    let origin = Point::new(0.0, 0.0);

    grid.place(chip_boundary(chip, layers, namer), origin);
    grid.place(grid_lines(chip, layers, namer), origin);
    grid.place(coordinate_markers(chip, layers, namer), origin);
    grid.place(ebeam_field_markers(chip, layers, namer), origin);
    grid.place(origin_marker(chip, layers, namer), origin);

    grid
}

/// Calibration boxes from the particles config, grouped under one cell
/// and offset by the configured origin.
pub fn particles(config: &Particles, layers: &Layers, namer: &mut Namer) -> Cell {
    let mut cell = Cell::new(namer.unique("particles"));
    let [ox, oy] = config.origin;

    for particle in &config.particles {
        let mut boxed = Cell::new(namer.unique(&format!("box_{}", particle.name)));
        boxed.rect_centered(
            particle.layer.unwrap_or(layers.particle),
            Point::new(0.0, 0.0),
            (particle.width, particle.height),
        );

        let [px, py] = particle.position;
        cell.place(boxed, Point::new(px + ox, py + oy));
    }

    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn config() -> Config {
        serde_json::from_str(
            r#"{
            "chip": { "chip_size": [1000.0, 1000.0] },
            "geometry": { "r": 20.0, "L": 10000.0, "D": 3300.0,
                          "x": 165.0, "s": 20.0, "width": 0.556 }
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn grid_spans_the_chip() {
        let config = config();
        let mut namer = Namer::new();
        let grid = chip_grid(&config, &mut namer);

        let bbox = grid.bbox().unwrap();
        // Boundary bars reach the chip outline; marker text may poke past
        assert!(bbox.width() >= 1000.0);
        assert!(bbox.height() >= 1000.0);
        assert_eq!(grid.child_count(), 5);
    }

    #[test]
    fn grid_lines_cover_every_box_edge() {
        let config = config();
        let mut namer = Namer::new();
        let lines = grid_lines(&config.chip, &config.layers, &mut namer);

        // 1000 / 500 = 2 boxes per axis means 3 lines each way
        assert_eq!(lines.element_count(), 6);
    }

    #[test]
    fn field_markers_stay_inside_the_chip() {
        let config = config();
        let mut namer = Namer::new();
        let markers = ebeam_field_markers(&config.chip, &config.layers, &mut namer);

        // 2 x 2 fields with four corner squares each, none clipped
        assert_eq!(markers.element_count(), 16);
        let bbox = markers.bbox().unwrap();
        assert!(bbox.max.x < 500.0);
        assert!(bbox.min.y > -500.0);
    }

    #[test]
    fn particles_sit_at_offset_positions() {
        let particles_config: Particles = serde_json::from_str(
            r#"{
            "origin": [100.0, 0.0],
            "particles": [
                { "name": "left", "width": 10.0, "height": 10.0,
                  "position": [-50.0, 0.0] },
                { "name": "right", "width": 10.0, "height": 10.0,
                  "position": [50.0, 0.0], "layer": [70, 0] }
            ]
        }"#,
        )
        .unwrap();

        let config = config();
        let mut namer = Namer::new();
        let cell = particles(&particles_config, &config.layers, &mut namer);

        assert_eq!(cell.child_count(), 2);
        let bbox = cell.bbox().unwrap();
        assert_eq!(bbox.center(), Point::new(100.0, 0.0));
    }
}
