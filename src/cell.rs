//! Hierarchical layout cells and GDSII export.
//!
//! Cells hold geometry in micrometers and own their placed children as a
//! tree; conversion to database units (nanometers) happens once, at the
//! gds21 boundary. Waveguides travel as GDS PATH records carrying their
//! width, so no polygon offsetting happens on this side of the fence.

use gds21::{
    GdsBoundary, GdsElement, GdsLibrary, GdsPath, GdsPoint, GdsStrans, GdsStruct,
    GdsStructRef, GdsTextElem,
};
use regex::Regex;
use thiserror::Error;

use crate::path::Point;
use crate::{Float, Layer};

/// GDSII cell names cap out at 32 characters.
const MAX_NAME: usize = 32;

/// Database units per micrometer (default gds21 units: 1 nm grid).
const DBU_PER_UM: Float = 1000.0;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Cell {0} has no geometry; cannot compute bounding box")]
    EmptyCell(String),
    #[error("Polygon with {1} vertices in cell {0}")]
    DegeneratePolygon(String, usize),
    #[error("Track with {1} vertices in cell {0}")]
    DegenerateTrack(String, usize),
}

#[derive(Debug, Clone)]
enum Elem {
    /// Filled polygon (GDS boundary).
    Poly { layer: Layer, pts: Vec<Point> },
    /// Centerline extruded at constant width (GDS path).
    Track {
        layer: Layer,
        width: Float,
        pts: Vec<Point>,
    },
    /// Annotation text centered on `origin`.
    Label {
        layer: Layer,
        text: String,
        size: Float,
        origin: Point,
    },
}

#[derive(Debug, Clone)]
struct Placement {
    cell: Cell,
    origin: Point,
    rotation: Float,
}

/// Axis-aligned bounding box in micrometers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
    pub min: Point,
    pub max: Point,
}

impl Bbox {
    fn at(p: Point) -> Bbox {
        Bbox { min: p, max: p }
    }

    fn include(&mut self, p: Point) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn width(&self) -> Float {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> Float {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        (self.min + self.max) * 0.5
    }

    fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}

/// One named layout cell: geometry plus placed sub-cells.
#[derive(Debug, Clone)]
pub struct Cell {
    name: String,
    elems: Vec<Elem>,
    children: Vec<Placement>,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Cell {
        Cell {
            name: name.into(),
            elems: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty() && self.children.is_empty()
    }

    /// Geometry elements directly in this cell.
    pub fn element_count(&self) -> usize {
        self.elems.len()
    }

    /// Placed children directly in this cell.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Adds a filled polygon.
    pub fn polygon(&mut self, layer: Layer, pts: Vec<Point>) {
        self.elems.push(Elem::Poly { layer, pts });
    }

    /// Adds a rectangle by lower-left corner and size.
    pub fn rect(&mut self, layer: Layer, origin: Point, size: (Float, Float)) {
        let (w, h) = size;
        self.polygon(
            layer,
            vec![
                origin,
                origin + Point::new(w, 0.0),
                origin + Point::new(w, h),
                origin + Point::new(0.0, h),
            ],
        );
    }

    /// Adds a rectangle centered on `center`.
    pub fn rect_centered(&mut self, layer: Layer, center: Point, size: (Float, Float)) {
        let (w, h) = size;
        self.rect(layer, center - Point::new(w / 2.0, h / 2.0), size);
    }

    /// Adds a waveguide track along `pts` extruded at `width`.
    pub fn track(&mut self, layer: Layer, width: Float, pts: Vec<Point>) {
        self.elems.push(Elem::Track { layer, width, pts });
    }

    /// Adds annotation text centered on `origin`.
    pub fn label(&mut self, layer: Layer, text: &str, size: Float, origin: Point) {
        self.elems.push(Elem::Label {
            layer,
            text: text.to_owned(),
            size,
            origin,
        });
    }

    /// Places a child cell at `origin`.
    pub fn place(&mut self, cell: Cell, origin: Point) {
        self.place_rotated(cell, origin, 0.0);
    }

    /// Places a child cell at `origin`, rotated counterclockwise.
    pub fn place_rotated(&mut self, cell: Cell, origin: Point, degrees: Float) {
        self.children.push(Placement {
            cell,
            origin,
            rotation: degrees,
        });
    }

    /// Shifts all geometry and child placements by `delta`.
    pub fn translate(&mut self, delta: Point) {
        for elem in &mut self.elems {
            match elem {
                Elem::Poly { pts, .. } | Elem::Track { pts, .. } => {
                    for p in pts.iter_mut() {
                        *p = *p + delta;
                    }
                }
                Elem::Label { origin, .. } => *origin = *origin + delta,
            }
        }
        for child in &mut self.children {
            child.origin = child.origin + delta;
        }
    }

    /// Bounding box over own geometry and all placed children.
    ///
    /// Track extents include the extrusion half-width; label extents are
    /// estimated from the glyph size.
    pub fn bbox(&self) -> Result<Bbox, LayoutError> {
        let mut bbox: Option<Bbox> = None;
        let mut grow = |p: Point| match bbox.as_mut() {
            Some(b) => b.include(p),
            None => bbox = Some(Bbox::at(p)),
        };

        for elem in &self.elems {
            match elem {
                Elem::Poly { pts, .. } => pts.iter().for_each(|&p| grow(p)),
                Elem::Track { width, pts, .. } => {
                    let half = width / 2.0;
                    for &p in pts {
                        grow(p + Point::new(half, half));
                        grow(p - Point::new(half, half));
                    }
                }
                Elem::Label { text, size, origin, .. } => {
                    // Rough glyph advance; labels have no true GDS extent
                    let w = 0.6 * size * text.chars().count() as Float;
                    grow(*origin + Point::new(w / 2.0, size / 2.0));
                    grow(*origin - Point::new(w / 2.0, size / 2.0));
                }
            }
        }

        for child in &self.children {
            if child.cell.is_empty() {
                continue;
            }
            let inner = child.cell.bbox()?;
            for corner in inner.corners() {
                grow(corner.rotated(child.rotation) + child.origin);
            }
        }

        bbox.ok_or_else(|| LayoutError::EmptyCell(self.name.clone()))
    }
}

/// Hands out collision-free GDS cell names.
///
/// Every generated name gets a running counter suffix, so instantiating
/// the same generator twice cannot collide; invalid characters are mapped
/// into the GDS charset first.
#[derive(Debug)]
pub struct Namer {
    counter: usize,
    invalid: Regex,
}

impl Default for Namer {
    fn default() -> Self {
        Self::new()
    }
}

impl Namer {
    pub fn new() -> Namer {
        Namer {
            counter: 0,
            invalid: Regex::new(r"[^0-9A-Za-z_$?]").unwrap(),
        }
    }

    /// Maps `name` into the GDS cell-name charset and length limit.
    pub fn sanitize(&self, name: &str) -> String {
        let clean = self.invalid.replace_all(name, "_");
        clean.chars().take(MAX_NAME).collect()
    }

    /// Returns `name` sanitized and suffixed with a fresh counter.
    pub fn unique(&mut self, name: &str) -> String {
        self.counter += 1;
        let suffix = format!("_{}", self.counter);
        let room = MAX_NAME - suffix.len();

        let base: String = self.sanitize(name).chars().take(room).collect();
        format!("{base}{suffix}")
    }
}

fn dbu(v: Float) -> i32 {
    (v * DBU_PER_UM).round() as i32
}

fn gds_point(p: Point) -> GdsPoint {
    GdsPoint::new(dbu(p.x), dbu(p.y))
}

fn convert(elem: Elem, cell: &str) -> Result<GdsElement, LayoutError> {
    match elem {
        Elem::Poly { layer, pts } => {
            if pts.len() < 3 {
                return Err(LayoutError::DegeneratePolygon(cell.to_owned(), pts.len()));
            }
            let mut xy: Vec<GdsPoint> = pts.iter().map(|&p| gds_point(p)).collect();
            // GDS boundaries repeat the first vertex to close
            xy.push(xy[0].clone());
            Ok(GdsElement::GdsBoundary(GdsBoundary {
                layer: layer.0,
                datatype: layer.1,
                xy,
                ..Default::default()
            }))
        }
        Elem::Track { layer, width, pts } => {
            if pts.len() < 2 {
                return Err(LayoutError::DegenerateTrack(cell.to_owned(), pts.len()));
            }
            Ok(GdsElement::GdsPath(GdsPath {
                layer: layer.0,
                datatype: layer.1,
                width: Some(dbu(width)),
                xy: pts.iter().map(|&p| gds_point(p)).collect(),
                ..Default::default()
            }))
        }
        Elem::Label {
            layer,
            text,
            size,
            origin,
        } => Ok(GdsElement::GdsTextElem(GdsTextElem {
            string: text,
            layer: layer.0,
            texttype: layer.1,
            xy: gds_point(origin),
            strans: Some(GdsStrans {
                mag: Some(size),
                ..Default::default()
            }),
            ..Default::default()
        })),
    }
}

fn flatten(cell: Cell, out: &mut Vec<GdsStruct>) -> Result<(), LayoutError> {
    let mut gds_struct = GdsStruct::new(cell.name.clone());

    for elem in cell.elems {
        gds_struct.elems.push(convert(elem, &cell.name)?);
    }

    for child in cell.children {
        gds_struct.elems.push(GdsElement::GdsStructRef(GdsStructRef {
            name: child.cell.name.clone(),
            xy: gds_point(child.origin),
            strans: (child.rotation != 0.0).then(|| GdsStrans {
                angle: Some(child.rotation),
                ..Default::default()
            }),
            ..Default::default()
        }));
        flatten(child.cell, out)?;
    }

    out.push(gds_struct);
    Ok(())
}

/// Converts a cell tree into a GDS library.
pub fn to_library(name: &str, top: Cell) -> Result<GdsLibrary, LayoutError> {
    let mut lib = GdsLibrary::new(name);
    // 1 µm user units on a 1 nm database grid
    lib.units = gds21::GdsUnits::new(1e-3, 1e-9);
    let mut structs = Vec::new();
    flatten(top, &mut structs)?;
    lib.structs = structs;
    Ok(lib)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bbox_covers_children_and_rotation() {
        let mut child = Cell::new("child");
        child.rect((1, 0), Point::new(0.0, 0.0), (10.0, 2.0));

        let mut parent = Cell::new("parent");
        parent.rect((1, 0), Point::new(-1.0, -1.0), (2.0, 2.0));
        parent.place_rotated(child, Point::new(5.0, 0.0), 90.0);

        let bbox = parent.bbox().unwrap();
        // Rotated child spans x in [3, 5], y in [0, 10]
        assert_relative_eq!(bbox.min.x, -1.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.min.y, -1.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn bbox_of_empty_cell_fails() {
        let cell = Cell::new("empty");
        assert!(matches!(cell.bbox(), Err(LayoutError::EmptyCell(_))));
    }

    #[test]
    fn translate_moves_everything() {
        let mut cell = Cell::new("c");
        cell.rect((1, 0), Point::new(0.0, 0.0), (2.0, 2.0));
        cell.place(
            {
                let mut inner = Cell::new("inner");
                inner.rect((1, 0), Point::new(0.0, 0.0), (1.0, 1.0));
                inner
            },
            Point::new(4.0, 0.0),
        );

        cell.translate(Point::new(10.0, -5.0));
        let bbox = cell.bbox().unwrap();

        assert_relative_eq!(bbox.min.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.x, 15.0, epsilon = 1e-9);
        assert_relative_eq!(bbox.min.y, -5.0, epsilon = 1e-9);
    }

    #[test]
    fn namer_sanitizes_and_uniquifies() {
        let mut namer = Namer::new();

        assert_eq!(namer.sanitize("w556 r2.5"), "w556_r2_5");
        assert_eq!(namer.unique("die"), "die_1");
        assert_eq!(namer.unique("die"), "die_2");

        let long = "x".repeat(64);
        assert!(namer.unique(&long).len() <= MAX_NAME);
    }

    #[test]
    fn export_closes_polygons_and_nests_refs() {
        let mut child = Cell::new("unit");
        child.rect((5, 0), Point::new(0.0, 0.0), (8.0, 8.0));

        let mut top = Cell::new("top");
        top.track((1, 0), 0.5, vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
        top.label((3, 0), "w500", 10.0, Point::new(50.0, 20.0));
        top.place(child, Point::new(1.5, 0.0));

        let lib = to_library("test", top).unwrap();
        assert_eq!(lib.structs.len(), 2);

        let top_struct = lib.structs.iter().find(|s| s.name == "top").unwrap();
        assert_eq!(top_struct.elems.len(), 3);

        for elem in &top_struct.elems {
            match elem {
                GdsElement::GdsPath(p) => {
                    assert_eq!(p.width, Some(500));
                    assert_eq!(p.xy.len(), 2);
                }
                GdsElement::GdsTextElem(t) => {
                    assert_eq!(t.string, "w500");
                    assert_eq!(t.xy, GdsPoint::new(50_000, 20_000));
                }
                GdsElement::GdsStructRef(r) => {
                    assert_eq!(r.name, "unit");
                    assert_eq!(r.xy, GdsPoint::new(1_500, 0));
                }
                other => panic!("unexpected element {other:?}"),
            }
        }

        let unit = lib.structs.iter().find(|s| s.name == "unit").unwrap();
        match &unit.elems[0] {
            GdsElement::GdsBoundary(b) => {
                assert_eq!(b.xy.len(), 5);
                assert_eq!(b.xy.first(), b.xy.last());
            }
            other => panic!("unexpected element {other:?}"),
        }
    }
}
