//! Waveguide centerline primitives.
//!
//! A [`Path`] is an ordered chain of straight runs and constant-radius
//! bends anchored at a start pose. Nothing is rendered here; the chain is
//! integrated segment by segment to obtain its total arc length and end
//! pose, and can be sampled into a polyline for extrusion into mask
//! geometry. The same integration doubles as a measurement probe: the
//! meander solver assembles its fixed bend pattern once as a throwaway
//! path and reads the pattern's length and x-span off it.

use derive_more::{Add, Mul, Sub};

use crate::Float;

/// 2D point or displacement in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Default, Add, Sub, Mul)]
pub struct Point {
    pub x: Float,
    pub y: Float,
}

impl Point {
    pub fn new(x: Float, y: Float) -> Point {
        Point { x, y }
    }

    /// Rotates the point about the origin by `degrees` counterclockwise.
    pub fn rotated(self, degrees: Float) -> Point {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Point::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

/// Position plus heading (degrees counterclockwise from +x).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub position: Point,
    pub heading: Float,
}

impl Pose {
    pub fn new(position: Point, heading: Float) -> Pose {
        Pose { position, heading }
    }
}

/// One path primitive.
///
/// A bend covers `angle` signed degrees at constant `radius`; its arc
/// length is `radius * |angle|` in radians. Positive angles turn left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Straight { length: Float },
    Bend { radius: Float, angle: Float },
}

impl Segment {
    pub fn length(&self) -> Float {
        match *self {
            Segment::Straight { length } => length,
            Segment::Bend { radius, angle } => radius * angle.to_radians().abs(),
        }
    }

    /// Pose after traversing this segment starting at `from`.
    pub fn advance(&self, from: Pose) -> Pose {
        match *self {
            Segment::Straight { length } => Pose::new(
                from.position + Point::new(length, 0.0).rotated(from.heading),
                from.heading,
            ),
            Segment::Bend { radius, angle } => {
                let theta = angle.to_radians();
                // Chord of a circular arc in the segment's local frame
                let local = Point::new(
                    radius * theta.abs().sin(),
                    theta.signum() * radius * (1.0 - theta.abs().cos()),
                );
                Pose::new(
                    from.position + local.rotated(from.heading),
                    from.heading + angle,
                )
            }
        }
    }
}

/// Ordered segment chain with a fixed start pose.
///
/// Constructed once per parameter set, consumed for rendering, then
/// discarded; derived metrics are computed on demand rather than stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    start: Pose,
    segments: Vec<Segment>,
}

impl Path {
    pub fn new(start: Pose) -> Path {
        Path {
            start,
            segments: Vec::new(),
        }
    }

    pub fn straight(&mut self, length: Float) {
        self.segments.push(Segment::Straight { length });
    }

    pub fn bend(&mut self, radius: Float, angle: Float) {
        self.segments.push(Segment::Bend { radius, angle });
    }

    pub fn start(&self) -> Pose {
        self.start
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total arc length over all segments.
    pub fn length(&self) -> Float {
        self.segments.iter().map(Segment::length).sum()
    }

    /// End pose obtained by integrating every segment from the start pose.
    pub fn end(&self) -> Pose {
        self.segments
            .iter()
            .fold(self.start, |pose, seg| seg.advance(pose))
    }

    /// Net x displacement from start to end.
    pub fn x_span(&self) -> Float {
        self.end().position.x - self.start.position.x
    }

    /// Samples the path into a polyline, `arc_points` vertices per bend.
    ///
    /// Zero-length straights collapse onto the previous vertex and are
    /// dropped so the polyline carries no duplicate points.
    pub fn centerline(&self, arc_points: usize) -> Vec<Point> {
        let mut pts = vec![self.start.position];
        let mut pose = self.start;

        for seg in &self.segments {
            match *seg {
                Segment::Straight { length } => {
                    pose = seg.advance(pose);
                    if length != 0.0 {
                        pts.push(pose.position);
                    }
                }
                Segment::Bend { radius, angle } => {
                    let n = arc_points.max(1);
                    for i in 1..=n {
                        let part = Segment::Bend {
                            radius,
                            angle: angle * i as Float / n as Float,
                        };
                        pts.push(part.advance(pose).position);
                    }
                    pose = seg.advance(pose);
                }
            }
        }

        pts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn straight_advances_along_heading() {
        let pose = Pose::new(Point::new(1.0, 2.0), 90.0);
        let end = Segment::Straight { length: 5.0 }.advance(pose);

        assert_relative_eq!(end.position.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(end.position.y, 7.0, epsilon = 1e-12);
        assert_relative_eq!(end.heading, 90.0);
    }

    #[test]
    fn quarter_bend_displacement() {
        let end = Segment::Bend {
            radius: 10.0,
            angle: -90.0,
        }
        .advance(Pose::default());

        assert_relative_eq!(end.position.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(end.position.y, -10.0, epsilon = 1e-9);
        assert_relative_eq!(end.heading, -90.0);
    }

    #[test]
    fn u_turn_displacement() {
        // A 180 degree turn moves the path sideways by one diameter
        let end = Segment::Bend {
            radius: 20.0,
            angle: 180.0,
        }
        .advance(Pose::default());

        assert_relative_eq!(end.position.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(end.position.y, 40.0, epsilon = 1e-9);
        assert_relative_eq!(end.heading, 180.0);
    }

    #[test]
    fn quad_unit_is_displacement_neutral() {
        // The meander pattern unit advances x by 4r and restores y and heading
        let r = 15.0;
        let mut path = Path::new(Pose::default());
        path.bend(r, -90.0);
        path.bend(r, 90.0);
        path.bend(r, 90.0);
        path.bend(r, -90.0);

        let end = path.end();
        assert_relative_eq!(end.position.x, 4.0 * r, epsilon = 1e-9);
        assert_relative_eq!(end.position.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(end.heading, 0.0, epsilon = 1e-12);
        assert_relative_eq!(path.length(), 2.0 * std::f64::consts::PI * r, epsilon = 1e-9);
    }

    #[test]
    fn length_sums_segments() {
        let mut path = Path::new(Pose::default());
        path.straight(100.0);
        path.bend(10.0, 90.0);
        path.straight(50.0);

        let arc = 10.0 * std::f64::consts::FRAC_PI_2;
        assert_relative_eq!(path.length(), 150.0 + arc, epsilon = 1e-9);
    }

    #[test]
    fn centerline_ends_at_end_pose() {
        let mut path = Path::new(Pose::new(Point::new(-3.0, 1.0), 0.0));
        path.straight(12.0);
        path.bend(5.0, -180.0);
        path.straight(12.0);

        let pts = path.centerline(16);
        let last = *pts.last().unwrap();
        let end = path.end().position;

        assert_relative_eq!(last.x, end.x, epsilon = 1e-9);
        assert_relative_eq!(last.y, end.y, epsilon = 1e-9);
        assert_eq!(pts[0], path.start().position);
    }

    #[test]
    fn centerline_drops_zero_length_straights() {
        let mut path = Path::new(Pose::default());
        path.straight(10.0);
        path.straight(0.0);
        path.straight(10.0);

        assert_eq!(path.centerline(8).len(), 3);
    }
}
