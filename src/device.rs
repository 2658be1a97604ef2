//! Waveguide device generators.
//!
//! Each generator solves (where needed) and draws one device: a straight
//! reference guide, a meander with a solved length, or a spiral delay
//! line, always terminated by grating couplers. Devices report their
//! solved and measured metrics so the chip assembly can export them.

use crate::cell::{Cell, Namer};
use crate::config::{Config, GratingCoupler};
use crate::path::Point;
use crate::solver::{MeanderSpec, SolveError, SpiralSpec, TOLERANCE};
use crate::{Float, Layer, PicmaskError};

/// Vertices sampled per bend when extruding a path.
const ARC_POINTS: usize = 32;

/// Solve targets versus achieved metrics for one device.
#[derive(Debug, Clone)]
pub struct DeviceMetrics {
    /// Die label, filled in at placement time.
    pub die: String,
    pub device: String,
    pub width: Float,
    pub bend_radius: Float,
    pub target_length: Float,
    pub length: Float,
    pub target_span: Float,
    pub span: Float,
    /// Solved free quantities: meander (a, u), spiral (n, b).
    pub solved: [Float; 2],
}

fn nm(v: Float) -> i64 {
    (v * 1000.0).round() as i64
}

/// Inclusive sweep range with values rounded to a femtometer grid, so
/// swept widths land on clean nanometer labels.
fn generate_range(start: Float, stop: Float, step: Float) -> Vec<Float> {
    if step <= 0.0 {
        return vec![start];
    }
    let n = ((stop - start) / step).round() as usize + 1;
    (0..n)
        .map(|i| ((start + i as Float * step) * 1e6).round() / 1e6)
        .collect()
}

/// Overall footprint length of the coupler geometry along x.
fn coupler_extent(gc: &GratingCoupler) -> Float {
    gc.taper_length + gc.n_periods as Float * gc.period
}

/// Builds the uniform grating coupler cell.
///
/// The waveguide port sits at the origin heading +x; a linear taper
/// opens to the full aperture, followed by the periodic teeth.
fn grating_coupler(gc: &GratingCoupler, layer: Layer, namer: &mut Namer) -> Cell {
    let mut cell = Cell::new(namer.unique("gc"));

    let aperture =
        gc.width + 2.0 * gc.taper_length * (gc.taper_angle / 2.0).to_radians().tan();
    cell.polygon(
        layer,
        vec![
            Point::new(0.0, -gc.width / 2.0),
            Point::new(gc.taper_length, -aperture / 2.0),
            Point::new(gc.taper_length, aperture / 2.0),
            Point::new(0.0, gc.width / 2.0),
        ],
    );

    let tooth = gc.period * gc.fill_factor;
    for i in 0..gc.n_periods {
        let x0 = gc.taper_length + (i as Float + 1.0) * gc.period - tooth;
        cell.rect(layer, Point::new(x0, -aperture / 2.0), (tooth, aperture));
    }

    cell
}

/// Adds a linear taper polygon between a guide end and a coupler port.
fn taper(
    cell: &mut Cell,
    layer: Layer,
    guide: Point,
    port: Point,
    guide_width: Float,
    port_width: Float,
) {
    cell.polygon(
        layer,
        vec![
            Point::new(guide.x, guide.y - guide_width / 2.0),
            Point::new(port.x, port.y - port_width / 2.0),
            Point::new(port.x, port.y + port_width / 2.0),
            Point::new(guide.x, guide.y + guide_width / 2.0),
        ],
    );
}

/// Terminates a horizontal device with a grating coupler at each end.
///
/// With tapers enabled the guide width necks to the coupler width over
/// the configured taper length; labels, when given, sit at the coupler
/// ports offset per the text config.
#[allow(clippy::too_many_arguments)]
fn attach_couplers(
    cell: &mut Cell,
    config: &Config,
    gc_config: &GratingCoupler,
    width: Float,
    start: Point,
    end: Point,
    namer: &mut Namer,
    with_tapers: bool,
    label: Option<&str>,
) {
    let wg_layer = config.layers.waveguide;
    let taper_len = if with_tapers { config.taper.length } else { 0.0 };

    let left_port = start - Point::new(taper_len, 0.0);
    let right_port = end + Point::new(taper_len, 0.0);

    if with_tapers {
        taper(cell, wg_layer, start, left_port, width, gc_config.width);
        taper(cell, wg_layer, end, right_port, width, gc_config.width);
    }

    let gc = grating_coupler(gc_config, wg_layer, namer);
    cell.place_rotated(gc.clone(), left_port, 180.0);
    cell.place(gc, right_port);

    if let Some(text) = label {
        let t = &config.text;
        let layer = t.layer.unwrap_or(config.layers.text);
        cell.label(
            layer,
            text,
            t.size,
            left_port + Point::new(t.offset_left, 0.0),
        );
        cell.label(
            layer,
            text,
            t.size,
            right_port + Point::new(t.offset_right, 0.0),
        );
    }
}

/// Builds one meander device at bend radius `r`.
pub fn meander_device(
    config: &Config,
    width: Float,
    r: Float,
    namer: &mut Namer,
) -> Result<(Cell, DeviceMetrics), PicmaskError> {
    let geometry = &config.geometry;
    let spec = MeanderSpec {
        total_length: geometry.l,
        x_span: geometry.d,
        lead: geometry.x,
        turn_radius: geometry.s,
        bend_radius: r,
        bend_units: geometry.bend_units,
    };
    let (path, solution) = spec.build()?;

    let label = format!("w{}r{}", nm(width), r);
    let mut cell = Cell::new(namer.unique(&label));
    cell.track(config.layers.waveguide, width, path.centerline(ARC_POINTS));

    let text = config.text.enable.then_some(label.as_str());
    attach_couplers(
        &mut cell,
        config,
        &config.grating_coupler,
        width,
        path.start().position,
        path.end().position,
        namer,
        true,
        text,
    );

    let metrics = DeviceMetrics {
        die: String::new(),
        device: label,
        width,
        bend_radius: r,
        target_length: geometry.l,
        length: path.length(),
        target_span: geometry.d,
        span: path.x_span(),
        solved: [solution.arm, solution.balance],
    };

    Ok((cell, metrics))
}

/// Builds the meander radius sweep: one device per configured radius,
/// stacked vertically at the configured spacing.
///
/// # Errors
/// Beyond per-device solve errors, the sweep is rejected when its
/// members disagree on length or span beyond [`TOLERANCE`]; identical
/// targets must yield identical metrics at every radius.
pub fn meander_sweep(
    config: &Config,
    width: Float,
    namer: &mut Namer,
) -> Result<(Cell, Vec<DeviceMetrics>), PicmaskError> {
    let radii = config.geometry.sweep();
    let gaps = config.array.spacing.gaps(radii.len());

    let mut array = Cell::new(namer.unique(&format!("w{}", nm(width))));
    let mut metrics: Vec<DeviceMetrics> = Vec::new();

    let mut y = 0.0;
    for (i, &r) in radii.iter().enumerate() {
        let (mut device, m) = meander_device(config, width, r, namer)?;

        // Stack each device about its own bbox center
        let center = device.bbox()?.center();
        device.translate(Point::new(-center.x, -center.y));
        array.place(device, Point::new(0.0, y));

        metrics.push(m);
        if i < gaps.len() {
            y += gaps[i];
        }
    }

    if let Some(first) = metrics.first() {
        for m in &metrics {
            let dl = (m.length - first.length).abs();
            if dl > TOLERANCE {
                return Err(SolveError::Verification {
                    metric: "sweep length uniformity",
                    delta: dl,
                }
                .into());
            }
            let ds = (m.span - first.span).abs();
            if ds > TOLERANCE {
                return Err(SolveError::Verification {
                    metric: "sweep span uniformity",
                    delta: ds,
                }
                .into());
            }
        }
    }

    Ok((array, metrics))
}

/// Builds the spiral delay line device.
pub fn spiral_device(
    config: &Config,
    width_override: Option<Float>,
    namer: &mut Namer,
) -> Result<(Cell, DeviceMetrics), PicmaskError> {
    let spiral = &config.spiral;
    let width = width_override.unwrap_or(spiral.waveguide_width);

    let spec = SpiralSpec {
        total_length: spiral.total_waveguide_length,
        coupler_distance: spiral.distance_bw_couplers,
        coupler_length: spiral.length_of_the_coupler,
        field_size: spiral.ebm_field_size,
        bend_radius: spiral.bend_radius,
    };
    let (path, solution) = spec.build()?;

    let name = format!("spiral_w{}", nm(width));
    let mut cell = Cell::new(namer.unique(&name));
    cell.track(config.layers.waveguide, width, path.centerline(ARC_POINTS));

    // Couplers sit directly on the spiral ends, no taper stage
    attach_couplers(
        &mut cell,
        config,
        &config.grating_coupler,
        width,
        path.start().position,
        path.end().position,
        namer,
        false,
        None,
    );

    let metrics = DeviceMetrics {
        die: String::new(),
        device: name,
        width,
        bend_radius: spiral.bend_radius,
        target_length: spiral.total_waveguide_length,
        length: path.length(),
        target_span: spiral.distance_bw_couplers - 2.0 * spiral.length_of_the_coupler,
        span: path.x_span(),
        solved: [solution.turns, solution.tail],
    };

    Ok((cell, metrics))
}

/// Builds one straight reference waveguide with couplers at `period`.
fn straight_waveguide(
    config: &Config,
    width: Float,
    period: Float,
    namer: &mut Namer,
) -> Cell {
    let wp = &config.width_pitch;
    let name = format!("w{}p{}", nm(width), nm(period));
    let mut cell = Cell::new(namer.unique(&name));

    let start = Point::new(0.0, 0.0);
    let end = Point::new(wp.wg_length, 0.0);
    cell.track(config.layers.waveguide, width, vec![start, end]);

    let mut gc_config = config.grating_coupler.clone();
    gc_config.period = period;
    attach_couplers(
        &mut cell, config, &gc_config, width, start, end, namer, true, None,
    );

    // Device markers flank the coupler fiber ends, labels outside them
    let reach = config.taper.length + coupler_extent(&gc_config);
    let marker_left = Point::new(start.x - reach - wp.marker_offset - wp.marker_size / 2.0, 0.0);
    let marker_right = Point::new(end.x + reach + wp.marker_offset + wp.marker_size / 2.0, 0.0);
    let size = (wp.marker_size, wp.marker_size);
    cell.rect_centered(config.layers.marker, marker_left, size);
    cell.rect_centered(config.layers.marker, marker_right, size);

    let text = format!("w{} p{}", nm(width), nm(period));
    let half = 0.3 * wp.marker_size * text.chars().count() as Float;
    let step = wp.marker_size / 2.0 + wp.text_offset_x + half;
    cell.label(
        config.layers.die_text,
        &text,
        wp.marker_size,
        marker_left + Point::new(-step, wp.text_offset_y),
    );
    cell.label(
        config.layers.die_text,
        &text,
        wp.marker_size,
        marker_right + Point::new(step, wp.text_offset_y),
    );

    cell
}

/// Builds the width x pitch sweep of straight reference guides: one
/// cascade cell per period, devices stepped diagonally inside each.
pub fn width_pitch_cascades(
    config: &Config,
    namer: &mut Namer,
) -> Result<(Cell, String), PicmaskError> {
    let wp = &config.width_pitch;
    let widths = generate_range(wp.wg_width_start, wp.wg_width_stop, wp.wg_width_step);
    let periods = generate_range(wp.period_start, wp.period_stop, wp.period_step);

    let mut cascades = Cell::new(namer.unique("wp_cascades"));

    for (j, &period) in periods.iter().enumerate() {
        let cascade_name = format!("{}{}", wp.cascade_name_prefix, nm(period));
        let mut cascade = Cell::new(namer.unique(&cascade_name));

        for (i, &width) in widths.iter().enumerate() {
            let device = straight_waveguide(config, width, period, namer);
            cascade.place(
                device,
                Point::new(i as Float * wp.x_offset, -(i as Float) * wp.y_spacing),
            );
        }

        cascades.place(
            cascade,
            Point::new(wp.x0, wp.y0 - j as Float * wp.cascade_spacing),
        );
    }

    let die_name = format!("{}1", config.die_text.name_prefix);
    Ok((cascades, die_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> Config {
        serde_json::from_str(
            r#"{
            "geometry": { "r": 20.0, "L": 10000.0, "D": 3300.0,
                          "x": 165.0, "s": 20.0, "width": 0.556,
                          "r_values": [0.0, 10.0, 20.0, 40.0] }
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn range_is_inclusive_and_rounded() {
        let widths = generate_range(0.45, 0.6, 0.05);
        assert_eq!(widths, vec![0.45, 0.5, 0.55, 0.6]);
        assert_eq!(generate_range(0.5, 0.5, 0.0), vec![0.5]);
    }

    #[test]
    fn coupler_cell_spans_its_teeth() {
        let config = config();
        let mut namer = Namer::new();
        let gc = grating_coupler(&config.grating_coupler, (1, 0), &mut namer);

        let bbox = gc.bbox().unwrap();
        assert_relative_eq!(bbox.min.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            bbox.max.x,
            coupler_extent(&config.grating_coupler),
            epsilon = 1e-9
        );
    }

    #[test]
    fn meander_device_reports_solved_metrics() {
        let config = config();
        let mut namer = Namer::new();
        let (cell, metrics) = meander_device(&config, 0.556, 20.0, &mut namer).unwrap();

        assert!(!cell.is_empty());
        assert!(metrics.device.starts_with("w556r20"));
        assert!((metrics.length - metrics.target_length).abs() < TOLERANCE);
        assert!((metrics.span - metrics.target_span).abs() < TOLERANCE);
        assert!(metrics.solved[0] > 0.0);
        assert!(metrics.solved[1] > 0.0);
    }

    #[test]
    fn sweep_is_uniform_across_radii() {
        let config = config();
        let mut namer = Namer::new();
        let (array, metrics) = meander_sweep(&config, 0.556, &mut namer).unwrap();

        assert!(!array.is_empty());
        assert_eq!(metrics.len(), 4);
        for pair in metrics.windows(2) {
            assert_relative_eq!(pair[0].length, pair[1].length, epsilon = 1e-9);
            assert_relative_eq!(pair[0].span, pair[1].span, epsilon = 1e-9);
        }
    }

    #[test]
    fn spiral_device_solves_scenario() {
        let config = config();
        let mut namer = Namer::new();
        let (cell, metrics) = spiral_device(&config, None, &mut namer).unwrap();

        assert!(!cell.is_empty());
        assert!((metrics.length - 10000.0).abs() < TOLERANCE);
        // Default radius equals the pitch, so the span identity holds
        assert!((metrics.span - metrics.target_span).abs() < TOLERANCE);
        assert!(metrics.solved[0] >= 11.0);
    }

    #[test]
    fn cascades_cover_the_sweep_grid() {
        let config = config();
        let mut namer = Namer::new();
        let (cascades, die_name) = width_pitch_cascades(&config, &mut namer).unwrap();

        assert_eq!(die_name, "Die1");
        // 4 periods x 4 widths of devices, all inside the cascade tree
        let bbox = cascades.bbox().unwrap();
        assert!(bbox.height() > 3.0 * config.width_pitch.cascade_spacing);
        assert!(bbox.width() >= config.width_pitch.wg_length);
    }
}
