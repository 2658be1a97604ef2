//! Layout configuration.
//!
//! One JSON or YAML document drives a whole chip: geometry targets for
//! the solvers, layer assignments, device and die dressing, and the
//! placement list. Every knob the original generator scripts read from
//! their JSON files lives here, with the same defaults; missing required
//! keys fail at parse time.

use serde::Deserialize;
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

use crate::{Float, Layer, PicmaskError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported file extension: {0}")]
    FileType(String),
}

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub chip: ChipConfig,
    #[serde(default)]
    pub layers: Layers,
    pub geometry: Geometry,
    #[serde(default)]
    pub text: DeviceText,
    #[serde(default)]
    pub taper: Taper,
    #[serde(default)]
    pub grating_coupler: GratingCoupler,
    #[serde(default)]
    pub die_box: DieBox,
    #[serde(default)]
    pub die_text: DieText,
    #[serde(default)]
    pub e_beam_marker: EBeamMarker,
    #[serde(default)]
    pub array: ArrayConfig,
    #[serde(default)]
    pub width_pitch: WidthPitch,
    #[serde(default)]
    pub spiral: Spiral,
    #[serde(default)]
    pub particles: Particles,
    #[serde(default)]
    pub placements: Vec<Placement>,
    #[serde(default)]
    pub output: Output,
}

/// Meander solver targets and the device width they are drawn at.
#[derive(Debug, Clone, Deserialize)]
pub struct Geometry {
    /// Bend-pattern radius r; 0 degenerates the pattern to a straight.
    pub r: Float,
    /// Target total path length L.
    #[serde(rename = "L")]
    pub l: Float,
    /// Target endpoint x separation D.
    #[serde(rename = "D")]
    pub d: Float,
    /// Fixed lead straight x.
    pub x: Float,
    /// 180 degree turn radius s.
    pub s: Float,
    /// Waveguide width.
    pub width: Float,
    /// Radii swept by the meander array die; falls back to `r` alone.
    #[serde(default)]
    pub r_values: Vec<Float>,
    /// Quad-unit count of the fixed bend pattern.
    #[serde(default = "default_bend_units")]
    pub bend_units: usize,
}

fn default_bend_units() -> usize {
    crate::solver::DEFAULT_BEND_UNITS
}

impl Geometry {
    /// Radii the meander array sweeps over.
    pub fn sweep(&self) -> Vec<Float> {
        if self.r_values.is_empty() {
            vec![self.r]
        } else {
            self.r_values.clone()
        }
    }
}

/// Chip-scale furniture: boundary, grid, markers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChipConfig {
    pub chip_size: [Float; 2],
    pub grid_settings: GridSettings,
    pub coordinate_markers: CoordinateMarkers,
    pub ebeam_field: EbeamField,
    pub origin_marker_settings: OriginMarker,
}

impl Default for ChipConfig {
    fn default() -> Self {
        ChipConfig {
            chip_size: [10000.0, 10000.0],
            grid_settings: GridSettings::default(),
            coordinate_markers: CoordinateMarkers::default(),
            ebeam_field: EbeamField::default(),
            origin_marker_settings: OriginMarker::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub grid_box_size: Float,
    pub grid_line_width: Float,
    pub boundary_line_width: Float,
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            grid_box_size: 500.0,
            grid_line_width: 0.2,
            boundary_line_width: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CoordinateMarkers {
    pub marker_size: Float,
    pub text_size: Float,
    pub offsets: MarkerOffsets,
    pub text_y_offset: Float,
}

impl Default for CoordinateMarkers {
    fn default() -> Self {
        CoordinateMarkers {
            marker_size: 20.0,
            text_size: 10.0,
            offsets: MarkerOffsets::default(),
            text_y_offset: -15.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarkerOffsets {
    pub vertical: Float,
    pub horizontal: Float,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EbeamField {
    pub field_size: Float,
    pub marker_settings: EbeamMarkerSettings,
}

impl Default for EbeamField {
    fn default() -> Self {
        EbeamField {
            field_size: 500.0,
            marker_settings: EbeamMarkerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EbeamMarkerSettings {
    pub marker_size: Float,
    pub marker_offset: Float,
}

impl Default for EbeamMarkerSettings {
    fn default() -> Self {
        EbeamMarkerSettings {
            marker_size: 8.0,
            marker_offset: 16.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OriginMarker {
    pub size: [Float; 2],
}

impl Default for OriginMarker {
    fn default() -> Self {
        OriginMarker { size: [8.0, 8.0] }
    }
}

/// Layer assignments, as (layer, datatype) pairs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Layers {
    pub waveguide: Layer,
    pub text: Layer,
    pub marker: Layer,
    pub die_box: Layer,
    pub die_grid: Layer,
    pub die_text: Layer,
    pub e_beam_marker: Layer,
    pub chip_boundary: Layer,
    pub grid: Layer,
    pub marker_boxes: Layer,
    pub marker_text: Layer,
    pub ebeam_field_markers: Layer,
    pub origin_marker: Layer,
    pub particle: Layer,
}

impl Default for Layers {
    fn default() -> Self {
        Layers {
            waveguide: (1, 0),
            text: (3, 0),
            marker: (10, 0),
            die_box: (99, 0),
            die_grid: (98, 0),
            die_text: (3, 0),
            e_beam_marker: (95, 0),
            chip_boundary: (99, 0),
            grid: (98, 0),
            marker_boxes: (97, 0),
            marker_text: (97, 0),
            ebeam_field_markers: (95, 0),
            origin_marker: (2, 0),
            particle: (69, 0),
        }
    }
}

/// Per-device label options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceText {
    pub enable: bool,
    pub size: Float,
    pub offset_left: Float,
    pub offset_right: Float,
    /// Overrides `layers.text` for device labels when set.
    pub layer: Option<Layer>,
}

impl Default for DeviceText {
    fn default() -> Self {
        DeviceText {
            enable: true,
            size: 10.0,
            offset_left: -100.0,
            offset_right: 100.0,
            layer: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Taper {
    pub length: Float,
}

impl Default for Taper {
    fn default() -> Self {
        Taper { length: 10.0 }
    }
}

/// Uniform grating coupler parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GratingCoupler {
    pub n_periods: usize,
    pub period: Float,
    pub fill_factor: Float,
    pub taper_length: Float,
    pub taper_angle: Float,
    pub wavelength: Float,
    pub fiber_angle: Float,
    pub polarization: String,
    pub width: Float,
}

impl Default for GratingCoupler {
    fn default() -> Self {
        GratingCoupler {
            n_periods: 20,
            period: 0.75,
            fill_factor: 0.5,
            taper_length: 16.6,
            taper_angle: 30.0,
            wavelength: 1.55,
            fiber_angle: 15.0,
            polarization: String::from("te"),
            width: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DieBox {
    pub grid_size: Float,
    pub grid_line_width: Float,
}

impl Default for DieBox {
    fn default() -> Self {
        DieBox {
            grid_size: 500.0,
            grid_line_width: 0.002,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DieText {
    pub text_size: Float,
    pub offset_x: Float,
    pub offset_y: Float,
    pub name_prefix: String,
}

impl Default for DieText {
    fn default() -> Self {
        DieText {
            text_size: 50.0,
            offset_x: 150.0,
            offset_y: 150.0,
            name_prefix: String::from("Die"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EBeamMarker {
    pub size: Float,
    pub offset: Float,
}

impl Default for EBeamMarker {
    fn default() -> Self {
        EBeamMarker {
            size: 8.0,
            offset: 45.0,
        }
    }
}

/// Vertical spacing between sweep devices: one value for all gaps, or a
/// per-gap list (padded with its last entry, truncated when too long).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Spacing {
    Uniform(Float),
    Custom(Vec<Float>),
}

impl Default for Spacing {
    fn default() -> Self {
        Spacing::Uniform(200.0)
    }
}

impl Spacing {
    /// Resolves the gap list for `devices` stacked devices.
    pub fn gaps(&self, devices: usize) -> Vec<Float> {
        let wanted = devices.saturating_sub(1);
        match self {
            Spacing::Uniform(v) => vec![*v; wanted],
            Spacing::Custom(list) => {
                let mut gaps = list.clone();
                let pad = gaps.last().copied().unwrap_or(200.0);
                gaps.resize(wanted, pad);
                gaps
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    pub spacing: Spacing,
    pub displacement: Displacement,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Displacement {
    pub x: Float,
    pub y: Float,
}

/// Width-and-pitch sweep of straight reference waveguides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WidthPitch {
    pub wg_length: Float,
    pub wg_width_start: Float,
    pub wg_width_stop: Float,
    pub wg_width_step: Float,
    pub period_start: Float,
    pub period_stop: Float,
    pub period_step: Float,
    pub y_spacing: Float,
    pub x_offset: Float,
    pub cascade_spacing: Float,
    pub x0: Float,
    pub y0: Float,
    pub cascade_name_prefix: String,
    pub marker_size: Float,
    pub marker_offset: Float,
    pub text_offset_x: Float,
    pub text_offset_y: Float,
}

impl Default for WidthPitch {
    fn default() -> Self {
        WidthPitch {
            wg_length: 3000.0,
            wg_width_start: 0.45,
            wg_width_stop: 0.6,
            wg_width_step: 0.05,
            period_start: 0.66,
            period_stop: 0.78,
            period_step: 0.04,
            y_spacing: 127.0,
            x_offset: 0.0,
            cascade_spacing: 600.0,
            x0: 0.0,
            y0: 0.0,
            cascade_name_prefix: String::from("p"),
            marker_size: 8.0,
            marker_offset: 50.0,
            text_offset_x: 18.0,
            text_offset_y: 0.0,
        }
    }
}

/// Spiral delay line parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Spiral {
    pub distance_bw_couplers: Float,
    pub length_of_the_coupler: Float,
    pub bend_radius: Float,
    pub ebm_field_size: Float,
    pub waveguide_width: Float,
    pub total_waveguide_length: Float,
}

impl Default for Spiral {
    fn default() -> Self {
        Spiral {
            distance_bw_couplers: 3300.0,
            length_of_the_coupler: 165.0,
            bend_radius: 20.0,
            ebm_field_size: 200.0,
            waveguide_width: 0.556,
            total_waveguide_length: 10000.0,
        }
    }
}

/// Standalone calibration boxes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Particles {
    pub origin: [Float; 2],
    pub particles: Vec<Particle>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Particle {
    pub name: String,
    pub width: Float,
    pub height: Float,
    pub position: [Float; 2],
    pub layer: Option<Layer>,
}

impl Default for Particle {
    fn default() -> Self {
        Particle {
            name: String::new(),
            width: 1000.0,
            height: 1000.0,
            position: [0.0, 0.0],
            layer: None,
        }
    }
}

/// Which generator a placement entry instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DieKind {
    WidthPitch,
    MeanderArray,
    Spiral,
    Particles,
}

/// One die on the chip.
#[derive(Debug, Clone, Deserialize)]
pub struct Placement {
    pub kind: DieKind,
    pub die_number: usize,
    pub position: [Float; 2],
    /// Overrides the configured waveguide width for this die.
    #[serde(default)]
    pub width: Option<Float>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Output {
    pub gds_path: Option<std::path::PathBuf>,
    pub report_path: Option<std::path::PathBuf>,
}

/// Reads a configuration from a JSON or YAML file, by extension.
///
/// # Arguments
/// * `filename` - Path to the configuration document
///
/// # Returns
/// * `Ok(Config)` - Successfully parsed configuration
/// * `Err(PicmaskError)` - File I/O error, parse error, or unsupported
///   format
pub fn read(filename: &Path) -> Result<Config, PicmaskError> {
    let file = fs::File::open(filename)?;
    let rdr = io::BufReader::new(file);

    let ext = filename
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let config = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_reader(rdr)?,
        "json" => serde_json::from_reader(rdr)?,
        other => {
            return Err(ConfigError::FileType(other.to_string()).into());
        }
    };

    Ok(config)
}
