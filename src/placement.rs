//! Chip assembly: die factories, placement, GDS writing.
//!
//! Placement entries name a generator kind, a die number, and a chip
//! position. Each generator sits behind the [`DieFactory`] interface and
//! returns an independently named cell tree; the shared [`Namer`] keeps
//! repeated instantiations of the same generator collision-free.

use chrono::Local;
use std::fs::metadata;
use std::path::Path;

use crate::cell::{self, Cell, Namer};
use crate::config::{Config, DieKind};
use crate::device::{self, DeviceMetrics};
use crate::die;
use crate::grid;
use crate::path::Point;
use crate::{infoln, query, vprintln, warnln};
use crate::{Float, PicmaskError, QueryDefault};

/// One die generator: builds a content cell plus its native die name.
pub trait DieFactory {
    fn build(
        &self,
        config: &Config,
        width: Option<Float>,
        namer: &mut Namer,
    ) -> Result<(Cell, String, Vec<DeviceMetrics>), PicmaskError>;

    /// Whether the content gets the die-box framing.
    fn framed(&self) -> bool {
        true
    }
}

struct MeanderArrayFactory;
struct WidthPitchFactory;
struct SpiralFactory;
struct ParticlesFactory;

impl DieFactory for MeanderArrayFactory {
    fn build(
        &self,
        config: &Config,
        width: Option<Float>,
        namer: &mut Namer,
    ) -> Result<(Cell, String, Vec<DeviceMetrics>), PicmaskError> {
        let width = width.unwrap_or(config.geometry.width);
        let (cell, metrics) = device::meander_sweep(config, width, namer)?;
        let name = format!("w{}", (width * 1000.0).round() as i64);
        Ok((cell, name, metrics))
    }
}

impl DieFactory for WidthPitchFactory {
    fn build(
        &self,
        config: &Config,
        _width: Option<Float>,
        namer: &mut Namer,
    ) -> Result<(Cell, String, Vec<DeviceMetrics>), PicmaskError> {
        // The cascade sweeps widths internally; a per-die width override
        // has no meaning here
        let (cell, name) = device::width_pitch_cascades(config, namer)?;
        Ok((cell, name, Vec::new()))
    }
}

impl DieFactory for SpiralFactory {
    fn build(
        &self,
        config: &Config,
        width: Option<Float>,
        namer: &mut Namer,
    ) -> Result<(Cell, String, Vec<DeviceMetrics>), PicmaskError> {
        let (cell, metrics) = device::spiral_device(config, width, namer)?;
        let name = metrics.device.clone();
        Ok((cell, name, vec![metrics]))
    }
}

impl DieFactory for ParticlesFactory {
    fn build(
        &self,
        config: &Config,
        _width: Option<Float>,
        namer: &mut Namer,
    ) -> Result<(Cell, String, Vec<DeviceMetrics>), PicmaskError> {
        let cell = grid::particles(&config.particles, &config.layers, namer);
        Ok((cell, String::from("Particles"), Vec::new()))
    }

    fn framed(&self) -> bool {
        false
    }
}

/// Resolves the factory for a placement kind.
pub fn factory_for(kind: DieKind) -> &'static dyn DieFactory {
    match kind {
        DieKind::MeanderArray => &MeanderArrayFactory,
        DieKind::WidthPitch => &WidthPitchFactory,
        DieKind::Spiral => &SpiralFactory,
        DieKind::Particles => &ParticlesFactory,
    }
}

/// Builds the whole chip: grid plus every placed die.
///
/// Returns the top cell and the solve metrics of every device, with
/// each record tagged by its die.
pub fn assemble_chip(
    config: &Config,
    verbose: bool,
) -> Result<(Cell, Vec<DeviceMetrics>), PicmaskError> {
    let mut namer = Namer::new();

    let grid = grid::chip_grid(config, &mut namer);
    let mut dies = Cell::new("Dies");
    let mut all_metrics: Vec<DeviceMetrics> = Vec::new();

    if config.placements.is_empty() {
        warnln!("No placements configured; the chip carries only the grid");
    }

    for placement in &config.placements {
        let factory = factory_for(placement.kind);
        let (content, native_name, mut metrics) =
            factory.build(config, placement.width, &mut namer)?;

        let number = placement.die_number;
        let framed = if factory.framed() {
            die::frame_die(
                content,
                &die::die_label(&native_name, Some(number)),
                &format!("Die{number}"),
                config,
                &mut namer,
            )?
        } else {
            content
        };

        for m in &mut metrics {
            m.die = format!("Die {number}");
        }
        all_metrics.extend(metrics);

        let [x, y] = placement.position;
        dies.place(framed, Point::new(x, y));
        vprintln!(verbose, "Placed Die {} ({}) at ({}, {})", number, native_name, x, y);
    }

    let mut top = Cell::new("Placed_Chip");
    top.place(grid, Point::new(0.0, 0.0));
    top.place(dies, Point::new(0.0, 0.0));

    Ok((top, all_metrics))
}

/// Default output name, date-stamped like the fab runs it accompanies.
pub fn default_gds_name() -> String {
    Local::now().format("%d_%m_%Y.gds").to_string()
}

/// Writes the chip to a GDS file, confirming before overwriting.
pub fn write_gds(top: Cell, filename: &Path, verbose: bool) -> Result<(), PicmaskError> {
    if metadata(filename).is_ok() {
        let allow = query(
            format!("'{}' already exists. Overwrite?", filename.display()).as_str(),
            QueryDefault::Yes,
        )?;

        if !allow {
            infoln!("Aborting...");
            return Ok(());
        }
    }

    let library = cell::to_library("picmask", top)?;
    library.save(filename)?;

    vprintln!(verbose, "Wrote layout to {}", filename.display());
    Ok(())
}
