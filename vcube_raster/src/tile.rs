//! Native XYZ tile reads in Web-Mercator.
//!
//! The tile variant of the windowed read: instead of clipping a pixel
//! window in the COG's own grid, the source is warped into a square
//! Web-Mercator target covering exactly one XYZ tile.

use crate::reader::{open_cog, spatial_ref_epsg};
use anyhow::{Context, Result};
use gdal::DriverManager;
use ndarray::{Array2, Array3, s};
use vcube_core::{EngineError, TileCoord};

/// The edge length of a served tile in pixels.
pub const TILE_SIZE: usize = 256;

/// Reads one XYZ tile of a COG as a `(bands, 256, 256)` float cube.
pub fn read_tile(url: &str, coord: &TileCoord) -> Result<Array3<f64>> {
	let source = open_cog(url)?;
	let band_count = source.raster_count();

	let [min_x, min_y, max_x, max_y] = coord.to_mercator_bbox();
	let pixel = (max_x - min_x) / TILE_SIZE as f64;

	let driver = DriverManager::get_driver_by_name("MEM").context("GDAL MEM driver is unavailable")?;
	let mut target = driver
		.create_with_band_type::<f64, _>("", TILE_SIZE, TILE_SIZE, band_count)
		.map_err(|err| EngineError::reader(format!("cannot allocate tile target: {err}")))?;
	target
		.set_geo_transform(&[min_x, pixel, 0.0, max_y, 0.0, -pixel])
		.context("cannot georeference tile target")?;
	target
		.set_spatial_ref(&spatial_ref_epsg(3857)?)
		.context("cannot set tile target CRS")?;

	gdal::raster::reproject(&source, &target)
		.map_err(|err| EngineError::reader(format!("cannot warp '{url}' into tile {coord:?}: {err}")))?;

	let mut data = Array3::zeros((band_count, TILE_SIZE, TILE_SIZE));
	for index in 0..band_count {
		let band = target
			.rasterband(index + 1)
			.map_err(|err| EngineError::reader(format!("cannot access tile band {}: {err}", index + 1)))?;
		let buffer = band
			.read_as::<f64>((0, 0), (TILE_SIZE, TILE_SIZE), (TILE_SIZE, TILE_SIZE), None)
			.map_err(|err| EngineError::reader(format!("cannot read tile band {}: {err}", index + 1)))?;
		let layer = Array2::from_shape_vec((TILE_SIZE, TILE_SIZE), buffer.data().to_vec())
			.context("tile buffer has the wrong length")?;
		data.slice_mut(s![index, .., ..]).assign(&layer);
	}
	Ok(data)
}
