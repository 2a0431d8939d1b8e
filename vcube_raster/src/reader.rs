//! Windowed reads from Cloud-Optimized GeoTIFFs.
//!
//! COGs are opened through GDAL's `/vsicurl/` handler, so only the header,
//! the overviews and the requested tiles travel over the wire. The AOI
//! arrives in WGS84, is transformed into the COG's CRS and clipped to a
//! pixel window; the window's pixels are returned as float64 together with
//! the scene's projection and the window's geotransform.

use crate::transform;
use crate::window::PixelWindow;
use anyhow::{Context, Result};
use gdal::Dataset;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use ndarray::{Array2, Array3, s};
use std::path::Path;
use vcube_core::{EngineError, GeoBBox};

/// One windowed read: a `(bands, height, width)` cube plus the
/// georeferencing needed to write it back out.
#[derive(Clone, Debug)]
pub struct WindowRead {
	pub data: Array3<f64>,
	pub projection: String,
	pub transform: [f64; 6],
}

pub(crate) fn vsi_path(url: &str) -> String {
	if url.starts_with("http://") || url.starts_with("https://") {
		format!("/vsicurl/{url}")
	} else {
		url.to_string()
	}
}

pub(crate) fn open_cog(url: &str) -> Result<Dataset> {
	Dataset::open(Path::new(&vsi_path(url)))
		.map_err(|err| EngineError::reader(format!("cannot open COG '{url}': {err}")))
}

pub(crate) fn spatial_ref_epsg(epsg: u32) -> Result<SpatialRef> {
	let mut srs = SpatialRef::from_epsg(epsg).with_context(|| format!("no spatial reference for EPSG:{epsg}"))?;
	srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
	Ok(srs)
}

/// Transforms the AOI corners from WGS84 into the dataset's CRS, always-xy.
fn bbox_in_dataset_crs(dataset: &Dataset, bbox: &GeoBBox) -> Result<(f64, f64, f64, f64)> {
	let source = spatial_ref_epsg(4326)?;
	let mut target = dataset
		.spatial_ref()
		.map_err(|err| EngineError::reader(format!("COG has no spatial reference: {err}")))?;
	target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

	let coord_transform = CoordTransform::new(&source, &target)
		.map_err(|err| EngineError::reader(format!("cannot build coordinate transform: {err}")))?;

	let mut xs = [bbox.west, bbox.east];
	let mut ys = [bbox.south, bbox.north];
	let mut zs = [0.0, 0.0];
	coord_transform
		.transform_coords(&mut xs, &mut ys, &mut zs)
		.map_err(|err| EngineError::reader(format!("cannot transform AOI corners: {err}")))?;

	Ok((xs[0], ys[0], xs[1], ys[1]))
}

fn read_bands(
	dataset: &Dataset,
	window: &PixelWindow,
	out_width: usize,
	out_height: usize,
	resampling: Option<gdal::raster::ResampleAlg>,
	band_count: usize,
) -> Result<Array3<f64>> {
	let mut data = Array3::zeros((band_count, out_height, out_width));
	for index in 0..band_count {
		let band = dataset
			.rasterband(index + 1)
			.map_err(|err| EngineError::reader(format!("cannot access band {}: {err}", index + 1)))?;
		let buffer = band
			.read_as::<f64>(
				(window.col_off as isize, window.row_off as isize),
				(window.width as usize, window.height as usize),
				(out_width, out_height),
				resampling,
			)
			.map_err(|err| EngineError::reader(format!("cannot read band {}: {err}", index + 1)))?;
		let layer = Array2::from_shape_vec((out_height, out_width), buffer.data().to_vec())
			.context("band buffer has the wrong length")?;
		data.slice_mut(s![index, .., ..]).assign(&layer);
	}
	Ok(data)
}

/// Reads the AOI window of all bands of a COG.
///
/// Returns `None` when the window falls outside the raster (the scene is
/// silently skipped); any open or read failure is a reader error the caller
/// may log and drop without aborting a multi-scene job.
pub fn read_window(url: &str, bbox: &GeoBBox) -> Result<Option<WindowRead>> {
	let dataset = open_cog(url)?;
	let gt = dataset
		.geo_transform()
		.map_err(|err| EngineError::reader(format!("COG '{url}' has no geotransform: {err}")))?;

	let (min_x, min_y, max_x, max_y) = bbox_in_dataset_crs(&dataset, bbox)?;
	let window = PixelWindow::from_bounds(min_x, min_y, max_x, max_y, &gt);
	if window.is_out_of_bounds() {
		log::debug!("window of {bbox:?} is outside '{url}', skipping scene");
		return Ok(None);
	}
	let (raster_width, raster_height) = dataset.raster_size();
	let window = window.clamped_to(raster_width, raster_height);
	if window.width <= 0 || window.height <= 0 {
		return Ok(None);
	}

	let data = read_bands(
		&dataset,
		&window,
		window.width as usize,
		window.height as usize,
		None,
		dataset.raster_count(),
	)?;

	Ok(Some(WindowRead {
		data,
		projection: dataset.projection(),
		transform: transform::window_transform(&gt, window.col_off, window.row_off),
	}))
}

/// The native pixel size `(x, y)` of a COG, in CRS units.
pub fn probe_pixel_size(url: &str) -> Result<(f64, f64)> {
	let dataset = open_cog(url)?;
	let gt = dataset
		.geo_transform()
		.map_err(|err| EngineError::reader(format!("COG '{url}' has no geotransform: {err}")))?;
	Ok((gt[1].abs(), gt[5].abs()))
}

/// Reads band 1 of the AOI window, downsampled onto the `target` pixel-size
/// grid when the band is finer.
///
/// Multi-band extraction harmonizes all bands to the coarsest requested
/// resolution: finer bands are average-resampled, never the other way
/// around, so the result keeps the alignment of the coarse grid.
pub fn read_window_harmonized(url: &str, bbox: &GeoBBox, target: (f64, f64)) -> Result<Option<WindowRead>> {
	let dataset = open_cog(url)?;
	let gt = dataset
		.geo_transform()
		.map_err(|err| EngineError::reader(format!("COG '{url}' has no geotransform: {err}")))?;

	let (min_x, min_y, max_x, max_y) = bbox_in_dataset_crs(&dataset, bbox)?;
	let window = PixelWindow::from_bounds(min_x, min_y, max_x, max_y, &gt);
	if window.is_out_of_bounds() {
		return Ok(None);
	}
	let (raster_width, raster_height) = dataset.raster_size();
	let window = window.clamped_to(raster_width, raster_height);
	if window.width <= 0 || window.height <= 0 {
		return Ok(None);
	}

	let native = (gt[1].abs(), gt[5].abs());
	let window_gt = transform::window_transform(&gt, window.col_off, window.row_off);

	let (out_width, out_height, out_gt, resampling) = if native == target {
		(window.width as usize, window.height as usize, window_gt, None)
	} else {
		// shrink the pixel count by native/target and grow the pixels to
		// the target size, keeping the window origin
		let scale_x = native.0 / target.0;
		let scale_y = native.1 / target.1;
		(
			((window.width as f64 * scale_x) as usize).max(1),
			((window.height as f64 * scale_y) as usize).max(1),
			transform::scaled_transform(&window_gt, 1.0 / scale_x, 1.0 / scale_y),
			Some(gdal::raster::ResampleAlg::Average),
		)
	};

	let data = read_bands(&dataset, &window, out_width, out_height, resampling, 1)?;

	Ok(Some(WindowRead {
		data,
		projection: dataset.projection(),
		transform: out_gt,
	}))
}
