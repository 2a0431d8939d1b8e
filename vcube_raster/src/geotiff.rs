//! GeoTIFF emission and re-reading.

use anyhow::{Context, Result};
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{Array2, Array3, s};
use std::path::Path;
use vcube_core::EngineError;

/// The on-disk nodata value of every emitted GeoTIFF. In-memory pipelines
/// use NaN; the swap happens only at the file boundary.
pub const NODATA: f64 = -9999.0;

/// Writes a `(bands, height, width)` cube as a multi-band GeoTIFF.
///
/// NaN cells are re-encoded as [`NODATA`] and the nodata tag is set on every
/// band. `band_descriptions` may be shorter than the band count; missing
/// entries stay unset.
pub fn write_geotiff(
	path: &Path,
	data: &Array3<f64>,
	projection: &str,
	transform: &[f64; 6],
	band_descriptions: &[String],
) -> Result<()> {
	let (band_count, height, width) = data.dim();
	if band_count == 0 || height == 0 || width == 0 {
		return Err(EngineError::render(format!("refusing to write empty raster {path:?}")));
	}

	let driver = DriverManager::get_driver_by_name("GTiff").context("GDAL GTiff driver is unavailable")?;
	let mut dataset = driver
		.create_with_band_type::<f64, _>(path, width, height, band_count)
		.map_err(|err| EngineError::render(format!("cannot create {path:?}: {err}")))?;

	dataset
		.set_geo_transform(transform)
		.map_err(|err| EngineError::render(format!("cannot georeference {path:?}: {err}")))?;
	dataset
		.set_projection(projection)
		.map_err(|err| EngineError::render(format!("cannot set projection of {path:?}: {err}")))?;

	for index in 0..band_count {
		let mut band = dataset
			.rasterband(index + 1)
			.map_err(|err| EngineError::render(format!("cannot access band {}: {err}", index + 1)))?;
		band
			.set_no_data_value(Some(NODATA))
			.map_err(|err| EngineError::render(format!("cannot set nodata: {err}")))?;
		if let Some(description) = band_descriptions.get(index) {
			band
				.set_description(description)
				.map_err(|err| EngineError::render(format!("cannot describe band {}: {err}", index + 1)))?;
		}

		let values: Vec<f64> = data
			.slice(s![index, .., ..])
			.iter()
			.map(|&v| if v.is_finite() { v } else { NODATA })
			.collect();
		let mut buffer = Buffer::new((width, height), values);
		band
			.write((0, 0), (width, height), &mut buffer)
			.map_err(|err| EngineError::render(format!("cannot write band {} of {path:?}: {err}", index + 1)))?;
	}
	Ok(())
}

/// Reads a GeoTIFF back as a cube plus its georeferencing. Nodata cells
/// come back as NaN.
pub fn read_geotiff(path: &Path) -> Result<(Array3<f64>, String, [f64; 6])> {
	let dataset = Dataset::open(path).with_context(|| format!("cannot open {path:?}"))?;
	let gt = dataset.geo_transform().context("dataset has no geotransform")?;
	let (width, height) = dataset.raster_size();
	let band_count = dataset.raster_count();

	let mut data = Array3::zeros((band_count, height, width));
	for index in 0..band_count {
		let band = dataset.rasterband(index + 1)?;
		let nodata = band.no_data_value();
		let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;
		let layer = Array2::from_shape_vec((height, width), buffer.data().to_vec())?;
		let layer = match nodata {
			Some(nodata) => layer.mapv(|v| if v == nodata { f64::NAN } else { v }),
			None => layer,
		};
		data.slice_mut(s![index, .., ..]).assign(&layer);
	}
	Ok((data, dataset.projection(), gt))
}
