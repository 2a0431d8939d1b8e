//! Per-scene multi-band extraction.
//!
//! No band math and no time aggregation: each retained scene becomes one
//! multi-band GeoTIFF, with all bands harmonized to the coarsest requested
//! resolution and described by the trailing segment of their asset URL.

use crate::config::ExtractConfig;
use crate::engine::select_scenes;
use crate::zip::zip_files;
use anyhow::{Context, Result};
use futures::StreamExt;
use ndarray::{Array3, s};
use std::path::PathBuf;
use vcube_core::stac::CatalogClient;
use vcube_core::{EngineError, GeoBBox, JobSink, Scene};
use vcube_raster::{probe_pixel_size, read_window_harmonized, write_geotiff};

/// The band description derived from an asset URL: the last path segment up
/// to its first dot, query string stripped (signed URLs carry one).
pub(crate) fn band_description(url: &str) -> String {
	let tail = url.rsplit('/').next().unwrap_or(url);
	let tail = tail.split('?').next().unwrap_or(tail);
	tail.split('.').next().unwrap_or(tail).to_string()
}

/// Reads all requested bands of one scene onto the coarsest band's grid and
/// writes the stacked GeoTIFF. Returns `None` when the AOI leaves the scene.
pub(crate) fn extract_scene(
	urls: &[String],
	bbox: &GeoBBox,
	output: &std::path::Path,
) -> Result<Option<PathBuf>> {
	// probe every band first and harmonize to the largest pixel area
	let mut target = (0.0f64, 0.0f64);
	for url in urls {
		let resolution = probe_pixel_size(url)?;
		if resolution.0 * resolution.1 > target.0 * target.1 {
			target = resolution;
		}
	}

	let mut layers = Vec::with_capacity(urls.len());
	let mut descriptions = Vec::with_capacity(urls.len());
	let mut projection = String::new();
	let mut transform = [0.0; 6];
	for url in urls {
		let Some(read) = read_window_harmonized(url, bbox, target)? else {
			return Ok(None);
		};
		projection = read.projection;
		transform = read.transform;
		descriptions.push(band_description(url));
		layers.push(read.data);
	}

	// window rounding may leave a one-pixel size difference between bands
	let height = layers.iter().map(|layer| layer.dim().1).min().unwrap_or(0);
	let width = layers.iter().map(|layer| layer.dim().2).min().unwrap_or(0);
	let mut stacked = Array3::zeros((layers.len(), height, width));
	for (index, layer) in layers.iter().enumerate() {
		stacked
			.slice_mut(s![index, .., ..])
			.assign(&layer.slice(s![0, ..height, ..width]));
	}

	write_geotiff(output, &stacked, &projection, &transform, &descriptions)?;
	Ok(Some(output.to_path_buf()))
}

/// The extraction pipeline: one multi-band GeoTIFF per retained scene.
pub async fn extract(cfg: &ExtractConfig, sink: &JobSink) -> Result<()> {
	let plan = cfg.validated()?;
	std::fs::create_dir_all(&cfg.output_dir)
		.with_context(|| format!("cannot create output directory {:?}", cfg.output_dir))?;

	sink.line("Extracting bands...");
	let catalog = CatalogClient::new();
	let selected = select_scenes(
		&catalog,
		sink,
		plan.sensor,
		&cfg.bbox,
		cfg.start_date,
		cfg.end_date,
		cfg.cloud_cover,
		cfg.smart_filter,
	)
	.await?;

	let mut jobs: Vec<(Scene, Vec<String>)> = Vec::with_capacity(selected.len());
	for scene in selected {
		let mut urls = Vec::with_capacity(cfg.bands_list.len());
		for band in &cfg.bands_list {
			urls.push(catalog.resolve_href(plan.sensor, scene.asset_href(band)?).await?);
		}
		jobs.push((scene, urls));
	}

	let total = jobs.len();
	let mut stream = futures::stream::iter(jobs.into_iter().map(|(scene, urls)| {
		let bbox = cfg.bbox;
		let output = cfg.output_dir.join(format!("{}_bands_export.tif", scene.id));
		async move {
			let outcome = tokio::task::spawn_blocking(move || extract_scene(&urls, &bbox, &output)).await;
			(scene, outcome)
		}
	}))
	.buffer_unordered(plan.workers);

	let mut outputs: Vec<PathBuf> = Vec::new();
	while let Some((scene, outcome)) = stream.next().await {
		match outcome {
			Ok(Ok(Some(path))) => {
				sink.line(format!("Extracted scene {} ({}/{total})", scene.id, outputs.len() + 1));
				outputs.push(path);
			}
			Ok(Ok(None)) => log::debug!("scene '{}' window is out of bounds", scene.id),
			Ok(Err(err)) => sink.warn(format!("skipping scene '{}': {err}", scene.id)),
			Err(join_error) => sink.warn(format!("scene '{}' worker failed: {join_error}", scene.id)),
		}
	}

	if outputs.is_empty() {
		return Err(EngineError::no_results(
			"every selected scene failed or fell outside its raster".to_string(),
		));
	}

	if cfg.zip_output {
		sink.line("Zipping extracted TIFF files...");
		zip_files(&outputs, &cfg.output_dir.join("tiff_files.zip"))?;
	}

	sink.line(format!(
		"Raw band extraction completed. Results saved in {}",
		cfg.output_dir.display()
	));
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use vcube_raster::read_geotiff;

	#[test]
	fn band_descriptions_strip_path_extension_and_query() {
		assert_eq!(band_description("https://cogs.test/scene/B04.tif"), "B04");
		assert_eq!(
			band_description("https://landsat.test/LC09_L2SP_142040_SR_B5.TIF?st=2024&sig=abc"),
			"LC09_L2SP_142040_SR_B5"
		);
		assert_eq!(band_description("plain"), "plain");
	}

	fn wgs84_wkt() -> String {
		use gdal::spatial_ref::SpatialRef;
		SpatialRef::from_epsg(4326).unwrap().to_wkt().unwrap()
	}

	fn cog(dir: &std::path::Path, name: &str, size: usize, base: f64) -> String {
		let path = dir.join(name);
		let data = Array3::from_elem((1, size, size), base);
		let pixel = 1.0 / size as f64;
		let gt = [10.0, pixel, 0.0, 50.0, 0.0, -pixel];
		write_geotiff(&path, &data, &wgs84_wkt(), &gt, &[]).unwrap();
		path.to_string_lossy().to_string()
	}

	#[test]
	fn harmonizes_mixed_resolutions_to_the_coarsest() {
		let dir = tempfile::tempdir().unwrap();
		// 100-px fine band and 50-px coarse band over the same square degree
		let fine = cog(dir.path(), "B04.tif", 100, 4.0);
		let coarse = cog(dir.path(), "B11.tif", 50, 11.0);
		let bbox = GeoBBox::new(10.2, 49.2, 10.6, 49.6).unwrap();

		let output = dir.path().join("out_bands_export.tif");
		let written = extract_scene(&[fine, coarse], &bbox, &output).unwrap().unwrap();

		let (data, _, gt) = read_geotiff(&written).unwrap();
		assert_eq!(data.dim().0, 2);
		// both bands share the coarse 1/50-degree grid
		assert!((gt[1] - 0.02).abs() < 1e-9);
		assert_eq!(data.dim().1, data.dim().2);
		assert_eq!(data[[0, 0, 0]], 4.0);
		assert_eq!(data[[1, 0, 0]], 11.0);

		// band descriptions are the trailing url segments
		use gdal::{Dataset, Metadata};
		let dataset = Dataset::open(&written).unwrap();
		assert_eq!(dataset.rasterband(1).unwrap().description().unwrap(), "B04");
		assert_eq!(dataset.rasterband(2).unwrap().description().unwrap(), "B11");
	}

	#[test]
	fn scene_outside_the_aoi_is_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let band = cog(dir.path(), "B04.tif", 50, 1.0);
		let bbox = GeoBBox::new(40.0, 10.0, 41.0, 11.0).unwrap();
		let output = dir.path().join("out.tif");
		assert!(extract_scene(&[band], &bbox, &output).unwrap().is_none());
		assert!(!output.exists());
	}
}
