//! The batch band-math pipeline.
//!
//! Search, filter, read, evaluate, stack, aggregate, render. Per-scene work
//! runs on the blocking pool, bounded by the configured worker count; scene
//! results arrive in completion order and are re-sorted by acquisition time
//! before stacking, so the output only depends on the input set.

use crate::config::{ComputeConfig, ComputePlan};
use crate::zip::zip_files;
use anyhow::{Context, Result};
use futures::StreamExt;
use ndarray::Array3;
use std::path::PathBuf;
use vcube_core::stac::{CatalogClient, SearchArea, SearchQuery};
use vcube_core::{EngineError, Formula, GeoBBox, JobSink, Scene, filter, stack};
use vcube_image::{Colormap, draw_label, to_image, write_gif, write_trend_plot};
use vcube_raster::{WindowRead, read_window, write_geotiff};

/// One successfully processed scene.
pub(crate) struct SceneResult {
	pub scene: Scene,
	pub data: Array3<f64>,
	pub projection: String,
	pub transform: [f64; 6],
}

/// Reads the AOI window of one scene and evaluates the formula.
///
/// Returns `None` when the AOI falls outside the scene's raster; shape
/// mismatches between the two bands (mixed native resolutions) are errors
/// the caller logs and skips.
pub(crate) fn read_and_evaluate(
	band1_url: &str,
	band2_url: Option<&str>,
	bbox: &GeoBBox,
	formula: &Formula,
) -> Result<Option<WindowRead>> {
	let Some(band1) = read_window(band1_url, bbox)? else {
		return Ok(None);
	};

	let evaluated = match band2_url {
		Some(band2_url) => {
			let Some(band2) = read_window(band2_url, bbox)? else {
				return Ok(None);
			};
			let lhs = band1.data.index_axis(ndarray::Axis(0), 0);
			let rhs = band2.data.index_axis(ndarray::Axis(0), 0);
			let result = formula.apply(&lhs.to_owned(), Some(&rhs.to_owned()))?;
			result.insert_axis(ndarray::Axis(0))
		}
		None => {
			// multi-band assets (RGB composites) pass through untouched
			if band1.data.dim().0 > 1 {
				band1.data.clone()
			} else {
				let lhs = band1.data.index_axis(ndarray::Axis(0), 0);
				formula.apply(&lhs.to_owned(), None)?.insert_axis(ndarray::Axis(0))
			}
		}
	};

	Ok(Some(WindowRead {
		data: evaluated,
		projection: band1.projection,
		transform: band1.transform,
	}))
}

/// Runs the scene-selection chain shared by compute and extract.
pub(crate) async fn select_scenes(
	catalog: &CatalogClient,
	sink: &JobSink,
	sensor: vcube_core::Sensor,
	bbox: &GeoBBox,
	start_date: chrono::NaiveDate,
	end_date: chrono::NaiveDate,
	cloud_cover: f64,
	smart_filter: bool,
) -> Result<Vec<Scene>> {
	let query = SearchQuery {
		sensor,
		start_date,
		end_date,
		cloud_cover,
		area: SearchArea::Bbox(*bbox),
	};
	let scenes = catalog.search(&query).await?;
	sink.line(format!("Total scenes found: {}", scenes.len()));
	if scenes.is_empty() {
		return Err(EngineError::no_results(format!(
			"the catalog returned no {sensor} scenes for {bbox:?} between {start_date} and {end_date}"
		)));
	}

	let contained = filter::retain_containing(scenes, bbox);
	sink.line(format!("Scenes covering the full area: {}", contained.len()));
	if contained.is_empty() {
		// strict containment drops areas straddling a grid boundary
		sink.warn("no scene footprint fully contains the requested area; areas near grid boundaries are affected");
		return Err(EngineError::no_results(
			"no scene fully contains the requested area".to_string(),
		));
	}

	let deduped = sensor.dedup_overlapping(contained);
	sink.line(format!("Scenes after removing overlaps: {}", deduped.len()));

	let selected = if smart_filter {
		let selected = filter::smart_filter(deduped, start_date, end_date);
		sink.line(format!("Scenes after applying smart filter: {}", selected.len()));
		selected
	} else {
		deduped
	};
	Ok(selected)
}

/// The batch pipeline: writes all artifacts into `cfg.output_dir`.
pub async fn compute(cfg: &ComputeConfig, sink: &JobSink) -> Result<()> {
	let plan = cfg.validated()?;
	std::fs::create_dir_all(&cfg.output_dir)
		.with_context(|| format!("cannot create output directory {:?}", cfg.output_dir))?;

	sink.line("Engine starting...");
	let catalog = CatalogClient::new();
	sink.line("Searching the catalog...");
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

	// resolve (and for Landsat: sign) the asset URLs up front
	let mut jobs = Vec::with_capacity(selected.len());
	for scene in selected {
		let band1_url = catalog.resolve_href(plan.sensor, scene.asset_href(&cfg.band1)?).await?;
		let band2_url = match &cfg.band2 {
			Some(band2) => Some(catalog.resolve_href(plan.sensor, scene.asset_href(band2)?).await?),
			None => None,
		};
		jobs.push((scene, band1_url, band2_url));
	}

	sink.line("Computing band calculation...");
	let mut results = run_scene_jobs(jobs, &cfg.bbox, &plan, sink).await;
	if results.is_empty() {
		return Err(EngineError::no_results(
			"every selected scene failed or fell outside its raster".to_string(),
		));
	}
	results.sort_by_key(|result| result.scene.datetime);

	// CRS and transform of the whole job come from the first retained scene
	let projection = results[0].projection.clone();
	let transform = results[0].transform;

	let mut intermediate_tifs: Vec<PathBuf> = Vec::new();
	let mut intermediate_pngs: Vec<PathBuf> = Vec::new();
	if cfg.timeseries {
		for result in &results {
			let (tif, png) = write_intermediate(result, &cfg.output_dir, &plan.colormap)?;
			intermediate_tifs.push(tif);
			intermediate_pngs.push(png);
		}
	}

	if let Some(operation) = plan.operation {
		sink.line("Aggregating results...");
		let arrays: Vec<Array3<f64>> = results.iter().map(|result| result.data.clone()).collect();
		let stacked = stack::stack_time(&arrays)?;
		let aggregate = stack::reduce_time(&stacked, operation);

		let tif_path = cfg.output_dir.join(format!("custom_band_{operation}_aggregate.tif"));
		sink.line("Saving aggregated result with colormap...");
		write_geotiff(&tif_path, &aggregate, &projection, &transform, &[])?;

		let png_path = cfg
			.output_dir
			.join(format!("custom_band_{operation}_aggregate_colormap.png"));
		to_image(&aggregate, &plan.colormap)?
			.save(&png_path)
			.map_err(|err| EngineError::render(format!("cannot write {png_path:?}: {err}")))?;

		let values: Vec<f64> = results
			.iter()
			.map(|result| stack::reduce_all(&result.data, operation))
			.collect();
		let dates: Vec<chrono::NaiveDate> = results.iter().map(|result| result.scene.date()).collect();
		let trend = stack::linear_trend(&values);
		write_trend_plot(
			&dates,
			&values,
			trend,
			operation.as_str(),
			&cfg.output_dir.join("values_over_time.png"),
		)?;
	}

	if cfg.timeseries {
		if intermediate_pngs.is_empty() {
			sink.line("No images found for the given parameters");
		} else {
			sink.line("Creating GIF and zipping TIFF files...");
			write_gif(&intermediate_pngs, &cfg.output_dir.join("output.gif"), 1)?;
			zip_files(&intermediate_tifs, &cfg.output_dir.join("tiff_files.zip"))?;
		}
	}

	sink.line(format!(
		"Processing completed. Results saved in {}",
		cfg.output_dir.display()
	));
	Ok(())
}

/// Fans the per-scene jobs out to the blocking pool and collects the
/// successes in completion order. Failed scenes are logged and dropped;
/// they never abort the job.
async fn run_scene_jobs(
	jobs: Vec<(Scene, String, Option<String>)>,
	bbox: &GeoBBox,
	plan: &ComputePlan,
	sink: &JobSink,
) -> Vec<SceneResult> {
	let total = jobs.len();
	let mut stream = futures::stream::iter(jobs.into_iter().map(|(scene, band1_url, band2_url)| {
		let formula = plan.formula.clone();
		let bbox = *bbox;
		async move {
			let outcome = tokio::task::spawn_blocking(move || {
				read_and_evaluate(&band1_url, band2_url.as_deref(), &bbox, &formula)
			})
			.await;
			(scene, outcome)
		}
	}))
	.buffer_unordered(plan.workers);

	let mut results = Vec::with_capacity(total);
	let mut outside = 0usize;
	while let Some((scene, outcome)) = stream.next().await {
		match outcome {
			Ok(Ok(Some(read))) => {
				sink.line(format!("Processed scene {} ({}/{total})", scene.id, results.len() + 1));
				results.push(SceneResult {
					scene,
					data: read.data,
					projection: read.projection,
					transform: read.transform,
				});
			}
			Ok(Ok(None)) => {
				outside += 1;
				log::debug!("scene '{}' window is out of bounds", scene.id);
			}
			Ok(Err(err)) => sink.warn(format!("skipping scene '{}': {err}", scene.id)),
			Err(join_error) => sink.warn(format!("scene '{}' worker failed: {join_error}", scene.id)),
		}
	}
	if outside > 0 {
		sink.line(format!("Skipped {outside} scenes with out-of-bounds windows"));
	}
	results
}

/// Writes the per-scene GeoTIFF and its labeled PNG companion.
fn write_intermediate(result: &SceneResult, output_dir: &std::path::Path, colormap: &Colormap) -> Result<(PathBuf, PathBuf)> {
	let tif_path = output_dir.join(format!("{}_result.tif", result.scene.id));
	write_geotiff(&tif_path, &result.data, &result.projection, &result.transform, &[])?;

	let mut img = to_image(&result.data, colormap)?;
	draw_label(&mut img, &result.scene.id);
	let png_path = output_dir.join(format!("{}_result.png", result.scene.id));
	img
		.save(&png_path)
		.map_err(|err| EngineError::render(format!("cannot write {png_path:?}: {err}")))?;

	Ok((tif_path, png_path))
}

#[cfg(test)]
mod tests {
	use super::*;
	use vcube_core::Formula;
	use vcube_raster::NODATA;

	fn wgs84_wkt() -> String {
		use gdal::spatial_ref::SpatialRef;
		SpatialRef::from_epsg(4326).unwrap().to_wkt().unwrap()
	}

	/// Writes a one-band raster over lon 10..11, lat 49..50 whose value is
	/// `base` everywhere.
	fn flat_cog(dir: &std::path::Path, name: &str, base: f64) -> String {
		let path = dir.join(name);
		let data = Array3::from_elem((1, 50, 50), base);
		let gt = [10.0, 0.02, 0.0, 50.0, 0.0, -0.02];
		write_geotiff(&path, &data, &wgs84_wkt(), &gt, &[]).unwrap();
		path.to_string_lossy().to_string()
	}

	#[test]
	fn evaluates_ndvi_between_two_rasters() {
		let dir = tempfile::tempdir().unwrap();
		let red = flat_cog(dir.path(), "red.tif", 1.0);
		let nir = flat_cog(dir.path(), "nir.tif", 3.0);
		let bbox = GeoBBox::new(10.2, 49.2, 10.6, 49.6).unwrap();
		let formula = Formula::parse("(band2 - band1) / (band2 + band1)").unwrap();

		let read = read_and_evaluate(&red, Some(&nir), &bbox, &formula).unwrap().unwrap();
		assert_eq!(read.data.dim().0, 1);
		assert!((read.data[[0, 0, 0]] - 0.5).abs() < 1e-12);
	}

	#[test]
	fn identity_formula_returns_the_raw_band() {
		let dir = tempfile::tempdir().unwrap();
		let red = flat_cog(dir.path(), "red.tif", 42.0);
		let bbox = GeoBBox::new(10.2, 49.2, 10.6, 49.6).unwrap();
		let formula = Formula::parse("band1").unwrap();

		let read = read_and_evaluate(&red, None, &bbox, &formula).unwrap().unwrap();
		assert_eq!(read.data[[0, 0, 0]], 42.0);
	}

	#[test]
	fn out_of_bounds_window_yields_none() {
		let dir = tempfile::tempdir().unwrap();
		let red = flat_cog(dir.path(), "red.tif", 1.0);
		let bbox = GeoBBox::new(20.0, 20.0, 21.0, 21.0).unwrap();
		let formula = Formula::parse("band1").unwrap();

		assert!(read_and_evaluate(&red, None, &bbox, &formula).unwrap().is_none());
	}

	#[test]
	fn nodata_squares_with_the_disk_format() {
		// the engine keeps NaN in memory and writes -9999 on disk
		assert_eq!(NODATA, -9999.0);
	}
}
