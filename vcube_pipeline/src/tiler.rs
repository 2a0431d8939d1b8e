//! The XYZ tile pipeline.
//!
//! The batch pipeline specialized to a single Web-Mercator tile: search with
//! an `intersects` polygon, filter, native tile reads, per-scene band math,
//! optional time aggregation, colormap. Rendered tiles are memoized by the
//! full request fingerprint with a per-entry TTL, so map clients hammering
//! the same tile do not repeat any catalog or COG I/O.

use crate::config::{TilePlan, TileRequest};
use anyhow::Result;
use moka::future::Cache;
use ndarray::{Array3, Axis};
use std::sync::Arc;
use std::time::Duration;
use vcube_core::stac::{CatalogClient, SearchArea, SearchQuery};
use vcube_core::{EngineError, Scene, TileCoord, filter, stack};
use vcube_image::{colorize, compose_rgb, png_bytes};
use vcube_raster::read_tile;

/// The memoized outcome of one tile request.
#[derive(Clone)]
struct CachedTile {
	png: Arc<Vec<u8>>,
	scene: Scene,
}

/// Generates and caches XYZ tiles.
pub struct TileProcessor {
	catalog: CatalogClient,
	cache: Cache<String, CachedTile>,
	deadline: Duration,
}

/// Default per-entry lifetime of a rendered tile.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
/// Default wall-clock deadline of one tile request.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(120);

// entries expire by TTL; the capacity cap only bounds pathological traffic
const CACHE_CAPACITY: u64 = 4096;

impl TileProcessor {
	pub fn new(cache_ttl: Duration, deadline: Duration) -> TileProcessor {
		TileProcessor {
			catalog: CatalogClient::new(),
			cache: Cache::builder()
				.time_to_live(cache_ttl)
				.max_capacity(CACHE_CAPACITY)
				.build(),
			deadline,
		}
	}

	/// Serves one tile: validated, memoized, deadline-bounded.
	///
	/// Returns the PNG bytes and the representative scene descriptor.
	pub async fn generate_tile(&self, request: &TileRequest) -> Result<(Vec<u8>, Scene)> {
		let plan = request.validated()?;
		let key = request.cache_key(&plan);

		if let Some(hit) = self.cache.get(&key).await {
			log::debug!("tile cache hit for {key}");
			return Ok((hit.png.as_ref().clone(), hit.scene));
		}

		let rendered = tokio::time::timeout(self.deadline, self.render_tile(request, &plan))
			.await
			.map_err(|_| anyhow::Error::from(EngineError::Timeout(self.deadline.as_secs())))??;

		self
			.cache
			.insert(
				key,
				CachedTile {
					png: Arc::new(rendered.0.clone()),
					scene: rendered.1.clone(),
				},
			)
			.await;
		Ok(rendered)
	}

	async fn render_tile(&self, request: &TileRequest, plan: &TilePlan) -> Result<(Vec<u8>, Scene)> {
		let coord = plan.coord;
		let bbox = coord.to_geo_bbox()?;

		let query = SearchQuery {
			sensor: plan.sensor,
			start_date: request.start_date,
			end_date: request.end_date,
			cloud_cover: request.cloud_cover,
			area: SearchArea::Polygon(bbox.as_geojson()),
		};
		let scenes = self.catalog.search(&query).await?;
		if scenes.is_empty() {
			return Err(EngineError::no_results(format!("no scenes found for tile {coord:?}")));
		}

		let contained = filter::retain_containing(scenes, &bbox);
		if contained.is_empty() {
			return Err(EngineError::no_results(format!(
				"no scene fully contains tile {coord:?}"
			)));
		}

		let selected = if request.latest {
			let mut latest = filter::latest_per_grid(contained);
			latest.truncate(1);
			latest
		} else {
			let deduped = plan.sensor.dedup_overlapping(contained);
			filter::smart_filter(deduped, request.start_date, request.end_date)
		};
		if selected.is_empty() {
			return Err(EngineError::no_results(format!(
				"no overlapping image found for tile {coord:?}"
			)));
		}

		// per-scene tile reads for band1 (and band2 when requested)
		let mut tiles: Vec<(Array3<f64>, Option<Array3<f64>>)> = Vec::with_capacity(selected.len());
		for scene in &selected {
			let band1 = self.fetch_tile(plan, scene, &request.band1, &coord).await?;
			let band2 = match &request.band2 {
				Some(band2) => Some(self.fetch_tile(plan, scene, band2, &coord).await?),
				None => None,
			};
			tiles.push((band1, band2));
		}

		let representative = selected[0].clone();

		// RGB shortcut: an identity formula over a multi-channel asset is
		// served as a plain composite without a colormap
		if request.latest && request.band2.is_none() && plan.formula.is_identity() && tiles[0].0.dim().0 >= 2 {
			let png = png_bytes(&compose_rgb(&tiles[0].0))?;
			return Ok((png, representative));
		}

		let img = if request.latest {
			let (band1, band2) = &tiles[0];
			let result = evaluate_tile(plan, band1, band2.as_ref())?;
			colorize(&result.index_axis(Axis(0), 0).to_owned(), &plan.colormap)
		} else {
			let mut layers = Vec::with_capacity(tiles.len());
			for (band1, band2) in &tiles {
				layers.push(evaluate_tile(plan, band1, band2.as_ref())?);
			}
			let stacked = stack::stack_time(&layers)?;
			let aggregate = stack::reduce_time(&stacked, plan.operation);
			colorize(&aggregate.index_axis(Axis(0), 0).to_owned(), &plan.colormap)
		};

		Ok((png_bytes(&img)?, representative))
	}

	async fn fetch_tile(&self, plan: &TilePlan, scene: &Scene, band: &str, coord: &TileCoord) -> Result<Array3<f64>> {
		let href = self.catalog.resolve_href(plan.sensor, scene.asset_href(band)?).await?;
		let coord = *coord;
		tokio::task::spawn_blocking(move || read_tile(&href, &coord))
			.await
			.map_err(|join_error| EngineError::reader(format!("tile read worker failed: {join_error}")))?
	}
}

impl Default for TileProcessor {
	fn default() -> TileProcessor {
		TileProcessor::new(DEFAULT_CACHE_TTL, DEFAULT_DEADLINE)
	}
}

/// Applies the formula to one scene's tile, always producing `(1, H, W)`.
fn evaluate_tile(plan: &TilePlan, band1: &Array3<f64>, band2: Option<&Array3<f64>>) -> Result<Array3<f64>> {
	let lhs = band1.index_axis(Axis(0), 0).to_owned();
	let result = match band2 {
		Some(band2) => {
			let rhs = band2.index_axis(Axis(0), 0).to_owned();
			plan.formula.apply(&lhs, Some(&rhs))?
		}
		None => plan.formula.apply(&lhs, None)?,
	};
	Ok(result.insert_axis(Axis(0)))
}
