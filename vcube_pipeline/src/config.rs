//! Request configurations and their validation.
//!
//! Every entry point takes a plain config struct; `validated()` turns it
//! into a plan with the parsed formula, colormap, reducer and sensor. All
//! rejections are [`EngineError::Validation`] and happen before any I/O.

use anyhow::Result;
use chrono::NaiveDate;
use std::path::PathBuf;
use vcube_core::{EngineError, Formula, GeoBBox, Reducer, Sensor, TileCoord};
use vcube_image::Colormap;

/// The operations accepted on the request surfaces. The aggregation layer
/// additionally knows `mode`, which is not reachable from here.
const OPERATIONS: [&str; 7] = ["mean", "median", "max", "min", "std", "sum", "var"];

pub(crate) fn parse_operation(name: &str) -> Result<Reducer> {
	if !OPERATIONS.contains(&name) {
		return Err(EngineError::validation(format!(
			"invalid operation '{name}'. Choose from 'mean', 'median', 'max', 'min', 'std', 'sum', 'var'"
		)));
	}
	name.parse()
}

/// The zoom levels the tile endpoint serves.
const MIN_TILE_ZOOM: u8 = 10;
const MAX_TILE_ZOOM: u8 = 23;

/// Batch band-math pipeline request.
#[derive(Clone, Debug)]
pub struct ComputeConfig {
	pub bbox: GeoBBox,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub cloud_cover: f64,
	pub formula: String,
	pub band1: String,
	pub band2: Option<String>,
	pub operation: Option<String>,
	pub timeseries: bool,
	pub output_dir: PathBuf,
	pub colormap: String,
	pub workers: usize,
	pub smart_filter: bool,
	pub collection: String,
}

impl ComputeConfig {
	/// A config with the request defaults filled in; callers override the
	/// fields they care about.
	pub fn new(bbox: GeoBBox, start_date: NaiveDate, end_date: NaiveDate, output_dir: PathBuf) -> ComputeConfig {
		ComputeConfig {
			bbox,
			start_date,
			end_date,
			cloud_cover: 30.0,
			formula: "band1".to_string(),
			band1: "red".to_string(),
			band2: None,
			operation: None,
			timeseries: true,
			output_dir,
			colormap: "RdYlGn".to_string(),
			workers: 1,
			smart_filter: true,
			collection: "sentinel-2-l2a".to_string(),
		}
	}

	pub fn validated(&self) -> Result<ComputePlan> {
		if self.band1.trim().is_empty() {
			return Err(EngineError::validation("band1 is required"));
		}
		if !self.timeseries && self.operation.is_none() {
			return Err(EngineError::validation("operation is required if timeseries is disabled"));
		}
		if self.end_date < self.start_date {
			return Err(EngineError::validation(format!(
				"end date ({}) must not precede start date ({})",
				self.end_date, self.start_date
			)));
		}
		let operation = self.operation.as_deref().map(parse_operation).transpose()?;
		Ok(ComputePlan {
			sensor: Sensor::from_collection(&self.collection)?,
			formula: Formula::parse(&self.formula)?,
			operation,
			colormap: Colormap::by_name(&self.colormap)?,
			workers: self.workers.max(1),
		})
	}
}

/// The parsed half of a [`ComputeConfig`].
#[derive(Clone, Debug)]
pub struct ComputePlan {
	pub sensor: Sensor,
	pub formula: Formula,
	pub operation: Option<Reducer>,
	pub colormap: Colormap,
	pub workers: usize,
}

/// Multi-band extraction request.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
	pub bbox: GeoBBox,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub cloud_cover: f64,
	pub bands_list: Vec<String>,
	pub output_dir: PathBuf,
	pub workers: usize,
	pub zip_output: bool,
	pub smart_filter: bool,
	pub collection: String,
}

impl ExtractConfig {
	pub fn new(bbox: GeoBBox, start_date: NaiveDate, end_date: NaiveDate, output_dir: PathBuf) -> ExtractConfig {
		ExtractConfig {
			bbox,
			start_date,
			end_date,
			cloud_cover: 30.0,
			bands_list: vec!["red".to_string(), "green".to_string(), "blue".to_string()],
			output_dir,
			workers: 1,
			zip_output: false,
			smart_filter: true,
			collection: "sentinel-2-l2a".to_string(),
		}
	}

	pub fn validated(&self) -> Result<ExtractPlan> {
		if self.bands_list.is_empty() {
			return Err(EngineError::validation("bands_list must not be empty"));
		}
		let sensor = Sensor::from_collection(&self.collection)?;
		sensor.validate_bands(&self.bands_list)?;
		Ok(ExtractPlan {
			sensor,
			workers: self.workers.max(1),
		})
	}
}

#[derive(Clone, Copy, Debug)]
pub struct ExtractPlan {
	pub sensor: Sensor,
	pub workers: usize,
}

/// One XYZ tile request.
#[derive(Clone, Debug)]
pub struct TileRequest {
	pub x: u32,
	pub y: u32,
	pub z: u8,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub cloud_cover: f64,
	pub band1: String,
	pub band2: Option<String>,
	pub formula: String,
	pub colormap: String,
	pub operation: String,
	pub latest: bool,
	pub collection: String,
}

impl TileRequest {
	pub fn new(x: u32, y: u32, z: u8, start_date: NaiveDate, end_date: NaiveDate) -> TileRequest {
		TileRequest {
			x,
			y,
			z,
			start_date,
			end_date,
			cloud_cover: 30.0,
			band1: "visual".to_string(),
			band2: None,
			formula: "band1".to_string(),
			colormap: "RdYlGn".to_string(),
			operation: "median".to_string(),
			latest: true,
			collection: "sentinel-2-l2a".to_string(),
		}
	}

	pub fn validated(&self) -> Result<TilePlan> {
		if self.z < MIN_TILE_ZOOM || self.z > MAX_TILE_ZOOM {
			return Err(EngineError::validation(format!(
				"zoom level must be between {MIN_TILE_ZOOM} and {MAX_TILE_ZOOM}, got {}",
				self.z
			)));
		}
		if self.band1.trim().is_empty() {
			return Err(EngineError::validation("band1 is required"));
		}
		Ok(TilePlan {
			coord: TileCoord::new(self.x, self.y, self.z)?,
			sensor: Sensor::from_collection(&self.collection)?,
			formula: Formula::parse(&self.formula)?,
			colormap: Colormap::by_name(&self.colormap)?,
			operation: parse_operation(&self.operation)?,
		})
	}

	/// The cache key: every parameter, canonicalized through the validated
	/// plan so equivalent requests share an entry.
	pub(crate) fn cache_key(&self, plan: &TilePlan) -> String {
		format!(
			"{}|{}/{}/{}|{}..{}|cc{}|{}|{}|{}|{}|{}|{}",
			plan.sensor.collection(),
			self.z,
			self.x,
			self.y,
			self.start_date,
			self.end_date,
			self.cloud_cover,
			self.band1,
			self.band2.as_deref().unwrap_or("-"),
			plan.formula.text().replace(' ', ""),
			plan.colormap.name(),
			plan.operation,
			if self.latest { "latest" } else { "timeseries" },
		)
	}
}

#[derive(Clone, Debug)]
pub struct TilePlan {
	pub coord: TileCoord,
	pub sensor: Sensor,
	pub formula: Formula,
	pub colormap: Colormap,
	pub operation: Reducer,
}
