use super::date_or_default;
use anyhow::Result;
use std::path::PathBuf;
use vcube_pipeline::{TileProcessor, TileRequest};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// Zoom level (10 to 23)
	pub z: u8,

	/// Tile column
	pub x: u32,

	/// Tile row
	pub y: u32,

	/// Start date (YYYY-MM-DD), defaults to one year ago
	#[arg(long)]
	pub start_date: Option<String>,

	/// End date (YYYY-MM-DD), defaults to today
	#[arg(long)]
	pub end_date: Option<String>,

	/// Maximum cloud cover percentage
	#[arg(long, default_value_t = 30.0)]
	pub cloud_cover: f64,

	/// First band
	#[arg(long, default_value = "visual")]
	pub band1: String,

	/// Second band
	#[arg(long)]
	pub band2: Option<String>,

	/// Band-math formula over band1 and band2
	#[arg(long, default_value = "band1")]
	pub formula: String,

	/// Colormap for the rendered tile
	#[arg(long, default_value = "RdYlGn")]
	pub colormap: String,

	/// Aggregation operation for the time-series path
	#[arg(long, default_value = "median")]
	pub operation: String,

	/// Aggregate the whole time range instead of serving the latest scene
	#[arg(long)]
	pub timeseries: bool,

	/// Where to write the PNG
	#[arg(long, default_value = "tile.png")]
	pub output: PathBuf,

	/// STAC collection (sentinel-2-l2a or landsat-c2-l2)
	#[arg(long, default_value = "sentinel-2-l2a")]
	pub collection: String,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let request = TileRequest {
		x: arguments.x,
		y: arguments.y,
		z: arguments.z,
		start_date: date_or_default(&arguments.start_date, 365)?,
		end_date: date_or_default(&arguments.end_date, 0)?,
		cloud_cover: arguments.cloud_cover,
		band1: arguments.band1.clone(),
		band2: arguments.band2.clone().filter(|band| !band.is_empty()),
		formula: arguments.formula.clone(),
		colormap: arguments.colormap.clone(),
		operation: arguments.operation.clone(),
		latest: !arguments.timeseries,
		collection: arguments.collection.clone(),
	};

	let processor = TileProcessor::default();
	let (png, scene) = processor.generate_tile(&request).await?;
	std::fs::write(&arguments.output, &png)?;

	log::info!(
		"wrote {} ({} bytes) from scene {} ({}, cloud cover {}%)",
		arguments.output.display(),
		png.len(),
		scene.id,
		scene.datetime,
		scene.cloud_cover
	);
	Ok(())
}
