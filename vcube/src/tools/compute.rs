use super::date_or_default;
use anyhow::Result;
use std::path::PathBuf;
use vcube_core::{GeoBBox, JobSink};
use vcube_pipeline::ComputeConfig;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// Bounding box as 'west,south,east,north' in WGS84 degrees
	#[arg(long)]
	pub bbox: String,

	/// Start date (YYYY-MM-DD), defaults to one year ago
	#[arg(long)]
	pub start_date: Option<String>,

	/// End date (YYYY-MM-DD), defaults to today
	#[arg(long)]
	pub end_date: Option<String>,

	/// Maximum cloud cover percentage
	#[arg(long, default_value_t = 30.0)]
	pub cloud_cover: f64,

	/// Band-math formula over band1 and band2
	#[arg(long, default_value = "(band2 - band1) / (band2 + band1)")]
	pub formula: String,

	/// First band
	#[arg(long, default_value = "red")]
	pub band1: String,

	/// Second band; leave empty for single-band formulas
	#[arg(long, default_value = "nir")]
	pub band2: Option<String>,

	/// Aggregation operation (mean, median, max, min, std, sum, var)
	#[arg(long)]
	pub operation: Option<String>,

	/// Save per-scene intermediates, GIF and ZIP. Default: true
	#[arg(long)]
	pub timeseries: Option<bool>,

	/// Output directory; also receives the runtime.log of the job
	#[arg(long)]
	pub output_dir: PathBuf,

	/// Colormap for rendered PNGs
	#[arg(long, default_value = "RdYlGn")]
	pub colormap: String,

	/// Number of parallel scene workers
	#[arg(long, default_value_t = 1)]
	pub workers: usize,

	/// Thin out dense time ranges to one scene per cadence bucket
	#[arg(long)]
	pub smart_filter: bool,

	/// STAC collection (sentinel-2-l2a or landsat-c2-l2)
	#[arg(long, default_value = "sentinel-2-l2a")]
	pub collection: String,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let config = ComputeConfig {
		bbox: GeoBBox::from_list(&arguments.bbox)?,
		start_date: date_or_default(&arguments.start_date, 365)?,
		end_date: date_or_default(&arguments.end_date, 0)?,
		cloud_cover: arguments.cloud_cover,
		formula: arguments.formula.clone(),
		band1: arguments.band1.clone(),
		band2: arguments.band2.clone().filter(|band| !band.is_empty()),
		operation: arguments.operation.clone(),
		timeseries: arguments.timeseries.unwrap_or(true),
		output_dir: arguments.output_dir.clone(),
		colormap: arguments.colormap.clone(),
		workers: arguments.workers,
		smart_filter: arguments.smart_filter,
		collection: arguments.collection.clone(),
	};

	std::fs::create_dir_all(&config.output_dir)?;
	let sink = JobSink::to_file(&config.output_dir.join("runtime.log"))?;
	vcube_pipeline::compute(&config, &sink).await
}
