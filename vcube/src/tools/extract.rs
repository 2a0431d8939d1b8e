use super::date_or_default;
use anyhow::Result;
use std::path::PathBuf;
use vcube_core::{GeoBBox, JobSink};
use vcube_pipeline::ExtractConfig;

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// Bounding box as 'west,south,east,north' in WGS84 degrees
	#[arg(long)]
	pub bbox: String,

	/// Start date (YYYY-MM-DD), defaults to one month ago
	#[arg(long)]
	pub start_date: Option<String>,

	/// End date (YYYY-MM-DD), defaults to today
	#[arg(long)]
	pub end_date: Option<String>,

	/// Maximum cloud cover percentage
	#[arg(long, default_value_t = 30.0)]
	pub cloud_cover: f64,

	/// Comma-separated list of bands to extract
	#[arg(long, default_value = "red,green,blue")]
	pub bands: String,

	/// Output directory; also receives the runtime.log of the job
	#[arg(long)]
	pub output_dir: PathBuf,

	/// Number of parallel scene workers
	#[arg(long, default_value_t = 1)]
	pub workers: usize,

	/// Pack the extracted GeoTIFFs into tiff_files.zip. Default: true
	#[arg(long)]
	pub zip_output: Option<bool>,

	/// Thin out dense time ranges to one scene per cadence bucket
	#[arg(long)]
	pub smart_filter: bool,

	/// STAC collection (sentinel-2-l2a or landsat-c2-l2)
	#[arg(long, default_value = "sentinel-2-l2a")]
	pub collection: String,
}

#[tokio::main]
pub async fn run(arguments: &Subcommand) -> Result<()> {
	let config = ExtractConfig {
		bbox: GeoBBox::from_list(&arguments.bbox)?,
		start_date: date_or_default(&arguments.start_date, 30)?,
		end_date: date_or_default(&arguments.end_date, 0)?,
		cloud_cover: arguments.cloud_cover,
		bands_list: arguments
			.bands
			.split(',')
			.map(|band| band.trim().to_string())
			.filter(|band| !band.is_empty())
			.collect(),
		output_dir: arguments.output_dir.clone(),
		workers: arguments.workers,
		zip_output: arguments.zip_output.unwrap_or(true),
		smart_filter: arguments.smart_filter,
		collection: arguments.collection.clone(),
	};

	std::fs::create_dir_all(&config.output_dir)?;
	let sink = JobSink::to_file(&config.output_dir.join("runtime.log"))?;
	vcube_pipeline::extract(&config, &sink).await
}
