use super::date_or_default;
use anyhow::Result;
use serde_json::json;
use vcube_core::stac::{BlockingCatalogClient, SearchArea, SearchQuery};
use vcube_core::{GeoBBox, Scene, Sensor};

#[derive(clap::Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	/// Bounding box as 'west,south,east,north' in WGS84 degrees
	#[arg(long)]
	pub bbox: String,

	/// Start date (YYYY-MM-DD), defaults to 60 days ago
	#[arg(long)]
	pub start_date: Option<String>,

	/// End date (YYYY-MM-DD), defaults to today
	#[arg(long)]
	pub end_date: Option<String>,

	/// Maximum cloud cover percentage
	#[arg(long, default_value_t = 30.0)]
	pub cloud_cover: f64,

	/// STAC collection (sentinel-2-l2a or landsat-c2-l2)
	#[arg(long, default_value = "sentinel-2-l2a")]
	pub collection: String,
}

fn feature_of(scene: &Scene) -> serde_json::Value {
	json!({
		"type": "Feature",
		"id": scene.id,
		"properties": {
			"datetime": scene.datetime.to_rfc3339(),
			"eo:cloud_cover": scene.cloud_cover,
		},
		"geometry": scene.geometry,
		"assets": scene
			.assets
			.iter()
			.map(|(band, href)| (band.clone(), json!({"href": href})))
			.collect::<serde_json::Map<_, _>>(),
	})
}

pub fn run(arguments: &Subcommand) -> Result<()> {
	let bbox = GeoBBox::from_list(&arguments.bbox)?;
	let query = SearchQuery {
		sensor: Sensor::from_collection(&arguments.collection)?,
		start_date: date_or_default(&arguments.start_date, 60)?,
		end_date: date_or_default(&arguments.end_date, 0)?,
		cloud_cover: arguments.cloud_cover,
		area: SearchArea::Polygon(bbox.as_geojson()),
	};

	let scenes = BlockingCatalogClient::new().search(&query)?;
	let collection = json!({
		"type": "FeatureCollection",
		"features": scenes.iter().map(feature_of).collect::<Vec<_>>(),
	});
	println!("{}", serde_json::to_string_pretty(&collection)?);
	Ok(())
}
