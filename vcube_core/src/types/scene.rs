use crate::error::EngineError;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::Value;
use std::collections::BTreeMap;

/// One catalog entry: a single acquisition of a single grid cell.
///
/// Scene descriptors are immutable and live for one request. The `id` carries
/// the sensor's grid encoding (MGRS tile for Sentinel-2, WRS path/row for
/// Landsat via `sensor_meta` properties) and is what the overlap
/// deduplication keys on.
#[derive(Clone, Debug)]
pub struct Scene {
	pub id: String,
	pub datetime: DateTime<Utc>,
	pub cloud_cover: f64,
	pub geometry: Value,
	pub assets: BTreeMap<String, String>,
	pub wrs_path: Option<String>,
	pub wrs_row: Option<String>,
}

impl Scene {
	/// Builds a scene from one STAC feature.
	pub fn from_feature(feature: &Value) -> Result<Scene> {
		let id = feature["id"]
			.as_str()
			.context("feature has no 'id'")?
			.to_string();
		let properties = &feature["properties"];

		let datetime = properties["datetime"]
			.as_str()
			.with_context(|| format!("feature '{id}' has no 'properties.datetime'"))?;
		let datetime = DateTime::parse_from_rfc3339(datetime)
			.with_context(|| format!("feature '{id}' has an unparsable datetime '{datetime}'"))?
			.with_timezone(&Utc);

		// Features without a cloud estimate sort behind everything else.
		let cloud_cover = properties["eo:cloud_cover"].as_f64().unwrap_or(100.0);

		let mut assets = BTreeMap::new();
		if let Some(map) = feature["assets"].as_object() {
			for (band, asset) in map {
				if let Some(href) = asset["href"].as_str() {
					assets.insert(band.clone(), href.to_string());
				}
			}
		}

		Ok(Scene {
			id,
			datetime,
			cloud_cover,
			geometry: feature["geometry"].clone(),
			assets,
			wrs_path: stringified(&properties["landsat:wrs_path"]),
			wrs_row: stringified(&properties["landsat:wrs_row"]),
		})
	}

	pub fn date(&self) -> NaiveDate {
		self.datetime.date_naive()
	}

	/// The signed or unsigned COG URL of a band asset.
	pub fn asset_href(&self, band: &str) -> Result<&str> {
		self
			.assets
			.get(band)
			.map(String::as_str)
			.ok_or_else(|| EngineError::Validation(format!("scene '{}' has no asset for band '{band}'", self.id)).into())
	}

	/// The second underscore-delimited segment of the id: the MGRS tile for
	/// Sentinel-2 ids like `S2A_45RVL_20241228_0_L2A`.
	pub fn grid_cell(&self) -> &str {
		self.id.split('_').nth(1).unwrap_or("")
	}

	/// The leading two characters of the grid cell (the MGRS zone number).
	pub fn mgrs_zone(&self) -> &str {
		let cell = self.grid_cell();
		&cell[..cell.len().min(2)]
	}

	/// The third underscore-delimited segment of the id (the acquisition
	/// date tag for Sentinel-2 ids).
	pub fn acquisition_tag(&self) -> &str {
		self.id.split('_').nth(2).unwrap_or("")
	}

	/// Parses the GeoJSON footprint into a multipolygon.
	pub fn footprint(&self) -> Result<MultiPolygon<f64>> {
		let kind = self.geometry["type"].as_str().unwrap_or("");
		let coordinates = &self.geometry["coordinates"];
		let polygons = match kind {
			"Polygon" => vec![parse_polygon(coordinates)?],
			"MultiPolygon" => coordinates
				.as_array()
				.context("MultiPolygon has no coordinates")?
				.iter()
				.map(parse_polygon)
				.collect::<Result<Vec<_>>>()?,
			other => bail!("scene '{}' has an unsupported footprint type '{other}'", self.id),
		};
		Ok(MultiPolygon(polygons))
	}
}

fn stringified(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.clone()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

fn parse_ring(ring: &Value) -> Result<LineString<f64>> {
	let points = ring.as_array().context("ring is not an array")?;
	let coords = points
		.iter()
		.map(|point| {
			let pair = point.as_array().context("position is not an array")?;
			Ok(Coord {
				x: pair.first().and_then(Value::as_f64).context("position has no x")?,
				y: pair.get(1).and_then(Value::as_f64).context("position has no y")?,
			})
		})
		.collect::<Result<Vec<_>>>()?;
	Ok(LineString::from(coords))
}

fn parse_polygon(coordinates: &Value) -> Result<Polygon<f64>> {
	let rings = coordinates.as_array().context("polygon has no rings")?;
	let mut rings = rings.iter();
	let exterior = parse_ring(rings.next().context("polygon has no exterior ring")?)?;
	let interiors = rings.map(parse_ring).collect::<Result<Vec<_>>>()?;
	Ok(Polygon::new(exterior, interiors))
}


#[cfg(test)]
mod tests {
	use super::fixtures::{feature, scene};
	use super::*;
	use crate::error::EngineError;

	#[test]
	fn parses_a_stac_feature() {
		let scene = scene("S2A_45RVL_20241228_0_L2A", "2024-12-28T05:05:31.024000Z", 12.5, 1.0);
		assert_eq!(scene.id, "S2A_45RVL_20241228_0_L2A");
		assert_eq!(scene.date(), NaiveDate::from_ymd_opt(2024, 12, 28).unwrap());
		assert_eq!(scene.cloud_cover, 12.5);
		assert_eq!(
			scene.asset_href("red").unwrap(),
			"https://cogs.test/S2A_45RVL_20241228_0_L2A/B04.tif"
		);
	}

	#[test]
	fn id_segments() {
		let scene = scene("S2A_45RVL_20241228_0_L2A", "2024-12-28T05:05:31Z", 0.0, 1.0);
		assert_eq!(scene.grid_cell(), "45RVL");
		assert_eq!(scene.mgrs_zone(), "45");
		assert_eq!(scene.acquisition_tag(), "20241228");
	}

	#[test]
	fn missing_band_is_a_validation_error() {
		let scene = scene("S2A_45RVL_20241228_0_L2A", "2024-12-28T05:05:31Z", 0.0, 1.0);
		let err = scene.asset_href("swir16").unwrap_err();
		assert!(matches!(EngineError::of(&err), Some(EngineError::Validation(_))));
	}

	#[test]
	fn missing_cloud_cover_defaults_to_worst() {
		let mut value = feature("S2A_45RVL_20241228_0_L2A", "2024-12-28T05:05:31Z", 0.0, 1.0);
		value["properties"].as_object_mut().unwrap().remove("eo:cloud_cover");
		let scene = Scene::from_feature(&value).unwrap();
		assert_eq!(scene.cloud_cover, 100.0);
	}

	#[test]
	fn wrs_properties_accept_numbers_and_strings() {
		let mut value = feature("LC09_L2SP_142040_20241216_02_T1", "2024-12-16T04:52:00Z", 3.0, 2.0);
		let properties = value["properties"].as_object_mut().unwrap();
		properties.insert("landsat:wrs_path".to_string(), serde_json::json!("142"));
		properties.insert("landsat:wrs_row".to_string(), serde_json::json!(40));
		let scene = Scene::from_feature(&value).unwrap();
		assert_eq!(scene.wrs_path.as_deref(), Some("142"));
		assert_eq!(scene.wrs_row.as_deref(), Some("40"));
	}

	#[test]
	fn footprint_parses_polygon_and_multipolygon() {
		let scene = scene("S2A_45RVL_20241228_0_L2A", "2024-12-28T05:05:31Z", 0.0, 1.0);
		let footprint = scene.footprint().unwrap();
		assert_eq!(footprint.0.len(), 1);
		assert_eq!(footprint.0[0].exterior().0.len(), 5);

		let mut multi = scene.clone();
		multi.geometry = serde_json::json!({
			"type": "MultiPolygon",
			"coordinates": [
				[[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
				[[[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 2.0]]],
			],
		});
		assert_eq!(multi.footprint().unwrap().0.len(), 2);
	}

	#[test]
	fn unparsable_datetime_is_rejected() {
		let mut value = feature("S2A_45RVL_20241228_0_L2A", "2024-12-28T05:05:31Z", 0.0, 1.0);
		value["properties"]["datetime"] = serde_json::json!("yesterday");
		assert!(Scene::from_feature(&value).is_err());
	}
}
