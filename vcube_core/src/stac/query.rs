//! Search-request construction and response walking, shared by the async
//! and the blocking catalog client.

use crate::error::EngineError;
use crate::types::{GeoBBox, Scene, Sensor};
use anyhow::Result;
use chrono::NaiveDate;
use serde_json::{Value, json};

/// The spatial predicate of a search: a bbox for batch exports, a GeoJSON
/// polygon (`intersects`) for tile requests.
#[derive(Clone, Debug)]
pub enum SearchArea {
	Bbox(GeoBBox),
	Polygon(Value),
}

/// One catalog search, page handling included.
#[derive(Clone, Debug)]
pub struct SearchQuery {
	pub sensor: Sensor,
	pub start_date: NaiveDate,
	pub end_date: NaiveDate,
	pub cloud_cover: f64,
	pub area: SearchArea,
}

impl SearchQuery {
	pub fn search_url(&self) -> String {
		format!("{}/search", self.sensor.stac_root().trim_end_matches('/'))
	}

	/// The POST body of the first page.
	pub fn body(&self) -> Value {
		let mut body = json!({
			"collections": [self.sensor.collection()],
			"datetime": format!(
				"{}T00:00:00Z/{}T23:59:59Z",
				self.start_date.format("%Y-%m-%d"),
				self.end_date.format("%Y-%m-%d")
			),
			"query": {"eo:cloud_cover": {"lt": self.cloud_cover}},
			"limit": 100,
			"sortby": [{"field": "properties.datetime", "direction": "desc"}],
		});
		match &self.area {
			SearchArea::Bbox(bbox) => body["bbox"] = json!(bbox.as_array()),
			SearchArea::Polygon(polygon) => body["intersects"] = polygon.clone(),
		}
		body
	}
}

/// The follow-up request described by a `rel=next` link.
pub struct NextPage {
	pub href: Option<String>,
	pub method: String,
	pub body: Option<Value>,
}

/// Extracts the `rel=next` link, exactly as the catalog returned it.
pub fn next_page(response: &Value) -> Option<NextPage> {
	let links = response["links"].as_array()?;
	let link = links.iter().find(|link| link["rel"] == "next")?;
	Some(NextPage {
		href: link["href"].as_str().map(str::to_string),
		method: link["method"].as_str().unwrap_or("POST").to_string(),
		body: match &link["body"] {
			Value::Null => None,
			body => Some(body.clone()),
		},
	})
}

/// Appends the page's features to `scenes`, preserving response order.
pub fn collect_scenes(response: &Value, scenes: &mut Vec<Scene>) -> Result<()> {
	let features = response["features"]
		.as_array()
		.ok_or_else(|| EngineError::Catalog("search response has no 'features' array".to_string()))?;
	for feature in features {
		scenes.push(Scene::from_feature(feature)?);
	}
	Ok(())
}

/// The Planetary Computer SAS signing endpoint.
pub static SIGNING_URL: &str = "https://planetarycomputer.microsoft.com/api/sas/v1/sign";

/// Pulls the signed URL out of a signing response.
pub fn signed_href(response: &Value) -> Result<String> {
	response["href"]
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| EngineError::catalog("signing response carries no 'href'".to_string()))
}
