use crate::error::EngineError;
use anyhow::Result;
use geo_types::{Coord, LineString, Polygon};
use serde_json::{Value, json};
use std::fmt::Debug;

static MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;
static RADIUS: f64 = 6_378_137.0; // meters

/// An axis-aligned area of interest in WGS84 decimal degrees.
///
/// The box is stored as `west, south, east, north`. Construction validates
/// the coordinate ranges and the axis ordering; an invalid box is a
/// [`EngineError::Validation`] because it always comes straight from user
/// input.
#[derive(Clone, Copy, PartialEq)]
pub struct GeoBBox {
	pub west: f64,
	pub south: f64,
	pub east: f64,
	pub north: f64,
}

impl GeoBBox {
	pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<GeoBBox> {
		let bbox = GeoBBox {
			west,
			south,
			east,
			north,
		};
		bbox.checked()
	}

	/// Parses the `"west,south,east,north"` form used on the command line.
	pub fn from_list(input: &str) -> Result<GeoBBox> {
		let values: Vec<f64> = input
			.split(',')
			.map(|part| {
				part
					.trim()
					.parse::<f64>()
					.map_err(|_| EngineError::Validation(format!("bbox component '{part}' is not a number")))
			})
			.collect::<Result<_, _>>()?;
		if values.len() != 4 {
			return Err(EngineError::validation(format!(
				"bbox must have 4 components (west,south,east,north), got {}",
				values.len()
			)));
		}
		GeoBBox::new(values[0], values[1], values[2], values[3])
	}

	fn checked(self) -> Result<GeoBBox> {
		let mut problems = vec![];
		if !(self.west.is_finite() && self.south.is_finite() && self.east.is_finite() && self.north.is_finite()) {
			problems.push("all coordinates must be finite".to_string());
		} else {
			if self.west < -180.0 || self.east > 180.0 {
				problems.push(format!("longitudes ({}, {}) must be within [-180, 180]", self.west, self.east));
			}
			if self.south < -90.0 || self.north > 90.0 {
				problems.push(format!("latitudes ({}, {}) must be within [-90, 90]", self.south, self.north));
			}
			if self.west >= self.east {
				problems.push(format!("west ({}) must be < east ({})", self.west, self.east));
			}
			if self.south >= self.north {
				problems.push(format!("south ({}) must be < north ({})", self.south, self.north));
			}
		}
		if problems.is_empty() {
			Ok(self)
		} else {
			Err(EngineError::validation(problems.join("; ")))
		}
	}

	pub fn as_array(&self) -> [f64; 4] {
		[self.west, self.south, self.east, self.north]
	}

	pub fn as_string_list(&self) -> String {
		format!("{},{},{},{}", self.west, self.south, self.east, self.north)
	}

	/// The box as a closed rectangle, for geometric predicates.
	pub fn to_polygon(&self) -> Polygon<f64> {
		let exterior = LineString::from(vec![
			Coord {
				x: self.west,
				y: self.south,
			},
			Coord {
				x: self.east,
				y: self.south,
			},
			Coord {
				x: self.east,
				y: self.north,
			},
			Coord {
				x: self.west,
				y: self.north,
			},
			Coord {
				x: self.west,
				y: self.south,
			},
		]);
		Polygon::new(exterior, vec![])
	}

	/// The box as a GeoJSON polygon, for STAC `intersects` queries.
	pub fn as_geojson(&self) -> Value {
		json!({
			"type": "Polygon",
			"coordinates": [[
				[self.west, self.south],
				[self.east, self.south],
				[self.east, self.north],
				[self.west, self.north],
				[self.west, self.south],
			]],
		})
	}

	/// Converts the box to Web-Mercator meters (EPSG:3857), clamping
	/// latitudes to the valid Mercator span.
	pub fn to_mercator(&self) -> [f64; 4] {
		fn x_from_lon(lon_deg: f64) -> f64 {
			RADIUS * lon_deg.to_radians()
		}
		fn y_from_lat(lat_deg: f64) -> f64 {
			let lat = lat_deg.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
			RADIUS * ((std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan()).ln()
		}
		[
			x_from_lon(self.west),
			y_from_lat(self.south),
			x_from_lon(self.east),
			y_from_lat(self.north),
		]
	}
}

impl Debug for GeoBBox {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "GeoBBox({}, {}, {}, {})", self.west, self.south, self.east, self.north)
	}
}

impl TryFrom<[f64; 4]> for GeoBBox {
	type Error = anyhow::Error;

	fn try_from(input: [f64; 4]) -> Result<Self> {
		GeoBBox::new(input[0], input[1], input[2], input[3])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::EngineError;

	#[test]
	fn creation_and_accessors() {
		let bbox = GeoBBox::new(-10.0, -5.0, 10.0, 5.0).unwrap();
		assert_eq!(bbox.as_array(), [-10.0, -5.0, 10.0, 5.0]);
		assert_eq!(bbox.as_string_list(), "-10,-5,10,5");
		assert_eq!(format!("{bbox:?}"), "GeoBBox(-10, -5, 10, 5)");
	}

	#[test]
	fn from_list_parses_query_form() {
		let bbox = GeoBBox::from_list("83.84765625, 28.22697, 83.93555, 28.30438").unwrap();
		assert_eq!(bbox.west, 83.84765625);
		assert_eq!(bbox.north, 28.30438);
	}

	#[test]
	fn invalid_boxes_are_validation_errors() {
		for input in [
			"1,2,3",
			"banana,2,3,4",
			"-190,-5,10,5",
			"-10,-95,10,5",
			"10,-5,-10,5",
			"-10,5,10,-5",
		] {
			let err = GeoBBox::from_list(input).unwrap_err();
			assert!(
				matches!(EngineError::of(&err), Some(EngineError::Validation(_))),
				"expected validation error for {input}, got {err}"
			);
		}
	}

	#[test]
	fn non_finite_rejected() {
		assert!(GeoBBox::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
		assert!(GeoBBox::new(0.0, 0.0, f64::INFINITY, 1.0).is_err());
	}

	#[test]
	fn polygon_is_closed() {
		let bbox = GeoBBox::new(-1.0, -2.0, 3.0, 4.0).unwrap();
		let polygon = bbox.to_polygon();
		let ring = polygon.exterior();
		assert_eq!(ring.0.len(), 5);
		assert_eq!(ring.0.first(), ring.0.last());
	}

	#[test]
	fn geojson_shape() {
		let bbox = GeoBBox::new(-1.0, -2.0, 3.0, 4.0).unwrap();
		let geojson = bbox.as_geojson();
		assert_eq!(geojson["type"], "Polygon");
		assert_eq!(geojson["coordinates"][0].as_array().unwrap().len(), 5);
	}

	#[test]
	fn mercator_world_bounds() {
		let bbox = GeoBBox::new(-180.0, -85.0, 180.0, 85.0).unwrap();
		let [x_min, y_min, x_max, y_max] = bbox.to_mercator();
		let extent = 20_037_508.342789244_f64;
		assert!((x_min + extent).abs() < 1.0);
		assert!((x_max - extent).abs() < 1.0);
		assert!(y_min < -19_000_000.0 && y_max > 19_000_000.0);
	}
}
