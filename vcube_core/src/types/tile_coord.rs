use crate::types::GeoBBox;
use anyhow::{Result, ensure};
use std::f64::consts::PI;
use std::fmt::{self, Debug};

/// Half the Web-Mercator world width in meters.
pub const WEB_MERCATOR_EXTENT: f64 = 20_037_508.342789244;

/// An XYZ tile address in the Web-Mercator pyramid.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct TileCoord {
	pub x: u32,
	pub y: u32,
	pub z: u8,
}

impl TileCoord {
	pub fn new(x: u32, y: u32, z: u8) -> Result<TileCoord> {
		ensure!(z <= 30, "zoom level ({z}) must be <= 30");
		let max = 2u32.pow(z as u32);
		ensure!(x < max && y < max, "tile ({x}, {y}) does not exist at zoom {z}");
		Ok(TileCoord { x, y, z })
	}

	/// The tile's bounds in WGS84 degrees.
	pub fn to_geo_bbox(&self) -> Result<GeoBBox> {
		let zoom = 2.0f64.powi(self.z as i32);
		let lon = |x: f64| (x / zoom - 0.5) * 360.0;
		let lat = |y: f64| ((PI * (1.0 - 2.0 * y / zoom)).exp().atan() / PI - 0.25) * 360.0;

		GeoBBox::new(
			lon(self.x as f64),
			lat((self.y + 1) as f64),
			lon((self.x + 1) as f64),
			lat(self.y as f64),
		)
	}

	/// The tile's bounds in Web-Mercator meters `[min_x, min_y, max_x, max_y]`.
	pub fn to_mercator_bbox(&self) -> [f64; 4] {
		let tiles = 2u32.pow(self.z as u32) as f64;
		let span = 2.0 * WEB_MERCATOR_EXTENT / tiles;

		let min_x = -WEB_MERCATOR_EXTENT + self.x as f64 * span;
		let max_y = WEB_MERCATOR_EXTENT - self.y as f64 * span;
		[min_x, max_y - span, min_x + span, max_y]
	}

	/// The tile containing `(lon, lat)` at zoom `z`.
	pub fn from_lon_lat(lon: f64, lat: f64, z: u8) -> Result<TileCoord> {
		ensure!(z <= 30, "zoom level ({z}) must be <= 30");
		let zoom = 2.0f64.powi(z as i32);
		let x = ((lon / 360.0 + 0.5) * zoom).floor();
		let lat_rad = lat.to_radians();
		let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * zoom).floor();
		let max = zoom - 1.0;
		TileCoord::new(x.clamp(0.0, max) as u32, y.clamp(0.0, max) as u32, z)
	}
}

impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TileCoord({}/{}/{})", self.z, self.x, self.y)
	}
}
