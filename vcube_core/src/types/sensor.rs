use crate::error::EngineError;
use crate::filter;
use crate::types::Scene;
use anyhow::Result;
use std::fmt::{self, Display};

/// Everything that differs between the supported sensor families, bundled in
/// one place: catalog routing, asset-URL signing, overlap deduplication and
/// the band whitelist.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sensor {
	Sentinel2L2a,
	LandsatC2L2,
}

static EARTH_SEARCH_ROOT: &str = "https://earth-search.aws.element84.com/v1";
static PLANETARY_COMPUTER_ROOT: &str = "https://planetarycomputer.microsoft.com/api/stac/v1";

static SENTINEL2_BANDS: &[(&str, &str)] = &[
	("red", "Red - 10m"),
	("green", "Green - 10m"),
	("blue", "Blue - 10m"),
	("nir", "NIR 1 - 10m"),
	("swir22", "SWIR 2.2μm - 20m"),
	("rededge2", "Red Edge 2 - 20m"),
	("rededge3", "Red Edge 3 - 20m"),
	("rededge1", "Red Edge 1 - 20m"),
	("swir16", "SWIR 1.6μm - 20m"),
	("wvp", "Water Vapour (WVP)"),
	("nir08", "NIR 2 - 20m"),
	("aot", "Aerosol optical thickness (AOT)"),
	("coastal", "Coastal - 60m"),
	("nir09", "NIR 3 - 60m"),
];

static LANDSAT_BANDS: &[(&str, &str)] = &[
	("coastal", "Coastal/Aerosol - 30m"),
	("blue", "Blue - 30m"),
	("green", "Green - 30m"),
	("red", "Red - 30m"),
	("nir", "NIR - 30m"),
	("swir1", "SWIR 1.6μm - 30m"),
	("swir2", "SWIR 2.2μm - 30m"),
	("pan", "Panchromatic - 15m"),
	("cirrus", "Cirrus - 30m"),
	("lwir1", "Thermal Infrared 1 - 100m"),
	("lwir2", "Thermal Infrared 2 - 100m"),
];

impl Sensor {
	/// Routes a STAC collection id to the sensor family serving it.
	pub fn from_collection(collection: &str) -> Result<Sensor> {
		if collection.starts_with("landsat") {
			Ok(Sensor::LandsatC2L2)
		} else if collection == "sentinel-2-l2a" {
			Ok(Sensor::Sentinel2L2a)
		} else {
			Err(EngineError::validation(format!(
				"unsupported collection '{collection}', expected 'sentinel-2-l2a' or 'landsat-c2-l2'"
			)))
		}
	}

	pub fn collection(&self) -> &'static str {
		match self {
			Sensor::Sentinel2L2a => "sentinel-2-l2a",
			Sensor::LandsatC2L2 => "landsat-c2-l2",
		}
	}

	/// The STAC root the collection lives under. Sentinel-2 is served by
	/// Earth Search, Landsat by the Microsoft Planetary Computer.
	pub fn stac_root(&self) -> &'static str {
		match self {
			Sensor::Sentinel2L2a => EARTH_SEARCH_ROOT,
			Sensor::LandsatC2L2 => PLANETARY_COMPUTER_ROOT,
		}
	}

	/// Planetary Computer assets must be signed before the first byte is read.
	pub fn needs_signing(&self) -> bool {
		matches!(self, Sensor::LandsatC2L2)
	}

	/// The exportable bands with their human-readable descriptions.
	pub fn bands(&self) -> &'static [(&'static str, &'static str)] {
		match self {
			Sensor::Sentinel2L2a => SENTINEL2_BANDS,
			Sensor::LandsatC2L2 => LANDSAT_BANDS,
		}
	}

	pub fn band_title(&self, band: &str) -> Option<&'static str> {
		self
			.bands()
			.iter()
			.find(|(name, _)| *name == band)
			.map(|(_, title)| *title)
	}

	/// Rejects band names outside the sensor's whitelist, naming the
	/// offenders.
	pub fn validate_bands(&self, bands: &[String]) -> Result<()> {
		let invalid: Vec<&str> = bands
			.iter()
			.map(String::as_str)
			.filter(|band| self.band_title(band).is_none())
			.collect();
		if invalid.is_empty() {
			return Ok(());
		}
		let known: Vec<&str> = self.bands().iter().map(|(name, _)| *name).collect();
		Err(EngineError::validation(format!(
			"invalid band names: {}. Band names should be one of: {}",
			invalid.join(", "),
			known.join(", ")
		)))
	}

	/// Removes scenes that cover the same ground twice, using the grid
	/// system of the sensor family.
	pub fn dedup_overlapping(&self, scenes: Vec<Scene>) -> Vec<Scene> {
		match self {
			Sensor::Sentinel2L2a => filter::dedup_sentinel2(scenes),
			Sensor::LandsatC2L2 => filter::dedup_landsat(scenes),
		}
	}
}

impl Display for Sensor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.collection())
	}
}
