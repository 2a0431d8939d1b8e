//! A virtual data-cube engine over Cloud-Optimized GeoTIFF archives.
//!
//! Re-exports the public surface of the core and pipeline crates; the
//! binary in this crate is a thin command-line wrapper around them.

pub use vcube_core::{
	EngineError, Formula, GeoBBox, JobSink, Reducer, Scene, Sensor, TileCoord, filter, stac, stack,
};
pub use vcube_pipeline::{ComputeConfig, ExtractConfig, TileProcessor, TileRequest, compute, extract};
