//! The vcube processing pipelines.
//!
//! Three entry points, all driven by plain config structs:
//! - [`compute`] — the batch band-math pipeline writing a full artifact set
//!   into a per-job output directory,
//! - [`extract`] — per-scene multi-band GeoTIFF export,
//! - [`TileProcessor::generate_tile`] — the same pipeline specialized to a
//!   single cached XYZ tile.

pub mod config;
pub use config::{ComputeConfig, ExtractConfig, TileRequest};
mod engine;
pub use engine::compute;
mod extract;
pub use extract::extract;
mod tiler;
pub use tiler::{DEFAULT_CACHE_TTL, DEFAULT_DEADLINE, TileProcessor};
mod zip;
pub use zip::zip_files;
