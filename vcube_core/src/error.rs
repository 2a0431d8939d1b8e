//! Error kinds of the engine.
//!
//! All fallible functions return [`anyhow::Result`]; errors that a caller
//! needs to branch on carry an [`EngineError`] as their root cause, so the
//! kind survives context wrapping and can be recovered with
//! [`EngineError::of`].

use thiserror::Error;

/// The failure classes the engine distinguishes.
///
/// Per-scene reader failures are not fatal: the pipeline logs them, drops the
/// scene and continues. Every other kind aborts the request that raised it.
#[derive(Debug, Error)]
pub enum EngineError {
	/// Invalid request parameters (bad bbox, unknown band or operation, zoom
	/// out of range, missing operation with timeseries disabled).
	#[error("invalid request: {0}")]
	Validation(String),

	/// The STAC catalog answered with a non-2xx status.
	#[error("catalog search failed: {0}")]
	Catalog(String),

	/// The catalog returned no features, or every feature was dropped by
	/// filtering or by the out-of-bounds window guard.
	#[error("no usable scenes: {0}")]
	NoResults(String),

	/// A single COG could not be opened or read.
	#[error("scene read failed: {0}")]
	Reader(String),

	/// PNG, GIF or GeoTIFF emission failed.
	#[error("rendering failed: {0}")]
	Render(String),

	/// The request exceeded its wall-clock deadline.
	#[error("request exceeded the {0} s deadline")]
	Timeout(u64),
}

impl EngineError {
	pub fn validation(msg: impl Into<String>) -> anyhow::Error {
		EngineError::Validation(msg.into()).into()
	}

	pub fn catalog(msg: impl Into<String>) -> anyhow::Error {
		EngineError::Catalog(msg.into()).into()
	}

	pub fn no_results(msg: impl Into<String>) -> anyhow::Error {
		EngineError::NoResults(msg.into()).into()
	}

	pub fn reader(msg: impl Into<String>) -> anyhow::Error {
		EngineError::Reader(msg.into()).into()
	}

	pub fn render(msg: impl Into<String>) -> anyhow::Error {
		EngineError::Render(msg.into()).into()
	}

	/// Returns the [`EngineError`] at the root of `err`, if there is one.
	pub fn of(err: &anyhow::Error) -> Option<&EngineError> {
		err.downcast_ref::<EngineError>()
	}
}
