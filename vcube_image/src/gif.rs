//! Animated GIF assembly from per-scene frames.

use anyhow::{Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::FilterType;
use image::{Delay, Frame, imageops};
use std::fs::File;
use std::path::{Path, PathBuf};
use vcube_core::EngineError;

/// Builds a looping GIF from PNG frames.
///
/// Frames are sorted by path, resized to the largest frame's dimensions with
/// a Lanczos kernel, and shown for `seconds_per_frame` each; the animation
/// loops forever.
pub fn write_gif(frame_paths: &[PathBuf], output: &Path, seconds_per_frame: u32) -> Result<()> {
	if frame_paths.is_empty() {
		return Err(EngineError::render("cannot build a GIF without frames"));
	}

	let mut sorted: Vec<&PathBuf> = frame_paths.iter().collect();
	sorted.sort();

	let mut frames = Vec::with_capacity(sorted.len());
	for path in &sorted {
		let frame = image::open(path)
			.map_err(|err| EngineError::render(format!("cannot load frame {path:?}: {err}")))?
			.to_rgba8();
		frames.push(frame);
	}

	let max_width = frames.iter().map(|frame| frame.width()).max().unwrap();
	let max_height = frames.iter().map(|frame| frame.height()).max().unwrap();

	let file = File::create(output).with_context(|| format!("cannot create {output:?}"))?;
	let mut encoder = GifEncoder::new(file);
	encoder
		.set_repeat(Repeat::Infinite)
		.map_err(|err| EngineError::render(format!("cannot configure GIF loop: {err}")))?;

	let delay = Delay::from_numer_denom_ms(seconds_per_frame * 1000, 1);
	for frame in frames {
		let resized = if frame.dimensions() == (max_width, max_height) {
			frame
		} else {
			imageops::resize(&frame, max_width, max_height, FilterType::Lanczos3)
		};
		encoder
			.encode_frame(Frame::from_parts(resized, 0, 0, delay))
			.map_err(|err| EngineError::render(format!("cannot encode GIF frame: {err}")))?;
	}
	log::debug!("wrote {} GIF frames to {output:?}", sorted.len());
	Ok(())
}
