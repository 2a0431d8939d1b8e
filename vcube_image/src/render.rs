//! Array-to-image conversion.

use crate::colormap::Colormap;
use anyhow::Result;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use ndarray::{Array2, Array3};
use vcube_core::EngineError;

/// The finite min/max of a value stream, ignoring NaN and infinities.
fn finite_bounds<'a>(values: impl Iterator<Item = &'a f64>) -> Option<(f64, f64)> {
	let mut bounds: Option<(f64, f64)> = None;
	for &value in values {
		if !value.is_finite() {
			continue;
		}
		bounds = Some(match bounds {
			Some((low, high)) => (low.min(value), high.max(value)),
			None => (value, value),
		});
	}
	bounds
}

fn normalized(value: f64, low: f64, high: f64) -> f64 {
	if !value.is_finite() {
		return f64::NAN;
	}
	if high == low {
		return 0.0;
	}
	(value - low) / (high - low)
}

/// Colorizes a single-channel array: min-max normalization over the finite
/// values, then one colormap sample per pixel. NaN pixels come out black.
pub fn colorize(values: &Array2<f64>, colormap: &Colormap) -> RgbImage {
	let (height, width) = values.dim();
	let (low, high) = finite_bounds(values.iter()).unwrap_or((0.0, 0.0));

	let mut img = RgbImage::new(width as u32, height as u32);
	for ((row, col), &value) in values.indexed_iter() {
		let rgb = colormap.sample(normalized(value, low, high));
		img.put_pixel(col as u32, row as u32, image::Rgb(rgb));
	}
	img
}

/// Builds an RGB composite from the first three channels of a multi-band
/// cube, stretched to 0..255 over the cube's finite bounds.
pub fn compose_rgb(cube: &Array3<f64>) -> RgbImage {
	let (bands, height, width) = cube.dim();
	let (low, high) = finite_bounds(cube.iter()).unwrap_or((0.0, 0.0));

	let mut img = RgbImage::new(width as u32, height as u32);
	for row in 0..height {
		for col in 0..width {
			let mut rgb = [0u8; 3];
			for (channel, slot) in rgb.iter_mut().enumerate() {
				let band = channel.min(bands - 1);
				let t = normalized(cube[[band, row, col]], low, high);
				*slot = if t.is_nan() { 0 } else { (t * 255.0).round() as u8 };
			}
			img.put_pixel(col as u32, row as u32, image::Rgb(rgb));
		}
	}
	img
}

/// Renders a result cube the way the batch pipeline serves it: single-band
/// cubes go through the colormap, multi-band cubes become RGB composites.
pub fn to_image(cube: &Array3<f64>, colormap: &Colormap) -> Result<RgbImage> {
	match cube.dim().0 {
		0 => Err(EngineError::render("cannot render a zero-band result")),
		1 => {
			let layer = cube.index_axis(ndarray::Axis(0), 0).to_owned();
			Ok(colorize(&layer, colormap))
		}
		_ => Ok(compose_rgb(cube)),
	}
}

/// Encodes an image as PNG bytes.
pub fn png_bytes(img: &RgbImage) -> Result<Vec<u8>> {
	let mut buffer = Vec::new();
	PngEncoder::new(&mut buffer)
		.write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
		.map_err(|err| EngineError::render(format!("PNG encoding failed: {err}")))?;
	Ok(buffer)
}

#[cfg(test)]
mod tests {
	use super::*;
	use ndarray::{Array2, Array3, array};

	#[test]
	fn colorize_spans_the_gradient() {
		let values = array![[0.0, 0.5], [1.0, f64::NAN]];
		let img = colorize(&values, &Colormap::default());

		assert_eq!(img.dimensions(), (2, 2));
		assert_eq!(img.get_pixel(0, 0).0, [165, 0, 38]);
		assert_eq!(img.get_pixel(1, 0).0, [255, 255, 191]);
		assert_eq!(img.get_pixel(0, 1).0, [0, 104, 55]);
		assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0], "NaN renders black");
	}

	#[test]
	fn normalization_ignores_nan_when_finding_bounds() {
		let values = array![[10.0, 20.0], [f64::NAN, 30.0]];
		let img = colorize(&values, &Colormap::by_name("Greys").unwrap());
		// 10 -> t=0 -> white; 30 -> t=1 -> black
		assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
		assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0]);
	}

	#[test]
	fn constant_arrays_render_uniformly() {
		let values = Array2::from_elem((3, 3), 5.0);
		let img = colorize(&values, &Colormap::default());
		let first = img.get_pixel(0, 0);
		assert!(img.pixels().all(|pixel| pixel == first));
	}

	#[test]
	fn rendering_twice_is_byte_identical() {
		let values = array![[0.1, 0.9], [0.4, f64::NAN]];
		let cmap = Colormap::default();
		let once = png_bytes(&colorize(&values, &cmap)).unwrap();
		let twice = png_bytes(&colorize(&values, &cmap)).unwrap();
		assert_eq!(once, twice);
	}

	#[test]
	fn single_band_cube_uses_the_colormap() {
		let cube = Array3::from_shape_vec((1, 1, 2), vec![0.0, 1.0]).unwrap();
		let img = to_image(&cube, &Colormap::default()).unwrap();
		assert_eq!(img.get_pixel(0, 0).0, [165, 0, 38]);
	}

	#[test]
	fn multi_band_cube_becomes_an_rgb_composite() {
		let cube = Array3::from_shape_vec(
			(3, 1, 2),
			vec![
				0.0, 255.0, // red channel
				0.0, 0.0, // green channel
				255.0, 0.0, // blue channel
			],
		)
		.unwrap();
		let img = to_image(&cube, &Colormap::default()).unwrap();
		assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255]);
		assert_eq!(img.get_pixel(1, 0).0, [255, 0, 0]);
	}

	#[test]
	fn png_bytes_are_decodable() {
		let values = array![[0.0, 1.0]];
		let bytes = png_bytes(&colorize(&values, &Colormap::default())).unwrap();
		let decoded = image::load_from_memory(&bytes).unwrap();
		assert_eq!(decoded.width(), 2);
		assert_eq!(decoded.height(), 1);
	}
}
