//! Scene-id labels on rendered images.
//!
//! Per-scene frames carry their id as white-on-black text in the top-left
//! corner, so the animation stays legible. Glyphs come from the fixed 8x8
//! bitmap font, scaled up for larger frames.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use image::{Rgb, RgbImage};

const PADDING: u32 = 4;

/// The pixel scale used for a frame of the given width.
fn glyph_scale(image_width: u32) -> u32 {
	(image_width / 256).clamp(1, 4)
}

fn draw_glyph(img: &mut RgbImage, glyph: [u8; 8], x0: u32, y0: u32, scale: u32, color: Rgb<u8>) {
	for (row, bits) in glyph.iter().enumerate() {
		for col in 0..8u32 {
			if bits >> col & 1 == 0 {
				continue;
			}
			for dy in 0..scale {
				for dx in 0..scale {
					let x = x0 + col * scale + dx;
					let y = y0 + row as u32 * scale + dy;
					if x < img.width() && y < img.height() {
						img.put_pixel(x, y, color);
					}
				}
			}
		}
	}
}

/// Draws `text` at `(x, y)` without a background.
pub fn draw_text(img: &mut RgbImage, text: &str, x: u32, y: u32, scale: u32, color: Rgb<u8>) {
	let glyph_size = 8 * scale;
	let mut cursor = x;
	for ch in text.chars() {
		if let Some(glyph) = BASIC_FONTS.get(ch) {
			draw_glyph(img, glyph, cursor, y, scale, color);
		}
		cursor += glyph_size;
		if cursor >= img.width() {
			break;
		}
	}
}

/// Draws `text` onto the top-left corner of `img` over a black banner.
pub fn draw_label(img: &mut RgbImage, text: &str) {
	let scale = glyph_scale(img.width());
	let glyph_size = 8 * scale;
	let banner_width = (text.len() as u32 * glyph_size + 2 * PADDING).min(img.width());
	let banner_height = (glyph_size + 2 * PADDING).min(img.height());

	for y in 0..banner_height {
		for x in 0..banner_width {
			img.put_pixel(x, y, Rgb([0, 0, 0]));
		}
	}

	draw_text(img, text, PADDING, PADDING, scale, Rgb([255, 255, 255]));
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn label_paints_a_banner_with_text() {
		let mut img = RgbImage::from_pixel(256, 256, Rgb([120, 120, 120]));
		draw_label(&mut img, "S2A_45RVL_20241228");

		// banner background is black
		assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
		// some pixels inside the banner are white glyph pixels
		let white = img
			.pixels()
			.filter(|pixel| pixel.0 == [255, 255, 255])
			.count();
		assert!(white > 50, "expected glyph pixels, found {white}");
		// the image body is untouched
		assert_eq!(img.get_pixel(128, 128).0, [120, 120, 120]);
	}

	#[test]
	fn label_survives_tiny_images() {
		let mut img = RgbImage::from_pixel(10, 6, Rgb([50, 50, 50]));
		draw_label(&mut img, "a very long scene identifier");
		assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
	}

	#[test]
	fn labelling_is_deterministic() {
		let mut a = RgbImage::from_pixel(64, 64, Rgb([9, 9, 9]));
		let mut b = a.clone();
		draw_label(&mut a, "LC09_L2SP_142040");
		draw_label(&mut b, "LC09_L2SP_142040");
		assert_eq!(a.as_raw(), b.as_raw());
	}
}
