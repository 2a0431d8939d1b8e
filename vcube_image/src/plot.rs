//! The values-over-time chart.
//!
//! A line chart of the per-scene aggregate values with the fitted degree-1
//! trend overlaid, written alongside the batch outputs.

use crate::label::draw_text;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use std::path::Path;
use vcube_core::EngineError;

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 500;
const MARGIN_LEFT: f32 = 90.0;
const MARGIN_RIGHT: f32 = 40.0;
const MARGIN_TOP: f32 = 50.0;
const MARGIN_BOTTOM: f32 = 70.0;

const SERIES: Rgb<u8> = Rgb([31, 119, 180]);
const TREND: Rgb<u8> = Rgb([214, 39, 40]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);

struct Mapper {
	y_low: f64,
	y_high: f64,
	count: usize,
}

impl Mapper {
	fn x(&self, index: usize) -> f32 {
		let usable = WIDTH as f32 - MARGIN_LEFT - MARGIN_RIGHT;
		if self.count <= 1 {
			return MARGIN_LEFT + usable / 2.0;
		}
		MARGIN_LEFT + usable * index as f32 / (self.count - 1) as f32
	}

	fn y(&self, value: f64) -> f32 {
		let usable = HEIGHT as f32 - MARGIN_TOP - MARGIN_BOTTOM;
		let span = self.y_high - self.y_low;
		let t = if span == 0.0 { 0.5 } else { (value - self.y_low) / span };
		HEIGHT as f32 - MARGIN_BOTTOM - usable * t as f32
	}
}

fn dashed_line(img: &mut RgbImage, from: (f32, f32), to: (f32, f32), color: Rgb<u8>) {
	let length = ((to.0 - from.0).powi(2) + (to.1 - from.1).powi(2)).sqrt();
	let dashes = (length / 12.0).max(1.0) as usize;
	for dash in 0..dashes {
		let t0 = dash as f32 / dashes as f32;
		let t1 = t0 + 0.5 / dashes as f32;
		draw_line_segment_mut(
			img,
			(from.0 + (to.0 - from.0) * t0, from.1 + (to.1 - from.1) * t0),
			(from.0 + (to.0 - from.0) * t1, from.1 + (to.1 - from.1) * t1),
			color,
		);
	}
}

/// Writes the trend chart for the per-scene values of a batch run.
///
/// `values[i]` belongs to `dates[i]`; the trend is `slope * i + intercept`.
pub fn write_trend_plot(
	dates: &[NaiveDate],
	values: &[f64],
	trend: (f64, f64),
	operation: &str,
	output: &Path,
) -> Result<()> {
	if dates.len() != values.len() || dates.is_empty() {
		return Err(EngineError::render(format!(
			"trend plot needs matching dates and values, got {} and {}",
			dates.len(),
			values.len()
		)));
	}

	let (slope, intercept) = trend;
	let trend_values: Vec<f64> = (0..values.len()).map(|i| slope * i as f64 + intercept).collect();

	let mut y_low = f64::INFINITY;
	let mut y_high = f64::NEG_INFINITY;
	for &value in values.iter().chain(trend_values.iter()) {
		if value.is_finite() {
			y_low = y_low.min(value);
			y_high = y_high.max(value);
		}
	}
	if !y_low.is_finite() {
		return Err(EngineError::render("trend plot has no finite values"));
	}
	let padding = ((y_high - y_low) * 0.05).max(1e-9);
	let mapper = Mapper {
		y_low: y_low - padding,
		y_high: y_high + padding,
		count: values.len(),
	};

	let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));

	// horizontal grid with value labels
	for tick in 0..=4 {
		let value = mapper.y_low + (mapper.y_high - mapper.y_low) * tick as f64 / 4.0;
		let y = mapper.y(value);
		draw_line_segment_mut(&mut img, (MARGIN_LEFT, y), (WIDTH as f32 - MARGIN_RIGHT, y), GRID);
		draw_text(&mut img, &format!("{value:>9.3}"), 4, y as u32, 1, AXIS);
	}

	// axes
	draw_line_segment_mut(
		&mut img,
		(MARGIN_LEFT, MARGIN_TOP),
		(MARGIN_LEFT, HEIGHT as f32 - MARGIN_BOTTOM),
		AXIS,
	);
	draw_line_segment_mut(
		&mut img,
		(MARGIN_LEFT, HEIGHT as f32 - MARGIN_BOTTOM),
		(WIDTH as f32 - MARGIN_RIGHT, HEIGHT as f32 - MARGIN_BOTTOM),
		AXIS,
	);

	// x tick labels, thinned to stay readable
	let step = (dates.len() / 8).max(1);
	for (index, date) in dates.iter().enumerate().step_by(step) {
		let x = mapper.x(index);
		draw_line_segment_mut(
			&mut img,
			(x, HEIGHT as f32 - MARGIN_BOTTOM),
			(x, HEIGHT as f32 - MARGIN_BOTTOM + 5.0),
			AXIS,
		);
		let text = date.format("%Y-%m-%d").to_string();
		let text_x = (x as u32).saturating_sub(40);
		draw_text(&mut img, &text, text_x, HEIGHT - MARGIN_BOTTOM as u32 + 12, 1, AXIS);
	}

	// series with markers
	for (index, &value) in values.iter().enumerate() {
		if !value.is_finite() {
			continue;
		}
		let point = (mapper.x(index), mapper.y(value));
		draw_filled_circle_mut(&mut img, (point.0 as i32, point.1 as i32), 3, SERIES);
		if index > 0 && values[index - 1].is_finite() {
			let previous = (mapper.x(index - 1), mapper.y(values[index - 1]));
			draw_line_segment_mut(&mut img, previous, point, SERIES);
		}
	}

	// dashed trend line
	for index in 1..trend_values.len() {
		dashed_line(
			&mut img,
			(mapper.x(index - 1), mapper.y(trend_values[index - 1])),
			(mapper.x(index), mapper.y(trend_values[index])),
			TREND,
		);
	}

	let title = format!("{operation} value over time");
	draw_text(&mut img, &title, MARGIN_LEFT as u32, 16, 2, AXIS);
	draw_text(&mut img, "date", WIDTH / 2 - 16, HEIGHT - 24, 1, AXIS);

	img.save(output).with_context(|| format!("cannot write trend plot {output:?}"))?;
	Ok(())
}
