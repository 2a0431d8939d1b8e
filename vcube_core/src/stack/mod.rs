//! Time-axis stacking and NaN-aware reduction of per-scene result arrays.
//!
//! Per-scene arrays may differ by a pixel or two due to window rounding, so
//! they are padded to the element-wise maximum shape with NaN before
//! stacking. NaN is the only missing-value sentinel; every reducer ignores
//! non-finite cells.

use crate::error::EngineError;
use anyhow::Result;
use ndarray::{Array3, Array4, s};
use std::fmt::{self, Display};
use std::str::FromStr;

/// The reduction applied along the time axis.
///
/// `Mode` is only offered on the aggregation API itself; the request
/// surfaces validate against the seven statistical operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reducer {
	Mean,
	Median,
	Min,
	Max,
	Std,
	Sum,
	Var,
	Mode,
}

impl Reducer {
	pub fn as_str(&self) -> &'static str {
		match self {
			Reducer::Mean => "mean",
			Reducer::Median => "median",
			Reducer::Min => "min",
			Reducer::Max => "max",
			Reducer::Std => "std",
			Reducer::Sum => "sum",
			Reducer::Var => "var",
			Reducer::Mode => "mode",
		}
	}

	/// Reduces one pixel's time series. `values` must only contain finite
	/// samples; an empty series reduces to NaN.
	pub fn reduce(&self, values: &mut Vec<f64>) -> f64 {
		if values.is_empty() {
			return f64::NAN;
		}
		let n = values.len() as f64;
		match self {
			Reducer::Mean => values.iter().sum::<f64>() / n,
			Reducer::Sum => values.iter().sum(),
			Reducer::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
			Reducer::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
			Reducer::Var => {
				let mean = values.iter().sum::<f64>() / n;
				values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
			}
			Reducer::Std => Reducer::Var.reduce(values).sqrt(),
			Reducer::Median => {
				values.sort_by(|a, b| a.partial_cmp(b).unwrap());
				let middle = values.len() / 2;
				if values.len() % 2 == 1 {
					values[middle]
				} else {
					(values[middle - 1] + values[middle]) / 2.0
				}
			}
			Reducer::Mode => {
				values.sort_by(|a, b| a.partial_cmp(b).unwrap());
				let mut best = values[0];
				let mut best_count = 0usize;
				let mut run_value = values[0];
				let mut run_count = 0usize;
				for &value in values.iter() {
					if value == run_value {
						run_count += 1;
					} else {
						run_value = value;
						run_count = 1;
					}
					// ties resolve to the smallest value
					if run_count > best_count {
						best = run_value;
						best_count = run_count;
					}
				}
				best
			}
		}
	}
}

impl FromStr for Reducer {
	type Err = anyhow::Error;

	fn from_str(input: &str) -> Result<Reducer> {
		Ok(match input {
			"mean" => Reducer::Mean,
			"median" => Reducer::Median,
			"min" => Reducer::Min,
			"max" => Reducer::Max,
			"std" => Reducer::Std,
			"sum" => Reducer::Sum,
			"var" => Reducer::Var,
			"mode" => Reducer::Mode,
			other => {
				return Err(EngineError::validation(format!(
					"invalid operation '{other}'. Choose from 'mean', 'median', 'max', 'min', 'std', 'sum', 'var'"
				)));
			}
		})
	}
}

impl Display for Reducer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The element-wise maximum of all array shapes.
pub fn max_shape(arrays: &[Array3<f64>]) -> (usize, usize, usize) {
	arrays.iter().fold((0, 0, 0), |acc, array| {
		let dim = array.dim();
		(acc.0.max(dim.0), acc.1.max(dim.1), acc.2.max(dim.2))
	})
}

/// Pads an array with NaN on the trailing edge of every axis.
pub fn pad_to(array: &Array3<f64>, shape: (usize, usize, usize)) -> Array3<f64> {
	let dim = array.dim();
	if dim == shape {
		return array.clone();
	}
	let mut padded = Array3::from_elem(shape, f64::NAN);
	padded.slice_mut(s![..dim.0, ..dim.1, ..dim.2]).assign(array);
	padded
}

/// Stacks per-scene arrays along a leading time axis, padding each to the
/// common maximum shape.
pub fn stack_time(arrays: &[Array3<f64>]) -> Result<Array4<f64>> {
	if arrays.is_empty() {
		return Err(EngineError::no_results("cannot stack an empty scene list"));
	}
	let shape = max_shape(arrays);
	let mut stack = Array4::from_elem((arrays.len(), shape.0, shape.1, shape.2), f64::NAN);
	for (index, array) in arrays.iter().enumerate() {
		let dim = array.dim();
		stack
			.slice_mut(s![index, ..dim.0, ..dim.1, ..dim.2])
			.assign(array);
	}
	Ok(stack)
}

/// Reduces a `(T, B, H, W)` stack along the time axis.
pub fn reduce_time(stack: &Array4<f64>, reducer: Reducer) -> Array3<f64> {
	let (t, bands, height, width) = stack.dim();
	let mut result = Array3::from_elem((bands, height, width), f64::NAN);
	let mut values = Vec::with_capacity(t);
	for band in 0..bands {
		for row in 0..height {
			for col in 0..width {
				values.clear();
				for time in 0..t {
					let value = stack[[time, band, row, col]];
					if value.is_finite() {
						values.push(value);
					}
				}
				result[[band, row, col]] = reducer.reduce(&mut values);
			}
		}
	}
	result
}

/// Reduces a whole per-scene array to one scalar (the spatial collapse used
/// for the time-series trend).
pub fn reduce_all(array: &Array3<f64>, reducer: Reducer) -> f64 {
	let mut values: Vec<f64> = array.iter().cloned().filter(|v| v.is_finite()).collect();
	reducer.reduce(&mut values)
}

/// Least-squares degree-1 fit of `values` against their ordinals, returning
/// `(slope, intercept)`.
pub fn linear_trend(values: &[f64]) -> (f64, f64) {
	let n = values.len() as f64;
	if values.len() < 2 {
		return (0.0, values.first().copied().unwrap_or(f64::NAN));
	}
	let mean_x = (n - 1.0) / 2.0;
	let mean_y = values.iter().sum::<f64>() / n;
	let mut numerator = 0.0;
	let mut denominator = 0.0;
	for (index, &value) in values.iter().enumerate() {
		let dx = index as f64 - mean_x;
		numerator += dx * (value - mean_y);
		denominator += dx * dx;
	}
	let slope = numerator / denominator;
	(slope, mean_y - slope * mean_x)
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;
	use ndarray::{Array3, array};
	use rstest::rstest;

	fn layer(values: [[f64; 2]; 2]) -> Array3<f64> {
		let flat: Vec<f64> = values.iter().flatten().cloned().collect();
		Array3::from_shape_vec((1, 2, 2), flat).unwrap()
	}

	#[test]
	fn operation_names_round_trip() {
		for name in ["mean", "median", "min", "max", "std", "sum", "var", "mode"] {
			assert_eq!(name.parse::<Reducer>().unwrap().as_str(), name);
		}
		assert!("foo".parse::<Reducer>().is_err());
	}

	#[rstest]
	#[case(Reducer::Mean, 2.0)]
	#[case(Reducer::Median, 2.0)]
	#[case(Reducer::Min, 1.0)]
	#[case(Reducer::Max, 3.0)]
	#[case(Reducer::Sum, 6.0)]
	#[case(Reducer::Var, 2.0 / 3.0)]
	fn scalar_reductions(#[case] reducer: Reducer, #[case] expected: f64) {
		let mut values = vec![3.0, 1.0, 2.0];
		assert_abs_diff_eq!(reducer.reduce(&mut values), expected, epsilon = 1e-12);
	}

	#[test]
	fn std_is_sqrt_of_var() {
		let mut values = vec![3.0, 1.0, 2.0];
		let std = Reducer::Std.reduce(&mut values.clone());
		let var = Reducer::Var.reduce(&mut values);
		assert_abs_diff_eq!(std, var.sqrt(), epsilon = 1e-12);
	}

	#[test]
	fn median_of_even_count_averages_the_middles() {
		let mut values = vec![4.0, 1.0, 3.0, 2.0];
		assert_eq!(Reducer::Median.reduce(&mut values), 2.5);
	}

	#[test]
	fn mode_picks_most_frequent_smallest_on_tie() {
		let mut values = vec![2.0, 1.0, 2.0, 3.0, 1.0];
		assert_eq!(Reducer::Mode.reduce(&mut values), 1.0);
		let mut values = vec![5.0, 5.0, 7.0];
		assert_eq!(Reducer::Mode.reduce(&mut values), 5.0);
	}

	#[test]
	fn empty_series_reduce_to_nan() {
		for reducer in [Reducer::Mean, Reducer::Median, Reducer::Mode, Reducer::Std] {
			assert!(reducer.reduce(&mut vec![]).is_nan());
		}
	}

	#[test]
	fn padding_fills_trailing_edges_with_nan() {
		let array = layer([[1.0, 2.0], [3.0, 4.0]]);
		let padded = pad_to(&array, (1, 3, 3));
		assert_eq!(padded.dim(), (1, 3, 3));
		assert_eq!(padded[[0, 0, 0]], 1.0);
		assert_eq!(padded[[0, 1, 1]], 4.0);
		assert!(padded[[0, 2, 0]].is_nan());
		assert!(padded[[0, 0, 2]].is_nan());
	}

	#[test]
	fn stacking_pads_to_the_common_shape() {
		let small = Array3::from_shape_vec((1, 1, 2), vec![9.0, 8.0]).unwrap();
		let large = layer([[1.0, 2.0], [3.0, 4.0]]);
		let stack = stack_time(&[small, large]).unwrap();
		assert_eq!(stack.dim(), (2, 1, 2, 2));
		assert_eq!(stack[[0, 0, 0, 0]], 9.0);
		assert!(stack[[0, 0, 1, 0]].is_nan());
		assert_eq!(stack[[1, 0, 1, 1]], 4.0);
	}

	#[test]
	fn padded_cells_do_not_poison_reductions() {
		let small = Array3::from_shape_vec((1, 1, 2), vec![10.0, 20.0]).unwrap();
		let large = layer([[2.0, 4.0], [6.0, 8.0]]);
		let stack = stack_time(&[small, large]).unwrap();

		let mean = reduce_time(&stack, Reducer::Mean);
		assert_eq!(mean[[0, 0, 0]], 6.0);
		assert_eq!(mean[[0, 0, 1]], 12.0);
		// only the large layer covers the second row
		assert_eq!(mean[[0, 1, 0]], 6.0);
	}

	#[rstest]
	#[case(Reducer::Mean)]
	#[case(Reducer::Median)]
	#[case(Reducer::Min)]
	#[case(Reducer::Max)]
	#[case(Reducer::Std)]
	#[case(Reducer::Sum)]
	#[case(Reducer::Var)]
	#[case(Reducer::Mode)]
	fn single_scene_aggregate_is_identity_where_finite(#[case] reducer: Reducer) {
		let only = layer([[1.5, 2.5], [3.5, f64::NAN]]);
		let stack = stack_time(std::slice::from_ref(&only)).unwrap();
		let reduced = reduce_time(&stack, reducer);

		match reducer {
			Reducer::Std => {
				assert_eq!(reduced[[0, 0, 0]], 0.0);
				assert_eq!(reduced[[0, 0, 1]], 0.0);
			}
			Reducer::Var => {
				assert_eq!(reduced[[0, 0, 0]], 0.0);
			}
			_ => {
				assert_eq!(reduced[[0, 0, 0]], 1.5);
				assert_eq!(reduced[[0, 0, 1]], 2.5);
				assert_eq!(reduced[[0, 1, 0]], 3.5);
			}
		}
		assert!(reduced[[0, 1, 1]].is_nan());
	}

	#[test]
	fn all_nan_column_stays_nan() {
		let a = layer([[f64::NAN, 1.0], [1.0, 1.0]]);
		let b = layer([[f64::NAN, 2.0], [2.0, 2.0]]);
		let stack = stack_time(&[a, b]).unwrap();
		let median = reduce_time(&stack, Reducer::Median);
		assert!(median[[0, 0, 0]].is_nan());
		assert_eq!(median[[0, 0, 1]], 1.5);
	}

	#[test]
	fn spatial_collapse_ignores_nan() {
		let array = layer([[1.0, 3.0], [f64::NAN, 5.0]]);
		assert_eq!(reduce_all(&array, Reducer::Mean), 3.0);
		assert_eq!(reduce_all(&array, Reducer::Max), 5.0);
	}

	#[test]
	fn trend_of_a_line_recovers_slope_and_intercept() {
		let values = vec![1.0, 3.0, 5.0, 7.0];
		let (slope, intercept) = linear_trend(&values);
		assert_abs_diff_eq!(slope, 2.0, epsilon = 1e-12);
		assert_abs_diff_eq!(intercept, 1.0, epsilon = 1e-12);
	}

	#[test]
	fn trend_of_noisy_values_is_least_squares() {
		let values = vec![0.0, 2.0, 1.0, 3.0];
		let (slope, intercept) = linear_trend(&values);
		assert_abs_diff_eq!(slope, 0.8, epsilon = 1e-12);
		assert_abs_diff_eq!(intercept, 0.3, epsilon = 1e-12);
	}

	#[test]
	fn trend_degenerate_inputs() {
		assert_eq!(linear_trend(&[4.2]), (0.0, 4.2));
		let (slope, intercept) = linear_trend(&[]);
		assert_eq!(slope, 0.0);
		assert!(intercept.is_nan());
	}

	#[test]
	fn multiband_stacks_reduce_per_band() {
		let scene = Array3::from_shape_vec((2, 1, 1), vec![1.0, 10.0]).unwrap();
		let other = Array3::from_shape_vec((2, 1, 1), vec![3.0, 30.0]).unwrap();
		let stack = stack_time(&[scene, other]).unwrap();
		let mean = reduce_time(&stack, Reducer::Mean);
		assert_eq!(mean, array![[[2.0]], [[20.0]]]);
	}
}
