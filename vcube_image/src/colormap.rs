//! Named colormaps.
//!
//! A small set of matplotlib-compatible gradients, each stored as evenly
//! spaced RGB anchors that are linearly interpolated at sample time. The
//! default map is `RdYlGn`, the classic vegetation-index ramp.

use anyhow::Result;
use vcube_core::EngineError;

type Anchors = &'static [[u8; 3]];

static RD_YL_GN: Anchors = &[
	[165, 0, 38],
	[215, 48, 39],
	[244, 109, 67],
	[253, 174, 97],
	[254, 224, 139],
	[255, 255, 191],
	[217, 239, 139],
	[166, 217, 106],
	[102, 189, 99],
	[26, 152, 80],
	[0, 104, 55],
];

static SPECTRAL: Anchors = &[
	[158, 1, 66],
	[213, 62, 79],
	[244, 109, 67],
	[253, 174, 97],
	[254, 224, 139],
	[255, 255, 191],
	[230, 245, 152],
	[171, 221, 164],
	[102, 194, 165],
	[50, 136, 189],
	[94, 79, 162],
];

static RD_BU: Anchors = &[
	[103, 0, 31],
	[178, 24, 43],
	[214, 96, 77],
	[244, 165, 130],
	[253, 219, 199],
	[247, 247, 247],
	[209, 229, 240],
	[146, 197, 222],
	[67, 147, 195],
	[33, 102, 172],
	[5, 48, 97],
];

static VIRIDIS: Anchors = &[
	[68, 1, 84],
	[72, 40, 120],
	[62, 74, 137],
	[49, 104, 142],
	[38, 130, 142],
	[31, 158, 137],
	[53, 183, 121],
	[109, 205, 89],
	[180, 222, 44],
	[253, 231, 37],
];

static PLASMA: Anchors = &[
	[13, 8, 135],
	[84, 2, 163],
	[139, 10, 165],
	[185, 50, 137],
	[219, 92, 104],
	[244, 136, 73],
	[254, 188, 43],
	[240, 249, 33],
];

static INFERNO: Anchors = &[
	[0, 0, 4],
	[40, 11, 84],
	[101, 21, 110],
	[159, 42, 99],
	[212, 72, 66],
	[245, 125, 21],
	[250, 193, 39],
	[252, 255, 164],
];

static MAGMA: Anchors = &[
	[0, 0, 4],
	[42, 13, 84],
	[114, 31, 129],
	[183, 55, 121],
	[240, 112, 74],
	[254, 176, 120],
	[252, 253, 191],
];

static COOLWARM: Anchors = &[
	[59, 76, 192],
	[144, 178, 254],
	[221, 221, 221],
	[246, 147, 104],
	[180, 4, 38],
];

static GREYS: Anchors = &[[255, 255, 255], [0, 0, 0]];

static REGISTRY: &[(&str, Anchors)] = &[
	("RdYlGn", RD_YL_GN),
	("Spectral", SPECTRAL),
	("RdBu", RD_BU),
	("viridis", VIRIDIS),
	("plasma", PLASMA),
	("inferno", INFERNO),
	("magma", MAGMA),
	("coolwarm", COOLWARM),
	("Greys", GREYS),
];

#[derive(Clone, Copy, Debug)]
pub struct Colormap {
	name: &'static str,
	anchors: Anchors,
}

impl Colormap {
	pub fn by_name(name: &str) -> Result<Colormap> {
		REGISTRY
			.iter()
			.find(|(known, _)| *known == name)
			.map(|(known, anchors)| Colormap { name: known, anchors })
			.ok_or_else(|| {
				let names: Vec<&str> = REGISTRY.iter().map(|(name, _)| *name).collect();
				EngineError::Validation(format!("unknown colormap '{name}', choose one of: {}", names.join(", "))).into()
			})
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn names() -> Vec<&'static str> {
		REGISTRY.iter().map(|(name, _)| *name).collect()
	}

	/// Samples the gradient at `t` in [0, 1]. Out-of-range values clamp,
	/// NaN maps to black (the "bad value" color).
	pub fn sample(&self, t: f64) -> [u8; 3] {
		if t.is_nan() {
			return [0, 0, 0];
		}
		let t = t.clamp(0.0, 1.0);
		let segments = (self.anchors.len() - 1) as f64;
		let position = t * segments;
		let index = (position.floor() as usize).min(self.anchors.len() - 2);
		let fraction = position - index as f64;

		let low = self.anchors[index];
		let high = self.anchors[index + 1];
		let mut rgb = [0u8; 3];
		for channel in 0..3 {
			let value = low[channel] as f64 + (high[channel] as f64 - low[channel] as f64) * fraction;
			rgb[channel] = value.round() as u8;
		}
		rgb
	}
}

impl Default for Colormap {
	fn default() -> Colormap {
		Colormap {
			name: "RdYlGn",
			anchors: RD_YL_GN,
		}
	}
}
