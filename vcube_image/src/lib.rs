//! Image output for the vcube engine.
//!
//! Turns aggregated float arrays into colorized PNGs, assembles the per-scene
//! animation, and renders the time-series trend chart.

pub mod colormap;
pub use colormap::Colormap;
pub mod gif;
pub use gif::write_gif;
pub mod label;
pub use label::{draw_label, draw_text};
pub mod plot;
pub use plot::write_trend_plot;
pub mod render;
pub use render::{colorize, compose_rgb, png_bytes, to_image};
