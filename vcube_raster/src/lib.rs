//! Raster I/O for the vcube engine.
//!
//! Wraps GDAL for everything that touches pixels: windowed reads from remote
//! COGs (HTTP range reads through `/vsicurl/`), XYZ tile reads in
//! Web-Mercator, and GeoTIFF emission.

pub mod geotiff;
pub use geotiff::{NODATA, read_geotiff, write_geotiff};
pub mod reader;
pub use reader::{WindowRead, probe_pixel_size, read_window, read_window_harmonized};
pub mod tile;
pub use tile::read_tile;
pub mod transform;
pub mod window;
pub use window::PixelWindow;
