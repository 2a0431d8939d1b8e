mod geo_bbox;
pub use geo_bbox::GeoBBox;
mod scene;
pub use scene::Scene;
#[cfg(test)]
pub use scene::fixtures as scene_fixtures;
mod sensor;
pub use sensor::Sensor;
mod tile_coord;
pub use tile_coord::TileCoord;
