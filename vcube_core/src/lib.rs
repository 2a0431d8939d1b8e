//! Core types and algorithms of the vcube engine.
//!
//! Contains the domain model (bounding boxes, tile coordinates, scene
//! descriptors, sensor capabilities), the STAC catalog client, the scene
//! filters, the band-math formula parser and the time-stack aggregation.

pub mod error;
pub use error::*;
pub mod filter;
pub mod formula;
pub use formula::Formula;
pub mod sink;
pub use sink::JobSink;
pub mod stac;
pub mod stack;
pub use stack::Reducer;
pub mod types;
pub use types::*;
