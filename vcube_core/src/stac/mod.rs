//! STAC catalog access.
//!
//! The async client serves the request tier, the blocking client serves
//! plain command-line calls. Both share the request-body construction and
//! the pagination handling in [`query`].

mod blocking_client;
pub mod query;
pub use blocking_client::BlockingCatalogClient;
pub use query::{SearchArea, SearchQuery};
mod client;
pub use client::CatalogClient;
