//! Filtering, rendering and caching of the school map.

pub mod cache;
pub mod filter;
pub mod render;
