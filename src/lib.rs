//! AIS vessel tracker
//!
//! Ingests position reports from a streaming feed into a spatial store and
//! serves bounding box queries over the latest known positions.

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod geo;
pub mod maintenance;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod stream;
