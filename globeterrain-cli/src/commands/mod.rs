//! CLI command implementations.

pub mod build_extremes;
pub mod common;
pub mod compose;
pub mod config;
pub mod convert;
pub mod elevation;
pub mod extremes;
