//! Application services layer: repository seams, rendering and error types.

pub mod error;
pub mod render;
pub mod repos;
