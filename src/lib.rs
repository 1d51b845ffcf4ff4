//! Quire: article collection and rendered-body caches for a small publishing
//! server, plus the store, HTTP surface and runtime plumbing around them.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
