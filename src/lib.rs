//! Documentation Q&A assistant service - Library exports for testing
//!
//! (c) Softlandia 2025

pub mod api;
pub mod config;
pub mod core;
pub mod errors;
pub mod infrastructure;
