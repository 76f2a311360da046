//! Data layer: domain models and the row-oriented persistence capability.

pub mod backend;
pub mod config;
pub mod memory;
pub mod models;
