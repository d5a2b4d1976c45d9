//! # Mosaic Common Library
//!
//! Shared code for the Mosaic discovery workspace:
//! - Error and result types
//! - Configuration loading (TOML bootstrap, environment overrides, compiled defaults)
//! - Refresh event bus
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
