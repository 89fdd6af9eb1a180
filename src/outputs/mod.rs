//! Output generation.
//!
//! - [`json`]: writes the run's [`crate::models::Report`] as a dated JSON file

pub mod json;
