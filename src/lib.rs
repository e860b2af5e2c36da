//! Quantkit - drive the pixel pipeline from the command line
//!
//! Generates synthetic test patterns, converts them with a configured
//! quantizer and ditherer and reports on the result.
//! This library exposes modules for integration testing.

pub mod error;
pub mod models;
pub mod services;
