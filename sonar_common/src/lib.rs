//! Sonar Common Library
//!
//! This crate provides shared constants, configuration loading and the
//! hardware contract for all sonar workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Motor, sensor and scan defaults
//! - [`config`] - Configuration loading traits and types
//! - [`hal`] - Digital I/O contract, HAL types and scanner configuration
//! - [`scan`] - Measurement and scan data model
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use sonar_common::prelude::*;
//!
//! let config = ScannerConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(Direction::Clockwise.sign(), 1);
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod scan;
