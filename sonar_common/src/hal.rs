//! Hardware abstraction layer contract and configuration.
//!
//! This module contains the digital I/O trait the scanner core drives,
//! the shared HAL types, and the scanner configuration.

pub mod config;
pub mod driver;
pub mod types;
