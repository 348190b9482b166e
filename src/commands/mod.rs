//! Command implementations for the CLI
//!
//! This module contains the implementation of all CLI commands:
//! - start: Start the monitor server
//! - config: Configuration display and validation
//! - normalize: Show how a query is normalized and hashed
//! - top: Print the top query shapes as a table
//! - cleanup: Apply raw log retention now

pub mod cleanup;
pub mod config;
pub mod normalize;
pub mod start;
pub mod top;
