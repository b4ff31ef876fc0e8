//! CLI command implementations for hostmon.
//!
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `test`: Metrics collection testing

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use test::command_test;
