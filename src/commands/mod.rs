//! CLI command implementations for procgroup-exporter.
//!
//! - `check`: configuration and procfs validation
//! - `config`: configuration file generation
//! - `test`: run aggregation passes and print the groups
//! - `rules`: list the compiled rules

pub mod check;
pub mod config;
pub mod rules;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use rules::command_rules;
pub use test::command_test;
