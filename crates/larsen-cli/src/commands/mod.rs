//! CLI subcommand implementations.

pub mod analyze;
pub mod devices;
pub mod live;
