//! Reporting on the collected graph
//!
//! The scanner itself writes straight into storage; this module reads it
//! back for the `--stats` command.

pub mod stats;

pub use stats::{load_statistics, print_statistics, InstanceStatistics, ScanStatistics};
