//! CLI surface for linkwatch.

pub mod args;

pub use args::{parse_args, CliCommand};
