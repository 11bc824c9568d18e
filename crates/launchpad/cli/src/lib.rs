//! Launchpad CLI utilities
//!
//! Parses the operator's launch file into the library's configuration types.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod launch_file;

pub use launch_file::{LaunchFile, default_root, parse_launch_file};
