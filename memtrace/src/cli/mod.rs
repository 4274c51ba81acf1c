//! Command-line interface

pub mod args;
pub mod display;

pub use args::{parse_address, Args, Command};
