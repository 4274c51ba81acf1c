//! Analysis logic for recorded traces
//!
//! This module contains pure business logic for analyzing trace files,
//! separated from the CLI presentation layer.

pub mod access_profile;

pub use access_profile::{symbolize, AccessHotspot, AccessProfile, SiteCounts};
