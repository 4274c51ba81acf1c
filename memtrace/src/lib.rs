//! # memtrace
//!
//! Selective memory tracing for a whole-system execution engine, plus the
//! offline tooling to read, rank and symbolize the recorded traces.
//!
//! ## Architecture
//!
//! ```text
//! engine events ──► tracer (filter ─► recorder) ──► trace_file (writer)
//!                                                        │
//!                    trace_file (reader) ◄───────────────┘
//!                          │
//!                          ▼
//!                  analysis::AccessProfile ──► symbolization::LibraryResolver
//! ```
//!
//! - [`tracer`]: arming state machine, address admission and record emission
//! - [`trace_file`]: framed on-disk item stream
//! - [`symbolization`]: module debug info loading, caching and pc translation
//! - [`analysis`]: per-instruction aggregation of recorded items
//! - [`config`]: JSON configuration
//! - [`domain`]: shared types and errors

pub mod analysis;
pub mod cli;
pub mod config;
pub mod domain;
pub mod symbolization;
pub mod trace_file;
pub mod tracer;
