//! Trace file framing
//!
//! A trace file is a flat sequence of items:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────┐
//! │ TraceItemHeader (32 bytes)   │ record (header.size)     │ ...
//! │ timestamp, pid, state, size, │ MEMORY / TLBMISS /       │
//! │ kind                         │ PAGEFAULT                │
//! └──────────────────────────────┴──────────────────────────┘
//! ```
//!
//! All fields are in the native byte order of the machine that wrote the
//! trace.

pub mod reader;
pub mod writer;

pub use reader::{TraceItem, TraceReader, TraceRecord};
pub use writer::TraceFileWriter;
