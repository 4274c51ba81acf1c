//! Structured error types for memtrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

/// Why a binary could not be turned into a symbolizer
///
/// Callers of the resolver's `Option`-returning operations never see these;
/// they only surface from `load_by_name` / `load_by_path`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("{0} not found in any search path directory")]
    NotFound(String),

    #[error("Failed to open debug info for {}", .0.display())]
    OpenFailure(PathBuf),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Invalid config file {}: {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },

    #[error("stackWindow must be a non-zero power of two, got {0:#x}")]
    InvalidStackWindow(u64),

    #[error("searchPath contains a NUL byte")]
    InvalidSearchPath,
}

#[derive(Error, Debug)]
pub enum TraceFileError {
    #[error("Trace ends inside an item header ({0} of {1} bytes)")]
    TruncatedHeader(usize, usize),

    #[error("Trace ends inside an item payload ({0} of {1} bytes)")]
    TruncatedPayload(usize, usize),

    #[error("Item of kind {kind} has size {size}, expected {expected}")]
    SizeMismatch { kind: u8, size: u32, expected: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_display() {
        let err = ResolveError::NotFound("libc.so.6".to_string());
        assert_eq!(err.to_string(), "libc.so.6 not found in any search path directory");

        let err = ResolveError::OpenFailure(PathBuf::from("/lib/broken.so"));
        assert!(err.to_string().contains("/lib/broken.so"));
    }

    #[test]
    fn test_size_mismatch_display() {
        let err = TraceFileError::SizeMismatch { kind: 1, size: 8, expected: 32 };
        assert_eq!(err.to_string(), "Item of kind 1 has size 8, expected 32");
    }
}
