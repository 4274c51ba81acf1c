//! Configuration file loading
//!
//! ```json
//! {
//!   "memoryTracer": {
//!     "monitorStack": false,
//!     "catchAccessesAbove": 0,
//!     "timeTrigger": 0,
//!     "monitorMemory": true,
//!     "monitorPageFaults": false,
//!     "monitorTlbMisses": false,
//!     "stackWindow": 262144
//!   },
//!   "library": {
//!     "searchPath": "/guest/system32:/guest/app:",
//!     "kernelStart": 2147483648
//!   }
//! }
//! ```
//!
//! Every key is optional.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::domain::ConfigError;
use crate::symbolization::{LibraryResolver, DEFAULT_KERNEL_START};
use crate::tracer::FilterPolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub memory_tracer: FilterPolicy,
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibraryConfig {
    /// `:`-separated directories searched for module binaries
    pub search_path: String,
    /// First kernel-space address
    pub kernel_start: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self { search_path: String::new(), kernel_start: DEFAULT_KERNEL_START }
    }
}

impl LibraryConfig {
    /// Resolver using this configuration's search path
    #[must_use]
    pub fn resolver(&self) -> LibraryResolver {
        let mut resolver = LibraryResolver::new();
        resolver.set_search_path(&self.search_path);
        resolver
    }
}

impl Config {
    /// Load and validate a JSON config file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, does not parse, or fails
    /// [`Config::validate`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns an error for a stack window that is not a power of two, or a
    /// search path that cannot name a directory
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = self.memory_tracer.stack_window;
        if !window.is_power_of_two() {
            return Err(ConfigError::InvalidStackWindow(window));
        }
        if self.library.search_path.contains('\0') {
            return Err(ConfigError::InvalidSearchPath);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::DEFAULT_STACK_WINDOW;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memtrace.json");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let (_dir, path) = write_config("{}");
        let config = Config::from_file(&path).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.library.kernel_start, 0x8000_0000);
        assert_eq!(config.memory_tracer.stack_window, DEFAULT_STACK_WINDOW);
        assert!(!config.memory_tracer.monitor_memory);
    }

    #[test]
    fn test_full_config() {
        let (_dir, path) = write_config(
            r#"{
                "memoryTracer": { "monitorStack": true, "catchAccessesAbove": 65536,
                                  "timeTrigger": 10, "monitorMemory": true },
                "library": { "searchPath": "/a:/b:", "kernelStart": 3221225472 }
            }"#,
        );
        let config = Config::from_file(&path).unwrap();

        assert!(config.memory_tracer.monitor_stack);
        assert_eq!(config.memory_tracer.catch_above, 0x1_0000);
        assert_eq!(config.memory_tracer.time_trigger, 10);
        assert_eq!(config.library.kernel_start, 0xc000_0000);
        assert_eq!(config.library.resolver().search_path(), ["/a", "/b", ""]);
    }

    #[test]
    fn test_rejects_bad_stack_window() {
        let (_dir, path) = write_config(r#"{ "memoryTracer": { "stackWindow": 3000 } }"#);
        assert!(matches!(Config::from_file(&path), Err(ConfigError::InvalidStackWindow(3000))));
    }

    #[test]
    fn test_rejects_nul_in_search_path() {
        let (_dir, path) = write_config(r#"{ "library": { "searchPath": "/guest\u0000/system32" } }"#);
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSearchPath));

        let mut config = Config::default();
        config.library.search_path = "/a:\0".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSearchPath)));
    }

    #[test]
    fn test_reports_parse_errors_with_path() {
        let (_dir, path) = write_config("{ invalid");
        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains("memtrace.json"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/memtrace.json"),
            Err(ConfigError::Io { .. })
        ));
    }
}
