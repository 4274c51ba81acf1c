//! Library lookup and debug-info caching
//!
//! [`LibraryResolver`] maps a module name to a [`DebugInfoProvider`] by
//! walking an ordered search path, then caches the outcome per absolute path:
//! a binary is opened at most once per resolver, and a binary that failed to
//! open is never retried.
//!
//! ## Concurrency
//!
//! The resolver is `Sync`. Every absolute path owns one once-initialized
//! slot. The cache lock is only held while fetching or creating the slot, so
//! opening one binary never blocks lookups of another. When several threads
//! ask for the same path at once, exactly one runs the open and the others
//! wait for its final outcome.

// String formatting intentionally uses format! for clarity
#![allow(clippy::format_push_string)]

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use super::address_space::relative_address;
use super::symbolizer::{DebugInfoLoader, DebugInfoProvider, DwarfLoader};
use crate::domain::{ModuleInstance, ResolveError, SourceInfo};

/// Final outcome of opening one binary
#[derive(Clone)]
enum LoadOutcome {
    Loaded(Arc<dyn DebugInfoProvider>),
    /// Negative cache entry
    Failed,
}

type Slot = Arc<OnceLock<LoadOutcome>>;

/// Which parts of a source location [`LibraryResolver::format_location`] renders
///
/// Parts are always emitted in the order file, `:line`, ` - function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationFormat {
    pub file: bool,
    pub line: bool,
    pub function: bool,
}

impl LocationFormat {
    pub const FULL: Self = Self { file: true, line: true, function: true };

    #[must_use]
    pub fn render(&self, info: &SourceInfo) -> String {
        let mut out = String::new();
        if self.file {
            out.push_str(&info.file);
        }
        if self.line {
            out.push_str(&format!(":{}", info.line));
        }
        if self.function {
            out.push_str(&format!(" - {}", info.function));
        }
        out
    }
}

impl Default for LocationFormat {
    fn default() -> Self {
        Self::FULL
    }
}

/// Search-path driven cache of opened binaries
pub struct LibraryResolver {
    search_path: Vec<String>,
    loader: Box<dyn DebugInfoLoader>,
    binaries: Mutex<HashMap<PathBuf, Slot>>,
}

impl LibraryResolver {
    /// Resolver opening binaries with DWARF debug info
    #[must_use]
    pub fn new() -> Self {
        Self::with_loader(DwarfLoader)
    }

    #[must_use]
    pub fn with_loader(loader: impl DebugInfoLoader + 'static) -> Self {
        Self { search_path: Vec::new(), loader: Box::new(loader), binaries: Mutex::new(HashMap::new()) }
    }

    /// Replace the search path with the `:`-separated directories of `spec`
    ///
    /// Empty segments are kept. An empty directory resolves names relative to
    /// the current working directory.
    pub fn set_search_path(&mut self, spec: &str) {
        debug!("Search path: {spec}");
        self.search_path = spec.split(':').map(str::to_string).collect();
        for dir in &self.search_path {
            debug!("  search dir {dir:?}");
        }
    }

    #[must_use]
    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    /// First `<dir>/<name>` along the search path that can be opened
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let found = self
            .search_path
            .iter()
            .map(|dir| candidate_path(dir, name))
            .find(|candidate| File::open(candidate).is_ok());

        if found.is_none() {
            debug!("{name} not found in search path");
        }
        found
    }

    /// Open the binary at `path` unless its outcome is already cached
    ///
    /// # Errors
    /// Returns [`ResolveError::OpenFailure`] if the binary failed to open,
    /// now or on an earlier call.
    pub fn load_by_path(&self, path: &Path) -> Result<(), ResolveError> {
        match self.outcome(path) {
            LoadOutcome::Loaded(_) => Ok(()),
            LoadOutcome::Failed => Err(ResolveError::OpenFailure(path.to_path_buf())),
        }
    }

    /// Find `name` along the search path and open it
    ///
    /// # Errors
    /// Returns [`ResolveError::NotFound`] if no search directory contains
    /// `name`, or [`ResolveError::OpenFailure`] if it cannot be opened.
    pub fn load_by_name(&self, name: &str) -> Result<(), ResolveError> {
        let path = self.find(name).ok_or_else(|| ResolveError::NotFound(name.to_string()))?;
        self.load_by_path(&path)
    }

    /// Provider for a module name, opening it on first use
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn DebugInfoProvider>> {
        let path = self.find(name)?;
        self.get_by_path(&path)
    }

    /// Provider for an absolute path, opening it on first use
    #[must_use]
    pub fn get_by_path(&self, path: &Path) -> Option<Arc<dyn DebugInfoProvider>> {
        match self.outcome(path) {
            LoadOutcome::Loaded(provider) => Some(provider),
            LoadOutcome::Failed => None,
        }
    }

    /// Whether `path` is in the positive cache
    #[must_use]
    pub fn is_loaded(&self, path: &Path) -> bool {
        matches!(self.cached(path), Some(LoadOutcome::Loaded(_)))
    }

    /// Whether `path` is in the negative cache
    #[must_use]
    pub fn is_known_bad(&self, path: &Path) -> bool {
        matches!(self.cached(path), Some(LoadOutcome::Failed))
    }

    /// Source location of a runtime `pc` inside a loaded module
    #[must_use]
    pub fn resolve_module_pc(&self, module: &ModuleInstance, pc: u64) -> Option<SourceInfo> {
        self.resolve(&module.name, module.load_base, module.image_base, pc)
    }

    /// Render the source location of `pc` inside `module_name`
    ///
    /// Returns `None` if the module cannot be found or opened, or if the
    /// address has no debug-info mapping.
    #[must_use]
    pub fn format_location(
        &self,
        module_name: &str,
        load_base: u64,
        image_base: u64,
        pc: u64,
        format: LocationFormat,
    ) -> Option<String> {
        self.resolve(module_name, load_base, image_base, pc).map(|info| format.render(&info))
    }

    #[must_use]
    pub fn format_module_location(
        &self,
        module: &ModuleInstance,
        pc: u64,
        format: LocationFormat,
    ) -> Option<String> {
        self.format_location(&module.name, module.load_base, module.image_base, pc, format)
    }

    fn resolve(&self, name: &str, load_base: u64, image_base: u64, pc: u64) -> Option<SourceInfo> {
        let provider = self.get(name)?;
        let rel = relative_address(pc, load_base, image_base);
        let info = provider.resolve(rel);
        if info.is_none() {
            debug!("{name}: no debug info for 0x{rel:x} (pc 0x{pc:x})");
        }
        info
    }

    fn slot(&self, path: &Path) -> Slot {
        let mut binaries = self.binaries.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(binaries.entry(path.to_path_buf()).or_default())
    }

    fn cached(&self, path: &Path) -> Option<LoadOutcome> {
        let binaries = self.binaries.lock().unwrap_or_else(PoisonError::into_inner);
        binaries.get(path).and_then(|slot| slot.get().cloned())
    }

    fn outcome(&self, path: &Path) -> LoadOutcome {
        self.slot(path).get_or_init(|| self.open(path)).clone()
    }

    fn open(&self, path: &Path) -> LoadOutcome {
        match self.loader.open(path) {
            Ok(provider) => {
                info!("Loaded debug info from {}", path.display());
                LoadOutcome::Loaded(provider)
            }
            Err(e) => {
                warn!("Failed to open {}: {e:#}", path.display());
                LoadOutcome::Failed
            }
        }
    }
}

/// `<dir>/<name>`, or the bare name for an empty directory
///
/// Concatenated rather than joined so an absolute `name` stays inside `dir`.
fn candidate_path(dir: &str, name: &str) -> PathBuf {
    if dir.is_empty() {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{dir}/{name}"))
    }
}

impl Default for LibraryResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Provider that only knows one address and records every query
    struct FakeProvider {
        known: u64,
        queries: Arc<Mutex<Vec<u64>>>,
    }

    impl DebugInfoProvider for FakeProvider {
        fn resolve(&self, addr: u64) -> Option<SourceInfo> {
            self.queries.lock().unwrap().push(addr);
            (addr == self.known).then(|| SourceInfo {
                file: "src/main.c".to_string(),
                line: 42,
                function: "main".to_string(),
            })
        }
    }

    /// Loader that fails on files containing "corrupt" and counts opens
    #[derive(Clone, Default)]
    struct FakeLoader {
        opens: Arc<AtomicUsize>,
        queries: Arc<Mutex<Vec<u64>>>,
        delay: Option<Duration>,
    }

    impl DebugInfoLoader for FakeLoader {
        fn open(&self, path: &Path) -> anyhow::Result<Arc<dyn DebugInfoProvider>> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            let contents = std::fs::read_to_string(path)?;
            if contents.contains("corrupt") {
                anyhow::bail!("no debug info");
            }
            let known = u64::from_str_radix(contents.trim(), 16)?;
            Ok(Arc::new(FakeProvider { known, queries: Arc::clone(&self.queries) }))
        }
    }

    fn write_binary(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_set_search_path_splits_in_order() {
        let mut resolver = LibraryResolver::new();
        resolver.set_search_path("/lib:/usr/lib:/opt/guest");
        assert_eq!(resolver.search_path(), ["/lib", "/usr/lib", "/opt/guest"]);
    }

    #[test]
    fn test_set_search_path_keeps_trailing_empty_segment() {
        let mut resolver = LibraryResolver::new();
        resolver.set_search_path("/lib:");
        assert_eq!(resolver.search_path(), ["/lib", ""]);

        resolver.set_search_path("");
        assert_eq!(resolver.search_path(), [""]);
    }

    #[test]
    fn test_set_search_path_replaces_previous() {
        let mut resolver = LibraryResolver::new();
        resolver.set_search_path("/a:/b");
        resolver.set_search_path("/c");
        assert_eq!(resolver.search_path(), ["/c"]);
    }

    #[test]
    fn test_find_first_directory_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write_binary(second.path(), "libfoo.so", "1000");
        let expected = write_binary(first.path(), "libfoo.so", "2000");
        write_binary(second.path(), "libbar.so", "3000");

        let mut resolver = LibraryResolver::with_loader(FakeLoader::default());
        resolver.set_search_path(&format!(
            "{}:{}",
            first.path().display(),
            second.path().display()
        ));

        assert_eq!(resolver.find("libfoo.so"), Some(expected));
        assert_eq!(resolver.find("libbar.so"), Some(second.path().join("libbar.so")));
        assert_eq!(resolver.find("libmissing.so"), None);
    }

    #[test]
    fn test_find_keeps_absolute_names_inside_search_dirs() {
        let elsewhere = tempfile::tempdir().unwrap();
        let outside = write_binary(elsewhere.path(), "app.exe", "1000");
        let outside = outside.to_str().unwrap();

        let mut resolver = LibraryResolver::with_loader(FakeLoader::default());
        resolver.set_search_path("/nonexistent-dir");
        assert_eq!(resolver.find(outside), None);
        assert!(matches!(resolver.load_by_name(outside), Err(ResolveError::NotFound(_))));

        // Found again once a search dir actually contains the path
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join(outside.trim_start_matches('/'));
        std::fs::create_dir_all(nested.parent().unwrap()).unwrap();
        std::fs::write(&nested, "1000").unwrap();
        resolver.set_search_path(root.path().to_str().unwrap());
        assert_eq!(resolver.find(outside), Some(nested));
    }

    #[test]
    fn test_load_by_name_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = LibraryResolver::with_loader(FakeLoader::default());
        resolver.set_search_path(&dir.path().display().to_string());

        assert_eq!(
            resolver.load_by_name("ghost.dll"),
            Err(ResolveError::NotFound("ghost.dll".to_string()))
        );
        assert!(resolver.get("ghost.dll").is_none());
    }

    #[test]
    fn test_load_by_path_parses_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_binary(dir.path(), "app", "401000");
        let loader = FakeLoader::default();
        let resolver = LibraryResolver::with_loader(loader.clone());

        assert_eq!(resolver.load_by_path(&path), Ok(()));
        assert_eq!(resolver.load_by_path(&path), Ok(()));
        assert!(resolver.get_by_path(&path).is_some());
        assert_eq!(loader.opens.load(Ordering::SeqCst), 1);
        assert!(resolver.is_loaded(&path));
        assert!(!resolver.is_known_bad(&path));
    }

    #[test]
    fn test_failed_open_is_never_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_binary(dir.path(), "broken.so", "corrupt");
        let loader = FakeLoader::default();
        let mut resolver = LibraryResolver::with_loader(loader.clone());
        resolver.set_search_path(&dir.path().display().to_string());

        assert_eq!(resolver.load_by_path(&path), Err(ResolveError::OpenFailure(path.clone())));
        assert!(resolver.is_known_bad(&path));
        assert!(!resolver.is_loaded(&path));

        // Repairing the file does not matter: the failure is memoized
        std::fs::write(&path, "1000").unwrap();
        assert!(resolver.load_by_path(&path).is_err());
        assert!(resolver.load_by_name("broken.so").is_err());
        assert!(resolver.get("broken.so").is_none());
        assert_eq!(loader.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_is_keyed_by_absolute_path() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let a = write_binary(first.path(), "libc.so", "1000");
        let b = write_binary(second.path(), "libc.so", "corrupt");
        let loader = FakeLoader::default();
        let resolver = LibraryResolver::with_loader(loader.clone());

        assert!(resolver.load_by_path(&b).is_err());
        assert!(resolver.load_by_path(&a).is_ok());
        assert_eq!(loader.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_resolve_module_pc_image_below_load() {
        let dir = tempfile::tempdir().unwrap();
        // pc 0x7c81_2345 - load 0x7c80_0000 + image 0x1000_0000
        write_binary(dir.path(), "kernel32.dll", "10012345");
        let loader = FakeLoader::default();
        let mut resolver = LibraryResolver::with_loader(loader.clone());
        resolver.set_search_path(&dir.path().display().to_string());

        let module = ModuleInstance::new("kernel32.dll", 0x7c80_0000, 0x1000_0000);
        let info = resolver.resolve_module_pc(&module, 0x7c81_2345).unwrap();
        assert_eq!(info.line, 42);
        assert_eq!(*loader.queries.lock().unwrap(), [0x1001_2345]);
    }

    #[test]
    fn test_resolve_module_pc_image_above_load() {
        let dir = tempfile::tempdir().unwrap();
        write_binary(dir.path(), "a.out", "400500");
        let loader = FakeLoader::default();
        let mut resolver = LibraryResolver::with_loader(loader.clone());
        resolver.set_search_path(&dir.path().display().to_string());

        let module = ModuleInstance::new("a.out", 0x1_0000, 0x40_0000);
        assert!(resolver.resolve_module_pc(&module, 0x1_0500).is_some());
        assert!(resolver.resolve_module_pc(&module, 0x1_0504).is_none());
        assert_eq!(*loader.queries.lock().unwrap(), [0x40_0500, 0x40_0504]);
    }

    #[test]
    fn test_format_location_flag_subsets() {
        let dir = tempfile::tempdir().unwrap();
        write_binary(dir.path(), "a.out", "401000");
        let mut resolver = LibraryResolver::with_loader(FakeLoader::default());
        resolver.set_search_path(&dir.path().display().to_string());

        let fmt = |file, line, function| {
            resolver.format_location(
                "a.out",
                0x40_0000,
                0x40_0000,
                0x40_1000,
                LocationFormat { file, line, function },
            )
        };

        assert_eq!(fmt(true, true, true).as_deref(), Some("src/main.c:42 - main"));
        assert_eq!(fmt(true, false, false).as_deref(), Some("src/main.c"));
        assert_eq!(fmt(false, true, false).as_deref(), Some(":42"));
        assert_eq!(fmt(false, false, true).as_deref(), Some(" - main"));
        assert_eq!(fmt(true, false, true).as_deref(), Some("src/main.c - main"));
        assert_eq!(fmt(false, false, false).as_deref(), Some(""));
    }

    #[test]
    fn test_format_location_absent_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_binary(dir.path(), "a.out", "401000");
        write_binary(dir.path(), "bad.so", "corrupt");
        let mut resolver = LibraryResolver::with_loader(FakeLoader::default());
        resolver.set_search_path(&dir.path().display().to_string());

        let module = ModuleInstance::new("a.out", 0x40_0000, 0x40_0000);
        assert!(resolver.format_module_location(&module, 0x40_2000, LocationFormat::FULL).is_none());
        assert!(resolver.format_location("bad.so", 0, 0, 0, LocationFormat::FULL).is_none());
        assert!(resolver.format_location("missing.so", 0, 0, 0, LocationFormat::FULL).is_none());
    }

    #[test]
    fn test_concurrent_requests_open_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_binary(dir.path(), "app", "1000");
        let loader = FakeLoader { delay: Some(Duration::from_millis(50)), ..FakeLoader::default() };
        let resolver = LibraryResolver::with_loader(loader.clone());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| assert!(resolver.get_by_path(&path).is_some()));
            }
        });

        assert_eq!(loader.opens.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_segment_resolves_relative_names() {
        let mut resolver = LibraryResolver::with_loader(FakeLoader::default());
        resolver.set_search_path("/nonexistent-memtrace-dir:");
        assert_eq!(resolver.find("Cargo.toml"), Some(PathBuf::from("Cargo.toml")));
    }
}
