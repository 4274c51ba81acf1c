//! # Symbol Resolution and Address Translation
//!
//! Converts raw program counters observed in a monitored guest into source
//! file, line and function names using DWARF debug information.
//!
//! ## Address Translation
//!
//! A module is linked to run at its **image base** but the loader may place
//! it anywhere; the runtime address of its first byte is the **load base**.
//! Debug info is expressed in link-time addresses, so a runtime pc is shifted
//! back before the lookup:
//!
//! ```text
//! relative = pc - load_base + image_base
//!
//! kernel32.dll  load_base  = 0x7c800000
//!               image_base = 0x10000000
//! pc 0x7c812345 -> 0x10012345 -> GetProcAddress at loader.c:210
//! ```
//!
//! ## Library Lookup
//!
//! Modules are found by name along a `:`-separated search path, first
//! directory wins. Each binary found is opened once and cached by absolute
//! path; binaries that fail to parse are remembered and never reopened.
//!
//! ## Address-Space Split
//!
//! Addresses at or above the kernel start belong to one shared owner (pid 0)
//! regardless of which process was running, so per-process aggregation does
//! not split kernel code across processes.
//!
//! ## Module Structure
//!
//! - **`symbolizer`**: `DebugInfoProvider` trait and the DWARF implementation
//! - **`library`**: `LibraryResolver` (search path, positive/negative caches)
//! - **`address_space`**: translation math and kernel/user classification
//! - **`module_map`**: pc → module attribution for offline reports
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut resolver = LibraryResolver::new();
//! resolver.set_search_path("/guest/windows/system32:/guest/app:");
//!
//! let module = ModuleInstance::new("kernel32.dll", 0x7c80_0000, 0x1000_0000);
//! if let Some(loc) = resolver.format_module_location(&module, pc, LocationFormat::FULL) {
//!     println!("{loc}"); // loader.c:210 - GetProcAddress
//! }
//! ```

pub mod address_space;
pub mod library;
pub mod module_map;
pub mod symbolizer;

pub use address_space::{classify_pid, relative_address, DEFAULT_KERNEL_START};
pub use library::{LibraryResolver, LocationFormat};
pub use module_map::ModuleMap;
pub use symbolizer::{DebugInfoLoader, DebugInfoProvider, DwarfLoader, DwarfSymbolizer};
