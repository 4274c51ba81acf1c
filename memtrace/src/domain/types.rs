//! Domain types providing compile-time safety and self-documentation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one monitored execution state
///
/// Each state produces its own logical stream of events and owns its own
/// trace sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StateId(pub u32);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State#{}", self.0)
    }
}

/// One binary loaded in the monitored process
///
/// Owned by the execution engine; this crate only reads it.
///
/// `load_base` is where the image was placed at runtime, `image_base` is the
/// address it was linked for. Debug info is addressed in the image-base
/// coordinate space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleInstance {
    /// File name looked up through the search path (e.g. `libc.so.6`)
    pub name: String,
    pub load_base: u64,
    pub image_base: u64,
    /// Mapped size in bytes, used to attribute a pc to this module
    #[serde(default)]
    pub size: u64,
    /// Owning process; kernel modules use 0
    #[serde(default)]
    pub pid: u64,
}

impl ModuleInstance {
    #[must_use]
    pub fn new(name: impl Into<String>, load_base: u64, image_base: u64) -> Self {
        Self { name: name.into(), load_base, image_base, size: 0, pid: 0 }
    }

    /// Check if a runtime address falls inside this module's mapping
    #[must_use]
    pub fn contains(&self, pc: u64) -> bool {
        pc >= self.load_base && pc - self.load_base < self.size
    }
}

/// Source location of a resolved address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub file: String,
    pub line: u64,
    pub function: String,
}
