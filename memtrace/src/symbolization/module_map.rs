//! Module maps for offline symbolization
//!
//! A trace only carries raw program counters. To symbolize them after the
//! fact we need to know which module each pc belonged to, which the
//! execution engine dumps as a JSON list of [`ModuleInstance`]s:
//!
//! ```json
//! [
//!   { "name": "app.exe", "pid": 1234, "loadBase": 4194304, "imageBase": 4194304, "size": 65536 },
//!   { "name": "ntoskrnl.exe", "pid": 0, "loadBase": 2152726528, "imageBase": 4194304, "size": 2097152 }
//! ]
//! ```
//!
//! Kernel modules are registered once under pid 0 and shared by every
//! process, matching [`classify_pid`].

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::address_space::classify_pid;
use crate::domain::ModuleInstance;

#[derive(Debug, Default, Clone)]
pub struct ModuleMap {
    modules: Vec<ModuleInstance>,
    kernel_start: u64,
}

impl ModuleMap {
    #[must_use]
    pub fn new(modules: Vec<ModuleInstance>, kernel_start: u64) -> Self {
        Self { modules, kernel_start }
    }

    /// Load a module list dumped by the execution engine
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a JSON module list
    pub fn from_json_file(path: impl AsRef<Path>, kernel_start: u64) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read module map {}", path.display()))?;
        let modules: Vec<ModuleInstance> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid module map {}", path.display()))?;
        Ok(Self::new(modules, kernel_start))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module of `pid` whose mapping contains `pc`
    #[must_use]
    pub fn lookup(&self, pid: u64, pc: u64) -> Option<&ModuleInstance> {
        let owner = classify_pid(pid, pc, self.kernel_start);
        self.modules.iter().find(|m| m.pid == owner && m.contains(pc))
    }
}
