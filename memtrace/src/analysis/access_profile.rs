//! Access profile of a recorded trace.
//!
//! Aggregates trace items by access site, the (owner, pc) pair of the
//! instruction that produced them, to show which code touches memory, misses
//! the TLB or faults the most.
//!
//! The owner is the process id for user-space code and 0 for anything at or
//! above the kernel start, so kernel code shared by every process is counted
//! as a single site.
//!
//! # Data Flow
//!
//! ```text
//! TraceReader ──► AccessProfile.record() ──► hotspots(top)
//!                                              │
//!                      ModuleMap + LibraryResolver ──► symbolize()
//! ```

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::HashMap;

use crate::symbolization::{classify_pid, LibraryResolver, LocationFormat, ModuleMap};
use crate::trace_file::{TraceItem, TraceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SiteKey {
    owner: u64,
    pc: u64,
}

/// Per-site event counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteCounts {
    pub reads: u64,
    pub writes: u64,
    /// Subset of reads and writes that targeted I/O memory
    pub io: u64,
    pub tlb_misses: u64,
    pub page_faults: u64,
}

impl SiteCounts {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.reads + self.writes + self.tlb_misses + self.page_faults
    }
}

/// One ranked access site
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessHotspot {
    pub owner: u64,
    pub pc: u64,
    #[serde(flatten)]
    pub counts: SiteCounts,
    /// Share of all recorded items (0.0 - 100.0)
    pub percentage: f64,
    /// `file:line - function`, when the pc could be symbolized
    pub location: Option<String>,
}

#[derive(Debug)]
pub struct AccessProfile {
    sites: HashMap<SiteKey, SiteCounts>,
    total: u64,
    kernel_start: u64,
}

impl AccessProfile {
    #[must_use]
    pub fn new(kernel_start: u64) -> Self {
        Self { sites: HashMap::new(), total: 0, kernel_start }
    }

    /// Total items counted
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn site_count(&self) -> usize {
        self.sites.len()
    }

    /// Count one trace item; items of unknown kind are ignored
    pub fn record(&mut self, item: &TraceItem) {
        let Some(pc) = item.record.pc() else { return };
        let owner = classify_pid(item.header.pid, pc, self.kernel_start);
        let counts = self.sites.entry(SiteKey { owner, pc }).or_default();

        match &item.record {
            TraceRecord::Memory(r) => {
                if r.is_write() {
                    counts.writes += 1;
                } else {
                    counts.reads += 1;
                }
                if r.is_io() {
                    counts.io += 1;
                }
            }
            TraceRecord::TlbMiss(_) => counts.tlb_misses += 1,
            TraceRecord::PageFault(_) => counts.page_faults += 1,
            TraceRecord::Unknown { .. } => return,
        }
        self.total += 1;
    }

    /// Sites sorted by total count (descending), ties by owner then pc
    ///
    /// `limit = 0` returns every site.
    #[must_use]
    pub fn hotspots(&self, limit: usize) -> Vec<AccessHotspot> {
        let mut sites: Vec<(&SiteKey, &SiteCounts)> = self.sites.iter().collect();
        sites.sort_by(|(ka, ca), (kb, cb)| cb.total().cmp(&ca.total()).then_with(|| ka.cmp(kb)));
        if limit > 0 {
            sites.truncate(limit);
        }

        sites
            .into_iter()
            .map(|(key, counts)| AccessHotspot {
                owner: key.owner,
                pc: key.pc,
                counts: *counts,
                percentage: if self.total > 0 {
                    counts.total() as f64 / self.total as f64 * 100.0
                } else {
                    0.0
                },
                location: None,
            })
            .collect()
    }
}

/// Attach source locations to hotspots whose pc falls in a known module
pub fn symbolize(hotspots: &mut [AccessHotspot], resolver: &LibraryResolver, modules: &ModuleMap) {
    for hotspot in hotspots {
        hotspot.location = modules
            .lookup(hotspot.owner, hotspot.pc)
            .and_then(|module| resolver.format_module_location(module, hotspot.pc, LocationFormat::FULL));
    }
}
