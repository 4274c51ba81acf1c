//! # Memory Tracer
//!
//! Glue between the execution engine's notifications and the recorder.
//!
//! ## Event Routing
//!
//! - timer tick → [`TraceFilter::on_tick`] (deferred arming)
//! - data memory access → concrete check → address policy → `MEMORY` record
//! - TLB miss → `TLBMISS` record
//! - page fault → `PAGEFAULT` record
//!
//! Nothing is recorded while the filter is disarmed or for categories the
//! policy does not monitor.

use log::{info, warn};
use std::io;

use super::events::{EventContext, EventKind, MemoryAccess, PageFault, TlbMiss};
use super::filter::{FilterPolicy, TraceFilter};
use super::recorder::{TraceRecorder, TraceSink};

/// Counters kept by the tracer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TracerStats {
    /// Memory accesses delivered while memory tracing was enabled
    pub memory_seen: u64,
    /// Dropped because the address or value was symbolic
    pub memory_symbolic: u64,
    /// Dropped by the address policy
    pub memory_rejected: u64,
    pub memory_recorded: u64,
    pub tlb_misses_recorded: u64,
    pub page_faults_recorded: u64,
    /// Sink writes that failed
    pub write_errors: u64,
}

pub struct MemoryTracer<S> {
    filter: TraceFilter,
    recorder: TraceRecorder<S>,
    pub stats: TracerStats,
}

impl<S: TraceSink> MemoryTracer<S> {
    pub fn new(policy: FilterPolicy, sink: S) -> Self {
        info!(
            "MonitorMemory: {} PageFaults: {} TlbMisses: {}",
            policy.monitor_memory, policy.monitor_page_faults, policy.monitor_tlb_misses
        );

        let tracer = Self {
            filter: TraceFilter::new(policy),
            recorder: TraceRecorder::new(sink),
            stats: TracerStats::default(),
        };
        if tracer.filter.is_armed() {
            tracer.announce_enabled();
        }
        tracer
    }

    #[must_use]
    pub fn filter(&self) -> &TraceFilter {
        &self.filter
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        self.recorder.sink()
    }

    #[must_use]
    pub fn into_sink(self) -> S {
        self.recorder.into_sink()
    }

    /// Periodic timer notification
    pub fn on_tick(&mut self) {
        if self.filter.on_tick() {
            self.announce_enabled();
        }
    }

    pub fn on_memory_access(&mut self, ctx: &EventContext, access: &MemoryAccess) {
        if !self.filter.category_enabled(EventKind::Memory) {
            return;
        }
        self.stats.memory_seen += 1;

        let (Some(address), Some(value)) = (access.address.concrete(), access.value.concrete())
        else {
            self.stats.memory_symbolic += 1;
            return;
        };

        if !self.filter.admit_memory(address, ctx.stack_pointer) {
            self.stats.memory_rejected += 1;
            return;
        }

        let result = self.recorder.record_memory(
            ctx,
            address,
            value,
            access.width_bits,
            access.is_write,
            access.is_io,
        );
        if self.check_write(result) {
            self.stats.memory_recorded += 1;
        }
    }

    pub fn on_tlb_miss(&mut self, ctx: &EventContext, miss: &TlbMiss) {
        if !self.filter.category_enabled(EventKind::TlbMiss) {
            return;
        }
        let result = self.recorder.record_tlb_miss(ctx, miss);
        if self.check_write(result) {
            self.stats.tlb_misses_recorded += 1;
        }
    }

    pub fn on_page_fault(&mut self, ctx: &EventContext, fault: &PageFault) {
        if !self.filter.category_enabled(EventKind::PageFault) {
            return;
        }
        let result = self.recorder.record_page_fault(ctx, fault);
        if self.check_write(result) {
            self.stats.page_faults_recorded += 1;
        }
    }

    fn check_write(&mut self, result: io::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.stats.write_errors += 1;
                warn!("Failed to write trace item: {e}");
                false
            }
        }
    }

    fn announce_enabled(&self) {
        for kind in EventKind::ALL {
            if self.filter.policy().monitors(kind) {
                info!("MemoryTracer: enabling {} tracing", kind.label());
            }
        }
    }
}
