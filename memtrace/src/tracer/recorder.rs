//! Fixed-layout record emission
//!
//! The recorder holds no policy: every call produces exactly one record and
//! exactly one sink write. Framing and buffering belong to the sink.

use memtrace_common::{
    MemoryAccessRecord, PageFaultRecord, TlbMissRecord, TRACE_MEMORY, TRACE_PAGEFAULT,
    TRACE_TLBMISS,
};
use std::io;

use super::events::{byte_size, EventContext, PageFault, TlbMiss};

/// Destination of encoded records, one logical stream per monitored state
pub trait TraceSink {
    /// Write one item of `kind` for the state in `ctx`
    ///
    /// # Errors
    /// Returns an error if the underlying writer fails
    fn write_item(&mut self, ctx: &EventContext, kind: u8, payload: &[u8]) -> io::Result<()>;
}

impl<S: TraceSink + ?Sized> TraceSink for &mut S {
    fn write_item(&mut self, ctx: &EventContext, kind: u8, payload: &[u8]) -> io::Result<()> {
        (**self).write_item(ctx, kind, payload)
    }
}

/// In-memory sink, mostly for tests and replay tooling
#[derive(Debug, Default)]
pub struct VecSink {
    pub items: Vec<(EventContext, u8, Vec<u8>)>,
}

impl TraceSink for VecSink {
    fn write_item(&mut self, ctx: &EventContext, kind: u8, payload: &[u8]) -> io::Result<()> {
        self.items.push((*ctx, kind, payload.to_vec()));
        Ok(())
    }
}

pub struct TraceRecorder<S> {
    sink: S,
}

impl<S: TraceSink> TraceRecorder<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Record one concrete memory access
    ///
    /// # Errors
    /// Returns an error if the sink write fails
    pub fn record_memory(
        &mut self,
        ctx: &EventContext,
        address: u64,
        value: u64,
        width_bits: u32,
        is_write: bool,
        is_io: bool,
    ) -> io::Result<()> {
        let record = MemoryAccessRecord {
            pc: ctx.pc,
            address,
            value,
            size: byte_size(width_bits),
            flags: MemoryAccessRecord::flags_for(is_write, is_io),
        };
        self.sink.write_item(ctx, TRACE_MEMORY, &record.encode())
    }

    /// # Errors
    /// Returns an error if the sink write fails
    pub fn record_tlb_miss(&mut self, ctx: &EventContext, miss: &TlbMiss) -> io::Result<()> {
        let record = TlbMissRecord { pc: ctx.pc, address: miss.address, is_write: miss.is_write };
        self.sink.write_item(ctx, TRACE_TLBMISS, &record.encode())
    }

    /// # Errors
    /// Returns an error if the sink write fails
    pub fn record_page_fault(&mut self, ctx: &EventContext, fault: &PageFault) -> io::Result<()> {
        let record = PageFaultRecord { pc: ctx.pc, address: fault.address, is_write: fault.is_write };
        self.sink.write_item(ctx, TRACE_PAGEFAULT, &record.encode())
    }
}
