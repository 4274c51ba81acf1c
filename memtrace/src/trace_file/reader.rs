//! Offline trace reader
//!
//! Parses a trace file item by item. Iteration ends cleanly at EOF on an
//! item boundary; anything else that is cut short is an error.

use memtrace_common::{
    MemoryAccessRecord, PageFaultRecord, TlbMissRecord, TraceItemHeader, TRACE_MEMORY,
    TRACE_PAGEFAULT, TRACE_TLBMISS,
};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::domain::TraceFileError;

/// Decoded payload of one trace item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRecord {
    Memory(MemoryAccessRecord),
    TlbMiss(TlbMissRecord),
    PageFault(PageFaultRecord),
    /// Item written by another tracer sharing the stream
    Unknown { kind: u8, payload: Vec<u8> },
}

impl TraceRecord {
    /// Program counter of the originating instruction
    #[must_use]
    pub fn pc(&self) -> Option<u64> {
        match self {
            TraceRecord::Memory(r) => Some(r.pc),
            TraceRecord::TlbMiss(r) => Some(r.pc),
            TraceRecord::PageFault(r) => Some(r.pc),
            TraceRecord::Unknown { .. } => None,
        }
    }

    fn decode(header: &TraceItemHeader, payload: Vec<u8>) -> Result<Self, TraceFileError> {
        let expected = match header.kind {
            TRACE_MEMORY => MemoryAccessRecord::SIZE,
            TRACE_TLBMISS => TlbMissRecord::SIZE,
            TRACE_PAGEFAULT => PageFaultRecord::SIZE,
            kind => return Ok(TraceRecord::Unknown { kind, payload }),
        };
        let mismatch =
            || TraceFileError::SizeMismatch { kind: header.kind, size: header.size, expected };
        if payload.len() != expected {
            return Err(mismatch());
        }

        let record = match header.kind {
            TRACE_MEMORY => MemoryAccessRecord::decode(&payload).map(TraceRecord::Memory),
            TRACE_TLBMISS => TlbMissRecord::decode(&payload).map(TraceRecord::TlbMiss),
            _ => PageFaultRecord::decode(&payload).map(TraceRecord::PageFault),
        };
        record.ok_or_else(mismatch)
    }
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceRecord::Memory(r) => {
                write!(
                    f,
                    "MEMORY    pc=0x{:08x} addr=0x{:08x} value=0x{:x} size={} {}{}",
                    r.pc,
                    r.address,
                    r.value,
                    r.size,
                    if r.is_write() { "W" } else { "R" },
                    if r.is_io() { " IO" } else { "" }
                )
            }
            TraceRecord::TlbMiss(r) => write!(
                f,
                "TLBMISS   pc=0x{:08x} addr=0x{:08x} {}",
                r.pc,
                r.address,
                if r.is_write { "W" } else { "R" }
            ),
            TraceRecord::PageFault(r) => write!(
                f,
                "PAGEFAULT pc=0x{:08x} addr=0x{:08x} {}",
                r.pc,
                r.address,
                if r.is_write { "W" } else { "R" }
            ),
            TraceRecord::Unknown { kind, payload } => {
                write!(f, "UNKNOWN   kind={kind} size={}", payload.len())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceItem {
    pub header: TraceItemHeader,
    pub record: TraceRecord,
}

pub struct TraceReader<R: Read> {
    input: R,
    done: bool,
}

impl TraceReader<BufReader<File>> {
    /// # Errors
    /// Returns an error if the file cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceFileError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, done: false }
    }

    fn read_item(&mut self) -> Result<Option<TraceItem>, TraceFileError> {
        let mut buf = [0u8; TraceItemHeader::SIZE];
        let n = read_full(&mut self.input, &mut buf)?;
        if n == 0 {
            return Ok(None);
        }
        let header = TraceItemHeader::decode(&buf[..n])
            .ok_or(TraceFileError::TruncatedHeader(n, TraceItemHeader::SIZE))?;

        let size = header.size as usize;
        let mut payload = Vec::new();
        (&mut self.input).take(u64::from(header.size)).read_to_end(&mut payload)?;
        if payload.len() < size {
            return Err(TraceFileError::TruncatedPayload(payload.len(), size));
        }

        let record = TraceRecord::decode(&header, payload)?;
        Ok(Some(TraceItem { header, record }))
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<TraceItem, TraceFileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_item() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the input allows, returning the byte count
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
