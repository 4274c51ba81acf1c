use anyhow::{Context, Result};
use memtrace_common::TraceItemHeader;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use crate::tracer::{EventContext, TraceSink};

/// Trace sink framing each record with a [`TraceItemHeader`]
///
/// Timestamps are nanoseconds since the writer was created.
pub struct TraceFileWriter<W: Write> {
    out: W,
    start: Instant,
    items_written: u64,
}

impl TraceFileWriter<BufWriter<File>> {
    /// Create (or truncate) a trace file
    ///
    /// # Errors
    /// Returns an error if the file cannot be created
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create trace file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> TraceFileWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, start: Instant::now(), items_written: 0 }
    }

    #[must_use]
    pub fn items_written(&self) -> u64 {
        self.items_written
    }

    /// Flush and return the underlying writer
    ///
    /// # Errors
    /// Returns an error if the final flush fails
    pub fn into_inner(mut self) -> io::Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> TraceSink for TraceFileWriter<W> {
    fn write_item(&mut self, ctx: &EventContext, kind: u8, payload: &[u8]) -> io::Result<()> {
        let size = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "trace item too large"))?;
        let header = TraceItemHeader {
            timestamp_ns: u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX),
            pid: ctx.pid,
            state_id: ctx.state_id.0,
            size,
            kind,
        };
        self.out.write_all(&header.encode())?;
        self.out.write_all(payload)?;
        self.items_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StateId;

    #[test]
    fn test_item_is_header_then_payload() {
        let mut writer = TraceFileWriter::new(Vec::new());
        let ctx = EventContext { state_id: StateId(9), pid: 77, pc: 0, stack_pointer: 0 };
        writer.write_item(&ctx, 2, &[0xaa; 24]).unwrap();

        assert_eq!(writer.items_written(), 1);
        let bytes = writer.into_inner().unwrap();
        assert_eq!(bytes.len(), TraceItemHeader::SIZE + 24);

        let header = TraceItemHeader::decode(&bytes).unwrap();
        assert_eq!(header.pid, 77);
        assert_eq!(header.state_id, 9);
        assert_eq!(header.size, 24);
        assert_eq!(header.kind, 2);
        assert!(bytes[TraceItemHeader::SIZE..].iter().all(|b| *b == 0xaa));
    }
}
