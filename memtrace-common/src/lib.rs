//! # Shared Trace Layout (writer ↔ offline reader)
//!
//! Defines the fixed binary records emitted by the memory tracer and the item
//! header that frames them in a trace file. All types use `#[repr(C)]` so the
//! record sizes match the natural field alignment of the host.
//!
//! Records are written in native byte order. Padding bytes are always zero on
//! encode and ignored on decode.
//!
//! ## Key Types
//!
//! - [`TraceItemHeader`] - Framing header that precedes every record
//! - [`MemoryAccessRecord`] - One concrete data memory access
//! - [`TlbMissRecord`] - One TLB miss
//! - [`PageFaultRecord`] - One page fault

#![no_std]

use core::mem::size_of;

// ============================================================================
// Item Kind Tags
// ============================================================================

/// Item carries a [`MemoryAccessRecord`]
pub const TRACE_MEMORY: u8 = 1;

/// Item carries a [`TlbMissRecord`]
pub const TRACE_TLBMISS: u8 = 2;

/// Item carries a [`PageFaultRecord`]
pub const TRACE_PAGEFAULT: u8 = 3;

/// `MemoryAccessRecord::flags` bit set for stores
pub const MEM_FLAG_WRITE: u8 = 1 << 0;

/// `MemoryAccessRecord::flags` bit set for accesses to I/O memory
pub const MEM_FLAG_IO: u8 = 1 << 1;

// ============================================================================
// Item Header
// ============================================================================

/// Header framing one item in a trace file
///
/// **Layout**: `timestamp_ns`, `pid`, `state_id`, `size`, `kind`, then zero
/// padding up to the struct alignment (32 bytes total).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceItemHeader {
    /// Nanoseconds since the writer was created
    pub timestamp_ns: u64,

    /// Process identity of the monitored context that produced the item
    pub pid: u64,

    /// Execution state the item belongs to
    ///
    /// Each monitored state gets its own logical stream; the reader
    /// demultiplexes on this field.
    pub state_id: u32,

    /// Payload length in bytes (the record that follows the header)
    pub size: u32,

    /// One of `TRACE_MEMORY`, `TRACE_TLBMISS`, `TRACE_PAGEFAULT`
    pub kind: u8,
}

impl TraceItemHeader {
    pub const SIZE: usize = size_of::<Self>();

    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.timestamp_ns.to_ne_bytes());
        out[8..16].copy_from_slice(&self.pid.to_ne_bytes());
        out[16..20].copy_from_slice(&self.state_id.to_ne_bytes());
        out[20..24].copy_from_slice(&self.size.to_ne_bytes());
        out[24] = self.kind;
        out
    }

    /// Decode a header from the first `SIZE` bytes of `bytes`
    ///
    /// Returns `None` if `bytes` is too short.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            timestamp_ns: read_u64(bytes, 0),
            pid: read_u64(bytes, 8),
            state_id: read_u32(bytes, 16),
            size: read_u32(bytes, 20),
            kind: bytes[24],
        })
    }
}

// ============================================================================
// Records
// ============================================================================

/// One concrete data memory access
///
/// **Layout**: `pc`, `address`, `value` (u64 each), `size`, `flags` (u8 each),
/// zero padding to 32 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccessRecord {
    /// Program counter of the instruction performing the access
    pub pc: u64,

    /// Accessed virtual address
    pub address: u64,

    /// Value loaded or stored (zero-extended to 64 bits)
    pub value: u64,

    /// Access width in bytes
    pub size: u8,

    /// `MEM_FLAG_WRITE` | `MEM_FLAG_IO`
    pub flags: u8,
}

impl MemoryAccessRecord {
    pub const SIZE: usize = size_of::<Self>();

    #[must_use]
    pub fn flags_for(is_write: bool, is_io: bool) -> u8 {
        let mut flags = 0;
        if is_write {
            flags |= MEM_FLAG_WRITE;
        }
        if is_io {
            flags |= MEM_FLAG_IO;
        }
        flags
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        self.flags & MEM_FLAG_WRITE != 0
    }

    #[must_use]
    pub fn is_io(&self) -> bool {
        self.flags & MEM_FLAG_IO != 0
    }

    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.pc.to_ne_bytes());
        out[8..16].copy_from_slice(&self.address.to_ne_bytes());
        out[16..24].copy_from_slice(&self.value.to_ne_bytes());
        out[24] = self.size;
        out[25] = self.flags;
        out
    }

    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            pc: read_u64(bytes, 0),
            address: read_u64(bytes, 8),
            value: read_u64(bytes, 16),
            size: bytes[24],
            flags: bytes[25],
        })
    }
}

/// One TLB miss
///
/// **Layout**: `pc`, `address` (u64 each), `is_write` (bool), zero padding to
/// 24 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbMissRecord {
    pub pc: u64,
    pub address: u64,
    pub is_write: bool,
}

/// One page fault
///
/// Same layout as [`TlbMissRecord`].
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFaultRecord {
    pub pc: u64,
    pub address: u64,
    pub is_write: bool,
}

macro_rules! impl_fault_record {
    ($ty:ty) => {
        impl $ty {
            pub const SIZE: usize = size_of::<Self>();

            #[must_use]
            pub fn encode(&self) -> [u8; Self::SIZE] {
                let mut out = [0u8; Self::SIZE];
                out[0..8].copy_from_slice(&self.pc.to_ne_bytes());
                out[8..16].copy_from_slice(&self.address.to_ne_bytes());
                out[16] = u8::from(self.is_write);
                out
            }

            #[must_use]
            pub fn decode(bytes: &[u8]) -> Option<Self> {
                if bytes.len() < Self::SIZE {
                    return None;
                }
                Some(Self {
                    pc: read_u64(bytes, 0),
                    address: read_u64(bytes, 8),
                    is_write: bytes[16] != 0,
                })
            }
        }
    };
}

impl_fault_record!(TlbMissRecord);
impl_fault_record!(PageFaultRecord);

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_ne_bytes(buf)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_ne_bytes(buf)
}
