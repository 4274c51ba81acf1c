//! Events delivered by the execution engine

use crate::domain::StateId;

/// A value as observed by the execution engine
///
/// Only concrete observations are ever recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprValue {
    Concrete(u64),
    /// Unresolved at observation time
    Symbolic,
}

impl ExprValue {
    #[must_use]
    pub fn concrete(self) -> Option<u64> {
        match self {
            ExprValue::Concrete(v) => Some(v),
            ExprValue::Symbolic => None,
        }
    }
}

impl From<u64> for ExprValue {
    fn from(v: u64) -> Self {
        ExprValue::Concrete(v)
    }
}

/// Snapshot of the monitored state at the time of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventContext {
    pub state_id: StateId,
    pub pid: u64,
    /// Program counter of the instruction that caused the event
    pub pc: u64,
    pub stack_pointer: u64,
}

/// Data memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    pub address: ExprValue,
    pub value: ExprValue,
    /// Width of `value` in bits
    pub width_bits: u32,
    pub is_write: bool,
    pub is_io: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbMiss {
    pub address: u64,
    pub is_write: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageFault {
    pub address: u64,
    pub is_write: bool,
}

/// Event categories, each enabled independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Memory,
    TlbMiss,
    PageFault,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Memory, EventKind::PageFault, EventKind::TlbMiss];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Memory => "memory",
            EventKind::TlbMiss => "TLB miss",
            EventKind::PageFault => "page fault",
        }
    }
}

/// Minimum number of bytes holding `width_bits` bits
#[must_use]
pub fn byte_size(width_bits: u32) -> u8 {
    u8::try_from(width_bits.div_ceil(8)).unwrap_or(u8::MAX)
}
