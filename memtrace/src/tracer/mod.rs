//! Selective memory event tracing
//!
//! - `events`: notifications delivered by the execution engine
//! - `filter`: arming state machine and address admission policy
//! - `recorder`: fixed-layout record emission into a [`TraceSink`]
//! - `memory_tracer`: the plugin wiring the three together
//! - `replay`: drives a tracer from a JSON-lines engine event log

pub mod events;
pub mod filter;
pub mod memory_tracer;
pub mod recorder;
pub mod replay;

pub use events::{EventContext, EventKind, ExprValue, MemoryAccess, PageFault, TlbMiss};
pub use filter::{ArmingState, FilterPolicy, TraceFilter, DEFAULT_STACK_WINDOW};
pub use memory_tracer::{MemoryTracer, TracerStats};
pub use recorder::{TraceRecorder, TraceSink, VecSink};
pub use replay::replay;
