//! Replay of engine event logs through a [`MemoryTracer`]
//!
//! Lets a tracer policy be tried offline against events dumped by the
//! execution engine, one JSON object per line:
//!
//! ```text
//! {"event":"tick"}
//! {"event":"memory","state":0,"pid":4,"pc":4198400,"sp":1245184,"address":1245000,"value":65,"width":8}
//! {"event":"memory","state":0,"pid":4,"pc":4198404,"sp":1245184,"address":null,"value":0,"width":32,"write":true}
//! {"event":"tlbMiss","state":0,"pid":4,"pc":4198408,"address":2147487744}
//! {"event":"pageFault","state":1,"pid":8,"pc":4198412,"address":4096,"write":true}
//! ```
//!
//! A `null` address or value stands for a symbolic expression. Blank lines
//! are skipped.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::io::BufRead;

use super::events::{EventContext, ExprValue, MemoryAccess, PageFault, TlbMiss};
use super::memory_tracer::MemoryTracer;
use super::recorder::TraceSink;
use crate::domain::StateId;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct LoggedContext {
    #[serde(default)]
    state: u32,
    #[serde(default)]
    pid: u64,
    pc: u64,
    #[serde(default)]
    sp: u64,
}

impl From<LoggedContext> for EventContext {
    fn from(ctx: LoggedContext) -> Self {
        EventContext { state_id: StateId(ctx.state), pid: ctx.pid, pc: ctx.pc, stack_pointer: ctx.sp }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
enum LoggedEvent {
    Tick,
    Memory {
        #[serde(flatten)]
        ctx: LoggedContext,
        address: Option<u64>,
        value: Option<u64>,
        width: u32,
        #[serde(default)]
        write: bool,
        #[serde(default)]
        io: bool,
    },
    TlbMiss {
        #[serde(flatten)]
        ctx: LoggedContext,
        address: u64,
        #[serde(default)]
        write: bool,
    },
    PageFault {
        #[serde(flatten)]
        ctx: LoggedContext,
        address: u64,
        #[serde(default)]
        write: bool,
    },
}

fn expr(value: Option<u64>) -> ExprValue {
    value.map_or(ExprValue::Symbolic, ExprValue::Concrete)
}

/// Feed every event of `input` to `tracer`, returning the number of events
///
/// # Errors
/// Returns an error if a line cannot be read or is not a valid event
pub fn replay<S: TraceSink>(input: impl BufRead, tracer: &mut MemoryTracer<S>) -> Result<u64> {
    let mut events = 0;
    for (idx, line) in input.lines().enumerate() {
        let line = line.context("Failed to read event log")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: LoggedEvent = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", idx + 1))?;

        match event {
            LoggedEvent::Tick => tracer.on_tick(),
            LoggedEvent::Memory { ctx, address, value, width, write, io } => {
                let access = MemoryAccess {
                    address: expr(address),
                    value: expr(value),
                    width_bits: width,
                    is_write: write,
                    is_io: io,
                };
                tracer.on_memory_access(&ctx.into(), &access);
            }
            LoggedEvent::TlbMiss { ctx, address, write } => {
                tracer.on_tlb_miss(&ctx.into(), &TlbMiss { address, is_write: write });
            }
            LoggedEvent::PageFault { ctx, address, write } => {
                tracer.on_page_fault(&ctx.into(), &PageFault { address, is_write: write });
            }
        }
        events += 1;
    }

    debug!("Replayed {events} events: {:?}", tracer.stats);
    Ok(events)
}
