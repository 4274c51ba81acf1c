// Percentages are display-only
#![allow(clippy::cast_precision_loss)]

use crate::analysis::AccessHotspot;
use crate::trace_file::TraceItem;
use crate::tracer::TracerStats;

/// One line per trace item
pub fn display_item(item: &TraceItem) {
    let h = &item.header;
    println!(
        "[{:>12}ns] State#{:<3} pid={:<6} {}",
        h.timestamp_ns, h.state_id, h.pid, item.record
    );
}

/// Ranked access-site table
pub fn display_hotspots(hotspots: &[AccessHotspot], total: u64) {
    println!("{total} trace items, {} sites shown\n", hotspots.len());
    println!(
        "{:>7}  {:>8}  {:<18}  {:>7} {:>7} {:>5} {:>6} {:>6}  LOCATION",
        "SHARE", "OWNER", "PC", "READS", "WRITES", "IO", "TLB", "FAULTS"
    );
    for h in hotspots {
        println!(
            "{:>6.2}%  {:>8}  0x{:<16x}  {:>7} {:>7} {:>5} {:>6} {:>6}  {}",
            h.percentage,
            h.owner,
            h.pc,
            h.counts.reads,
            h.counts.writes,
            h.counts.io,
            h.counts.tlb_misses,
            h.counts.page_faults,
            h.location.as_deref().unwrap_or("??")
        );
    }
}

/// Summary of a replay run
pub fn display_tracer_stats(stats: &TracerStats, items: u64) {
    eprintln!(
        "stats: memory_seen={} symbolic={} rejected={} recorded={} tlb_misses={} page_faults={}",
        stats.memory_seen,
        stats.memory_symbolic,
        stats.memory_rejected,
        stats.memory_recorded,
        stats.tlb_misses_recorded,
        stats.page_faults_recorded
    );
    if stats.write_errors > 0 {
        eprintln!("warning: {} trace items could not be written", stats.write_errors);
    }
    eprintln!("wrote {items} trace items");
}
