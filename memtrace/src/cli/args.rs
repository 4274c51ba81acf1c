//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "memtrace",
    about = "Record, inspect and symbolize guest memory traces",
    after_help = "\
EXAMPLES:
    memtrace replay events.jsonl -o trace.bin -c memtrace.json
    memtrace print trace.bin --state 0
    memtrace symbolize -m kernel32.dll --load-base 0x7c800000 --image-base 0x10000000 0x7c812345
    memtrace report trace.bin --modules modules.json --search-path /guest/system32:"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Colon-separated directories searched for module binaries (overrides config)
    #[arg(long, global = true, value_name = "DIRS")]
    pub search_path: Option<String>,

    /// First kernel-space address (overrides config)
    #[arg(long, global = true, value_parser = parse_address, value_name = "ADDR")]
    pub kernel_start: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a JSON-lines engine event log through the memory tracer
    Replay {
        /// Event log, one JSON event per line
        events: PathBuf,

        /// Trace file to write
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Dump every item of a trace file
    Print {
        trace: PathBuf,

        /// Only show items of this execution state
        #[arg(long)]
        state: Option<u32>,
    },

    /// Resolve program counters inside one module
    Symbolize {
        /// Module file name, looked up along the search path
        #[arg(short, long)]
        module: String,

        /// Runtime address of the module
        #[arg(long, value_parser = parse_address)]
        load_base: u64,

        /// Link-time address of the module
        #[arg(long, value_parser = parse_address)]
        image_base: u64,

        /// Omit the source file
        #[arg(long)]
        no_file: bool,

        /// Omit the line number
        #[arg(long)]
        no_line: bool,

        /// Omit the function name
        #[arg(long)]
        no_func: bool,

        /// Program counters (hex with 0x prefix, or decimal)
        #[arg(required = true, value_parser = parse_address)]
        pcs: Vec<u64>,
    },

    /// Rank the instructions producing the most trace items
    Report {
        trace: PathBuf,

        /// JSON module list used to symbolize the ranked pcs
        #[arg(long, value_name = "FILE")]
        modules: Option<PathBuf>,

        /// Number of sites to show (0 = all)
        #[arg(long, default_value = "20")]
        top: usize,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Parse `0x`-prefixed hex or plain decimal
///
/// # Errors
/// Returns a message suitable for clap when `s` is not a number
pub fn parse_address(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid address {s:?}: {e}"))
}
