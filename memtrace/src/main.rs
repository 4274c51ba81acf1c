//! # memtrace - Main Entry Point
//!
//! - `replay`: run an engine event log through the memory tracer into a trace file
//! - `print`: dump a trace file
//! - `symbolize`: resolve pcs inside one guest module
//! - `report`: rank the instructions producing the most trace items

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs::File;
use std::io::BufReader;

use memtrace::analysis::{symbolize, AccessProfile};
use memtrace::cli::display::{display_hotspots, display_item, display_tracer_stats};
use memtrace::cli::{Args, Command};
use memtrace::config::Config;
use memtrace::domain::ConfigError;
use memtrace::symbolization::{LocationFormat, ModuleMap};
use memtrace::trace_file::{TraceFileWriter, TraceReader};
use memtrace::tracer::{replay, MemoryTracer};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_CONFIG: i32 = 78;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        EXIT_CONFIG
    } else {
        EXIT_ERROR
    }
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(search_path) = &args.search_path {
        config.library.search_path.clone_from(search_path);
    }
    if let Some(kernel_start) = args.kernel_start {
        config.library.kernel_start = kernel_start;
    }
    config.validate()?;
    Ok(config)
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Replay { events, output } => {
            let input = File::open(&events)
                .with_context(|| format!("Failed to open event log {}", events.display()))?;
            let writer = TraceFileWriter::create(&output)?;
            let mut tracer = MemoryTracer::new(config.memory_tracer, writer);

            let count = replay(BufReader::new(input), &mut tracer)?;
            info!("Replayed {count} events from {}", events.display());

            let stats = tracer.stats;
            let writer = tracer.into_sink();
            let items = writer.items_written();
            writer.into_inner().context("Failed to flush trace file")?;
            display_tracer_stats(&stats, items);
        }

        Command::Print { trace, state } => {
            for item in TraceReader::open(&trace)? {
                let item = item?;
                if state.is_some_and(|s| s != item.header.state_id) {
                    continue;
                }
                display_item(&item);
            }
        }

        Command::Symbolize { module, load_base, image_base, no_file, no_line, no_func, pcs } => {
            let resolver = config.library.resolver();
            if let Err(e) = resolver.load_by_name(&module) {
                warn!("{e}");
            }
            let format = LocationFormat { file: !no_file, line: !no_line, function: !no_func };
            for pc in pcs {
                let location = resolver.format_location(&module, load_base, image_base, pc, format);
                println!("0x{pc:08x}  {}", location.as_deref().unwrap_or("??"));
            }
        }

        Command::Report { trace, modules, top, json } => {
            let kernel_start = config.library.kernel_start;
            let mut profile = AccessProfile::new(kernel_start);
            for item in TraceReader::open(&trace)? {
                profile.record(&item?);
            }

            let mut hotspots = profile.hotspots(top);
            if let Some(path) = modules {
                let module_map = ModuleMap::from_json_file(&path, kernel_start)?;
                info!("Loaded {} modules from {}", module_map.len(), path.display());
                symbolize(&mut hotspots, &config.library.resolver(), &module_map);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&hotspots)?);
            } else {
                display_hotspots(&hotspots, profile.total());
            }
        }
    }

    Ok(())
}
