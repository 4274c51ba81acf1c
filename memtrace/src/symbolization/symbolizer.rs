use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianArcSlice, RunTimeEndian};
use log::debug;
use object::read::{SymbolMap, SymbolMapEntry};
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::SourceInfo;

/// Address to source location lookups for a single binary
///
/// Addresses are relative to the binary's own image base (see
/// [`relative_address`](super::address_space::relative_address)).
pub trait DebugInfoProvider: Send + Sync {
    /// Returns `None` when the address has no file/line mapping
    fn resolve(&self, addr: u64) -> Option<SourceInfo>;
}

/// Opens a binary as a [`DebugInfoProvider`]
///
/// A failed open is treated as permanent by the resolver.
pub trait DebugInfoLoader: Send + Sync {
    /// # Errors
    /// Returns an error if the file cannot be read or carries no usable debug info
    fn open(&self, path: &Path) -> Result<Arc<dyn DebugInfoProvider>>;
}

/// Default loader producing [`DwarfSymbolizer`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct DwarfLoader;

impl DebugInfoLoader for DwarfLoader {
    fn open(&self, path: &Path) -> Result<Arc<dyn DebugInfoProvider>> {
        Ok(Arc::new(DwarfSymbolizer::new(path)?))
    }
}

/// Text symbol owned by a [`DwarfSymbolizer`]
#[derive(Debug, Clone)]
struct TextSymbol {
    address: u64,
    name: String,
}

impl SymbolMapEntry for TextSymbol {
    fn address(&self) -> u64 {
        self.address
    }
}

/// Symbolizer for resolving addresses to source locations via DWARF
///
/// Includes a cache of resolved addresses (hits and misses), since trace
/// reports tend to hit the same few program counters over and over.
pub struct DwarfSymbolizer {
    ctx: Mutex<Context<EndianArcSlice<RunTimeEndian>>>,
    /// Function symbols, for frames DWARF cannot name
    symbols: SymbolMap<TextSymbol>,
    cache: Mutex<HashMap<u64, Option<SourceInfo>>>,
}

impl DwarfSymbolizer {
    /// Create a new symbolizer for the given binary
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed, or if it
    /// carries no DWARF compilation units
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_path = binary_path.as_ref();
        let binary_data = fs::read(binary_path)
            .with_context(|| format!("Failed to read {}", binary_path.display()))?;

        let obj_file = object::File::parse(&*binary_data).context("Failed to parse object file")?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianArcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianArcSlice::new(Arc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        if dwarf.units().next()?.is_none() {
            anyhow::bail!("No DWARF debug information in {}", binary_path.display());
        }
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        let symbols = SymbolMap::new(
            obj_file
                .symbols()
                .filter(|sym| sym.kind() == SymbolKind::Text && sym.address() != 0)
                .filter_map(|sym| {
                    let name = sym.name().ok()?;
                    Some(TextSymbol { address: sym.address(), name: name.to_string() })
                })
                .collect(),
        );

        debug!("Loaded {} ({} text symbols)", binary_path.display(), symbols.symbols().len());

        Ok(Self { ctx: Mutex::new(ctx), symbols, cache: Mutex::new(HashMap::new()) })
    }

    /// Demangle a Rust symbol name
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }

    /// Demangled name of the closest text symbol at or below `addr`
    ///
    /// Used for frames that have a source location but no DWARF function
    /// name.
    #[must_use]
    pub fn symbol_name(&self, addr: u64) -> Option<String> {
        self.symbols.get(addr).map(|sym| Self::demangle_symbol(&sym.name))
    }

    fn lookup(&self, addr: u64) -> Option<SourceInfo> {
        let ctx = self.ctx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut frame_iter = ctx.find_frames(addr).skip_all_loads().ok()?;

        // Innermost frame with a full location wins
        while let Ok(Some(frame)) = frame_iter.next() {
            let Some(location) = frame.location else { continue };
            let (Some(file), Some(line)) = (location.file, location.line) else { continue };

            let function = frame
                .function
                .and_then(|f| f.demangle().ok().map(|s| s.to_string()))
                .or_else(|| self.symbol_name(addr))
                .unwrap_or_else(|| "<unknown>".to_string());

            return Some(SourceInfo { file: file.to_string(), line: u64::from(line), function });
        }

        None
    }
}

impl DebugInfoProvider for DwarfSymbolizer {
    fn resolve(&self, addr: u64) -> Option<SourceInfo> {
        if let Some(cached) = self.cache.lock().unwrap_or_else(PoisonError::into_inner).get(&addr)
        {
            return cached.clone();
        }

        let resolved = self.lookup(addr);

        self.cache.lock().unwrap_or_else(PoisonError::into_inner).insert(addr, resolved.clone());

        resolved
    }
}
