//! Seed files for replay and fuzzing, cut from a dump
//!
//! A seed is a single dump entry (header and payload) in its own file.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::dump::{DumpEntry, DumpReader, DUMP_MAGIC};
use crate::ioctl::command_number;
use crate::nvgpu::{NV_ESC_RM_ALLOC, NV_ESC_RM_CONTROL};

/// Bytes of payload shown by [`SeedInfo`]'s hex dump
pub const HEXDUMP_LIMIT: usize = 64;

/// Kind of call a seed replays, from its request's command number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeedKind {
    Control,
    Alloc,
    Unknown,
}

impl SeedKind {
    pub fn from_request(request: u64) -> Self {
        match command_number(request) {
            NV_ESC_RM_CONTROL => SeedKind::Control,
            NV_ESC_RM_ALLOC => SeedKind::Alloc,
            _ => SeedKind::Unknown,
        }
    }
}

impl fmt::Display for SeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeedKind::Control => "Control",
            SeedKind::Alloc => "Alloc",
            SeedKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// What [`extract_seeds`] did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub written: usize,
    pub duplicates: usize,
    pub control: usize,
    pub alloc: usize,
    pub files: Vec<PathBuf>,
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extracted {} seeds (Control: {}, Alloc: {}, duplicates skipped: {})",
            self.written, self.control, self.alloc, self.duplicates
        )
    }
}

/// File name prefix for seeds: the last component of the output directory
pub fn seed_prefix(out_dir: &Path) -> String {
    out_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "seed".to_string())
}

/// Split a dump into one file per unique entry.
///
/// Entries are de-duplicated by SHA-256 of header and payload. A damaged
/// entry ends extraction; seeds already written are kept.
pub fn extract_seeds(dump: &Path, out_dir: &Path) -> Result<SeedSummary> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create seed directory {}", out_dir.display()))?;
    let file =
        File::open(dump).with_context(|| format!("Failed to open dump {}", dump.display()))?;

    let prefix = seed_prefix(out_dir);
    let mut reader = DumpReader::new(BufReader::new(file));
    let mut seen: HashSet<[u8; 32]> = HashSet::new();
    let mut summary = SeedSummary::default();

    loop {
        let offset = reader.offset();
        let entry = match reader.read_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Stopping seed extraction: {}", e);
                break;
            }
        };

        let bytes = entry.to_bytes()?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();
        if !seen.insert(digest) {
            debug!(
                "Skipped duplicate seed at offset {} (sha256 {})",
                offset,
                hex::encode(&digest[..8])
            );
            summary.duplicates += 1;
            continue;
        }

        let kind = SeedKind::from_request(entry.request_code);
        match kind {
            SeedKind::Control => summary.control += 1,
            SeedKind::Alloc => summary.alloc += 1,
            SeedKind::Unknown => {}
        }

        let path = out_dir.join(format!("{}_{:06}.bin", prefix, summary.written));
        fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write seed {}", path.display()))?;
        info!(
            "Saved seed {}: type={}, request={:#x}, subclass={:#x}, arg_size={}",
            summary.written,
            kind,
            entry.request_code,
            entry.subcategory,
            entry.payload.len()
        );
        summary.written += 1;
        summary.files.push(path);
    }

    Ok(summary)
}

/// A parsed seed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedInfo {
    pub path: PathBuf,
    pub kind: SeedKind,
    pub entry: DumpEntry,
}

/// Read and validate a single seed file
pub fn inspect_seed(path: &Path) -> Result<SeedInfo> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read seed {}", path.display()))?;
    let entry = DumpEntry::from_exact_bytes(&bytes)
        .with_context(|| format!("Invalid seed file {}", path.display()))?;
    Ok(SeedInfo {
        path: path.to_path_buf(),
        kind: SeedKind::from_request(entry.request_code),
        entry,
    })
}

impl fmt::Display for SeedInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(40);
        let e = &self.entry;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Seed File:      {}", self.path.display())?;
        writeln!(f, "Type:           {}", self.kind)?;
        writeln!(f, "Magic:          {:#x} (NVID)", DUMP_MAGIC)?;
        writeln!(f, "Request Code:   {:#x}", e.request_code)?;
        writeln!(f, "Return Value:   {} ({:#x})", e.return_code, e.return_code)?;
        writeln!(f, "Subclass:       {:#x}", e.subcategory)?;
        writeln!(f, "Argument Size:  {} bytes", e.payload.len())?;
        writeln!(f, "{}", rule)?;
        writeln!(f, "Argument Data (first {} bytes):", HEXDUMP_LIMIT)?;
        if e.payload.is_empty() {
            return writeln!(f, " (No argument data)");
        }
        let shown = &e.payload[..e.payload.len().min(HEXDUMP_LIMIT)];
        for line in shown.chunks(16) {
            let bytes: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
            writeln!(f, "{}", bytes.join(" "))?;
        }
        Ok(())
    }
}
