//! Raw payload dumps of pre-call control/alloc snapshots
//!
//! Each entry is a fixed 24-byte little-endian header followed by the
//! payload. Entries are appended to a single file and are used later as
//! replay and fuzzing seeds.
//!
//! ```text
//! +-------+--------------+--------+-------------+--------------+---------+
//! | magic | request_code | return | subcategory | payload_size | payload |
//! |  u32  |     u64      |  u32   |     u32     |     u32      |   ...   |
//! +-------+--------------+--------+-------------+--------------+---------+
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::classify::Classification;
use crate::framing::read_up_to;
use crate::record::CallRecord;

/// `"NVID"`
pub const DUMP_MAGIC: u32 = 0x4E56_4944;
pub const DUMP_HEADER_SIZE: usize = 24;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid magic {found:#010x} at offset {offset} (expected 0x4e564944)")]
    BadMagic { offset: u64, found: u32 },

    #[error("truncated header at offset {offset}: got {got} of 24 bytes")]
    TruncatedHeader { offset: u64, got: usize },

    #[error("truncated payload at offset {offset}: expected {expected} bytes, got {got}")]
    TruncatedPayload {
        offset: u64,
        expected: u32,
        got: u64,
    },

    #[error("payload size field says {expected} bytes but {got} follow the header")]
    SizeMismatch { expected: u32, got: usize },

    #[error("payload of {len} bytes does not fit the 32-bit size field")]
    PayloadTooLarge { len: usize },
}

/// One dumped call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpEntry {
    pub request_code: u64,
    /// Always 0 when written by [`DumpWriter`]
    pub return_code: u32,
    pub subcategory: u32,
    pub payload: Vec<u8>,
}

impl DumpEntry {
    /// Build the entry for a classified pre-call snapshot.
    ///
    /// Control and alloc calls carrying second-level parameters dump those;
    /// everything else dumps the top-level argument bytes.
    pub fn from_call(record: &CallRecord, c: &Classification) -> Self {
        let payload = if uses_params_payload(record, c) {
            &record.params_payload
        } else {
            &record.arg_payload
        };
        Self {
            request_code: record.request_code,
            return_code: 0,
            subcategory: c.subcategory,
            payload: payload.clone(),
        }
    }

    pub fn header_bytes(&self) -> Result<[u8; DUMP_HEADER_SIZE], DumpError> {
        let size = payload_size(self.payload.len())?;
        let mut header = [0u8; DUMP_HEADER_SIZE];
        header[0..4].copy_from_slice(&DUMP_MAGIC.to_le_bytes());
        header[4..12].copy_from_slice(&self.request_code.to_le_bytes());
        header[12..16].copy_from_slice(&self.return_code.to_le_bytes());
        header[16..20].copy_from_slice(&self.subcategory.to_le_bytes());
        header[20..24].copy_from_slice(&size.to_le_bytes());
        Ok(header)
    }

    /// Header followed by payload
    pub fn to_bytes(&self) -> Result<Vec<u8>, DumpError> {
        let header = self.header_bytes()?;
        let mut out = Vec::with_capacity(DUMP_HEADER_SIZE + self.payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse a buffer holding exactly one entry (a seed file)
    pub fn from_exact_bytes(bytes: &[u8]) -> Result<Self, DumpError> {
        if bytes.len() < DUMP_HEADER_SIZE {
            return Err(DumpError::TruncatedHeader {
                offset: 0,
                got: bytes.len(),
            });
        }
        let mut header = [0u8; DUMP_HEADER_SIZE];
        header.copy_from_slice(&bytes[..DUMP_HEADER_SIZE]);
        let (mut entry, size) = parse_header(&header, 0)?;
        let rest = &bytes[DUMP_HEADER_SIZE..];
        if rest.len() != size as usize {
            return Err(DumpError::SizeMismatch {
                expected: size,
                got: rest.len(),
            });
        }
        entry.payload = rest.to_vec();
        Ok(entry)
    }
}

fn payload_size(len: usize) -> Result<u32, DumpError> {
    u32::try_from(len).map_err(|_| DumpError::PayloadTooLarge { len })
}

/// Whether the second-level parameters are the payload to keep
pub fn uses_params_payload(record: &CallRecord, c: &Classification) -> bool {
    c.category.is_escape() && !record.params_payload.is_empty()
}

fn parse_header(
    header: &[u8; DUMP_HEADER_SIZE],
    offset: u64,
) -> Result<(DumpEntry, u32), DumpError> {
    let u32_at = |off: usize| {
        let mut b = [0u8; 4];
        b.copy_from_slice(&header[off..off + 4]);
        u32::from_le_bytes(b)
    };
    let magic = u32_at(0);
    if magic != DUMP_MAGIC {
        return Err(DumpError::BadMagic {
            offset,
            found: magic,
        });
    }
    let mut request = [0u8; 8];
    request.copy_from_slice(&header[4..12]);
    let entry = DumpEntry {
        request_code: u64::from_le_bytes(request),
        return_code: u32_at(12),
        subcategory: u32_at(16),
        payload: Vec::new(),
    };
    Ok((entry, u32_at(20)))
}

/// Appends entries to a dump file, syncing after each one
#[derive(Debug)]
pub struct DumpWriter {
    file: File,
    path: PathBuf,
    entries: u64,
}

impl DumpWriter {
    /// Open (creating if needed) in append mode
    pub fn open(path: &Path) -> Result<Self, DumpError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries written through this handle
    pub fn entries_written(&self) -> u64 {
        self.entries
    }

    /// Append one entry and flush it to disk before returning
    pub fn write_entry(
        &mut self,
        record: &CallRecord,
        c: &Classification,
    ) -> Result<(), DumpError> {
        let entry = DumpEntry::from_call(record, c);
        // One write per entry so a failure cannot leave a header without its payload
        self.file.write_all(&entry.to_bytes()?)?;
        self.file.sync_data()?;
        self.entries += 1;
        debug!(
            "Dumped pre raw ioctl: request={:#x}, arg_size={} (secondary={})",
            entry.request_code,
            entry.payload.len(),
            uses_params_payload(record, c)
        );
        Ok(())
    }
}

/// Reads entries back from a dump
#[derive(Debug)]
pub struct DumpReader<R> {
    inner: R,
    offset: u64,
    failed: bool,
}

impl<R: Read> DumpReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            failed: false,
        }
    }

    /// Byte offset of the next entry
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next entry, `Ok(None)` at a clean end of file
    pub fn read_entry(&mut self) -> Result<Option<DumpEntry>, DumpError> {
        let mut header = [0u8; DUMP_HEADER_SIZE];
        match read_up_to(&mut self.inner, &mut header)? {
            0 => return Ok(None),
            DUMP_HEADER_SIZE => {}
            got => {
                return Err(DumpError::TruncatedHeader {
                    offset: self.offset,
                    got,
                })
            }
        }
        let (mut entry, size) = parse_header(&header, self.offset)?;
        let got = (&mut self.inner)
            .take(u64::from(size))
            .read_to_end(&mut entry.payload)? as u64;
        if got != u64::from(size) {
            return Err(DumpError::TruncatedPayload {
                offset: self.offset,
                expected: size,
                got,
            });
        }
        self.offset += (DUMP_HEADER_SIZE as u64) + got;
        Ok(Some(entry))
    }
}

impl<R: Read> Iterator for DumpReader<R> {
    type Item = Result<DumpEntry, DumpError>;

    /// Stops after the first error
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.read_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
