//! Length-prefixed framing of the captured call stream
//!
//! Each frame is a little-endian `u64` byte count followed by that many
//! bytes of serialized record. End of input exactly on a frame boundary is
//! the normal end of the stream.

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

use crate::record::{encode_record, CallRecord};

/// Size of the length prefix in bytes
pub const LENGTH_PREFIX_SIZE: usize = 8;

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("truncated length prefix: got {got} of 8 bytes")]
    TruncatedLength { got: usize },

    #[error("truncated record: expected {expected} bytes, got {got}")]
    TruncatedPayload { expected: u64, got: u64 },

    #[error("I/O error reading stream: {0}")]
    Io(#[from] io::Error),
}

/// Fill `buf` until it is full or the reader hits end of input.
///
/// Returns how many bytes were read, so callers can tell a clean end
/// (0) from a short read.
pub(crate) fn read_up_to<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads frames one at a time from a byte source
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next frame.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        match read_up_to(&mut self.inner, &mut prefix)? {
            0 => return Ok(None),
            LENGTH_PREFIX_SIZE => {}
            got => return Err(FrameError::TruncatedLength { got }),
        }

        let expected = u64::from_le_bytes(prefix);
        // Grow as data arrives rather than trusting the prefix for an allocation
        let mut payload = Vec::new();
        let got = (&mut self.inner).take(expected).read_to_end(&mut payload)? as u64;
        if got != expected {
            return Err(FrameError::TruncatedPayload { expected, got });
        }
        Ok(Some(payload))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// Writes frames in the same format [`FrameReader`] consumes
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_frame(&mut self, payload: &[u8]) -> io::Result<()> {
        self.inner.write_all(&(payload.len() as u64).to_le_bytes())?;
        self.inner.write_all(payload)
    }

    /// Serialize and frame a record
    pub fn write_record(&mut self, record: &CallRecord) -> io::Result<()> {
        self.write_frame(&encode_record(record))
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
