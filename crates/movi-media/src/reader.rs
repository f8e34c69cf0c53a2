//! Thread-safe positioned reads over a shared byte stream.
//!
//! A player reads video and audio on independent schedules, so two call
//! sites may interleave reads on the same file handle. Every read here is
//! a "seek then read" pair executed under one mutex, so interleaved callers
//! can never observe each other's cursor. Callers track their own offsets;
//! each typed read advances the offset it was handed by the bytes consumed.

use crate::error::Result;
use crate::fourcc::FourCc;
use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

/// Shared random-access reader over one `Read + Seek` stream.
///
/// Cloning is cheap and hands out another handle to the same underlying
/// stream and lock.
pub struct SharedReader<R> {
    inner: Arc<Mutex<R>>,
}

impl<R> Clone for SharedReader<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Read + Seek> SharedReader<R> {
    /// Wrap a stream.
    pub fn new(stream: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(stream)),
        }
    }

    /// Total stream length in bytes.
    ///
    /// Queried from the stream every time, so growing files report their
    /// current size.
    pub fn len(&self) -> Result<u64> {
        let mut stream = self.inner.lock();
        Ok(stream.seek(SeekFrom::End(0))?)
    }

    /// True when the stream currently holds no bytes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Bytes between `offset` and the end of the stream. Zero when the
    /// offset is already past the end.
    pub fn bytes_left(&self, offset: u64) -> Result<u64> {
        Ok(self.len()?.saturating_sub(offset))
    }

    /// Read up to `buf.len()` bytes at `offset`, advancing `offset` by the
    /// bytes actually read. A short count signals end of stream, never an
    /// error.
    pub fn read_at(&self, offset: &mut u64, buf: &mut [u8]) -> Result<usize> {
        let mut stream = self.inner.lock();
        stream.seek(SeekFrom::Start(*offset))?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = stream.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        *offset += filled as u64;
        Ok(filled)
    }

    /// Read exactly `buf.len()` bytes at `offset` or fail with a truncation
    /// error naming `what`.
    pub fn read_exact_at(&self, offset: &mut u64, buf: &mut [u8], what: &'static str) -> Result<()> {
        if self.read_at(offset, buf)? != buf.len() {
            return Err(crate::Error::Truncated(what));
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: &mut u64) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact_at(offset, &mut buf, "u8")?;
        Ok(buf[0])
    }

    pub fn read_u16(&self, offset: &mut u64) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_at(offset, &mut buf, "u16")?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_i16(&self, offset: &mut u64) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_exact_at(offset, &mut buf, "i16")?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_u32(&self, offset: &mut u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact_at(offset, &mut buf, "u32")?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_i32(&self, offset: &mut u64) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact_at(offset, &mut buf, "i32")?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_u64(&self, offset: &mut u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_at(offset, &mut buf, "u64")?;
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_i64(&self, offset: &mut u64) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact_at(offset, &mut buf, "i64")?;
        Ok(i64::from_le_bytes(buf))
    }

    /// Read a four-character code.
    pub fn read_fourcc(&self, offset: &mut u64) -> Result<FourCc> {
        Ok(FourCc(self.read_u32(offset)?))
    }

    /// Read `count` little-endian `u32`s into `buf`, returning how many were
    /// fully read before the stream ended.
    pub fn read_u32_into(&self, offset: &mut u64, buf: &mut [u32], count: usize) -> Result<usize> {
        debug_assert!(count <= buf.len());
        let mut raw = vec![0u8; count * 4];
        let read = self.read_at(offset, &mut raw)?;
        let whole = read / 4;
        for (i, chunk) in raw[..whole * 4].chunks_exact(4).enumerate() {
            buf[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        // back the offset up over any trailing partial word
        *offset -= (read - whole * 4) as u64;
        Ok(whole)
    }
}
