//! Incremental JPEG frame scanner for live byte streams.
//!
//! Multipart boundary headers are never trusted; only the JPEG SOI/EOI
//! marker bytes delimit frames, so streams with or without explicit
//! boundaries both work.

use bytes::Bytes;

/// A frame larger than this is assumed to be marker-less garbage and is
/// dropped rather than buffered forever.
const MAX_FRAME_BYTES: usize = 1 << 20;

const INITIAL_CAPACITY: usize = 128 * 1024;

/// Reassembles JPEG frames from arbitrarily chunked bytes.
#[derive(Debug)]
pub struct FrameScanner {
    buf: Vec<u8>,
    in_frame: bool,
    prev: u8,
}

impl Default for FrameScanner {
    fn default() -> Self {
        Self {
            buf: Vec::with_capacity(INITIAL_CAPACITY),
            in_frame: false,
            prev: 0,
        }
    }
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, calling `emit` once per completed frame. Markers
    /// split across chunk boundaries are handled; a stray SOI re-anchors
    /// the frame in progress.
    pub fn push(&mut self, chunk: &[u8], mut emit: impl FnMut(Bytes)) {
        for &b in chunk {
            if self.in_frame {
                self.buf.push(b);
            }
            if self.prev == 0xFF {
                if b == 0xD8 {
                    self.buf.clear();
                    self.buf.extend_from_slice(&[0xFF, 0xD8]);
                    self.in_frame = true;
                } else if b == 0xD9 && self.in_frame {
                    emit(Bytes::copy_from_slice(&self.buf));
                    self.buf.clear();
                    self.in_frame = false;
                }
            }
            if self.buf.len() > MAX_FRAME_BYTES {
                self.buf.clear();
                self.in_frame = false;
            }
            self.prev = b;
        }
    }
}
