//! RIFF stream tokenizer.

use super::{LIST, RIFF, RIFX};
use crate::error::{Error, Result};
use crate::fourcc::FourCc;
use crate::reader::SharedReader;
use std::io::{Read, Seek};

/// Callbacks invoked by [`RiffParser::read_next`], one per element kind.
///
/// For RIFF and LIST elements the returned bool decides whether the parser
/// descends into the element's children (`true`) or skips its entire byte
/// range (`false`). The `pos` argument is the absolute offset of the
/// element's payload: for RIFF/LIST the first child, for chunks the first
/// data byte.
pub trait RiffVisitor {
    fn on_riff(&mut self, form: FourCc, len: u32, pos: u64) -> Result<bool> {
        let _ = (form, len, pos);
        Ok(true)
    }

    fn on_list(&mut self, kind: FourCc, len: u32, pos: u64) -> Result<bool> {
        let _ = (kind, len, pos);
        Ok(false)
    }

    fn on_chunk(&mut self, id: FourCc, len: u32, padded_len: u32, pos: u64) -> Result<()> {
        let _ = (id, len, padded_len, pos);
        Ok(())
    }
}

/// RIFF stream tokenizer.
///
/// Holds no mutable state besides the next-element offset, so a cold parser
/// driven by `read_next` in a loop walks the stream deterministically.
pub struct RiffParser<R> {
    reader: SharedReader<R>,
    next_element: u64,
    stream_kind: FourCc,
}

impl<R: Read + Seek> RiffParser<R> {
    /// Validate the stream's first four bytes and build a parser.
    ///
    /// Anything other than a `RIFF` or `RIFX` marker fails with
    /// [`Error::NotRiff`].
    pub fn new(reader: SharedReader<R>) -> Result<Self> {
        let mut p = 0u64;
        let stream_kind = reader
            .read_fourcc(&mut p)
            .map_err(|_| Error::NotRiff)?;
        if stream_kind != RIFF && stream_kind != RIFX {
            return Err(Error::NotRiff);
        }
        Ok(Self {
            reader,
            next_element: 0,
            stream_kind,
        })
    }

    /// Read the next element, dispatching to the matching visitor callback.
    ///
    /// Returns `Ok(false)` exactly when fewer than 8 bytes remain (clean end
    /// of stream). A size field claiming more bytes than the stream holds is
    /// a [`Error::SizeMismatch`], not end of stream.
    pub fn read_next(&mut self, visitor: &mut dyn RiffVisitor) -> Result<bool> {
        if self.reader.bytes_left(self.next_element)? < 8 {
            return Ok(false);
        }

        let id = self.reader.read_fourcc(&mut self.next_element)?;
        let size = self.reader.read_u32(&mut self.next_element)?;

        if self.reader.bytes_left(self.next_element)? < size as u64 {
            return Err(Error::SizeMismatch {
                fourcc: id,
                need: size as u64,
            });
        }

        if id == RIFF || id == RIFX || id == LIST {
            // payload starts with the 4-byte form/list type
            if size < 4 {
                return Err(Error::SizeMismatch {
                    fourcc: id,
                    need: size as u64,
                });
            }
            let kind = self.reader.read_fourcc(&mut self.next_element)?;
            let len = size - 4;
            let pos = self.next_element;
            let descend = if id == LIST {
                visitor.on_list(kind, len, pos)?
            } else {
                visitor.on_riff(kind, len, pos)?
            };
            if !descend {
                self.next_element += len as u64;
            }
        } else {
            // chunks are padded to a word boundary
            let padded = size + (size & 1);
            visitor.on_chunk(id, size, padded, self.next_element)?;
            self.next_element += padded as u64;
        }
        Ok(true)
    }

    /// Restart iteration from the beginning of the stream.
    pub fn rewind(&mut self) {
        self.next_element = 0;
    }

    /// Offset of the next element to be read.
    pub fn position(&self) -> u64 {
        self.next_element
    }

    /// The container marker (`RIFF` or `RIFX`).
    pub fn stream_kind(&self) -> FourCc {
        self.stream_kind
    }

    /// The shared reader this parser walks.
    pub fn reader(&self) -> &SharedReader<R> {
        &self.reader
    }
}
