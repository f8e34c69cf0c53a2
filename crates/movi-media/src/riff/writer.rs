//! Incremental RIFF writer.
//!
//! Sizes of RIFF, LIST, and begun chunks are only known when the element is
//! ended, so each `begin_*` writes a placeholder size and pushes its offset
//! onto a stack; the matching `end_*` seeks back and patches the real size in.
//! The output therefore has to be `Write + Seek`; strictly append-only sinks
//! cannot host this writer.

use super::{LIST, RIFF};
use crate::error::{Error, Result};
use crate::fourcc::FourCc;
use std::io::{Seek, SeekFrom, Write};

/// RIFF stream writer with deferred size patch-up.
pub struct RiffWriter<W> {
    writer: W,
    // offsets of the size fields of every open element, innermost last
    stack: Vec<u64>,
}

impl<W: Write + Seek> RiffWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stack: Vec::new(),
        }
    }

    fn begin(&mut self, tag: FourCc, kind: FourCc) -> Result<()> {
        self.writer.write_all(&tag.0.to_le_bytes())?;
        self.stack.push(self.writer.stream_position()?);
        self.writer.write_all(&0u32.to_le_bytes())?;
        self.writer.write_all(&kind.0.to_le_bytes())?;
        Ok(())
    }

    /// Open a `RIFF` element of the given form type.
    pub fn begin_riff(&mut self, form: FourCc) -> Result<()> {
        self.begin(RIFF, form)
    }

    /// Open a `LIST` element of the given list type.
    pub fn begin_list(&mut self, kind: FourCc) -> Result<()> {
        self.begin(LIST, kind)
    }

    /// Open a plain chunk. The caller writes the body with the `put_*`
    /// methods and closes it with [`end`](Self::end).
    pub fn begin_chunk(&mut self, id: FourCc) -> Result<()> {
        self.writer.write_all(&id.0.to_le_bytes())?;
        self.stack.push(self.writer.stream_position()?);
        self.writer.write_all(&0u32.to_le_bytes())?;
        Ok(())
    }

    /// Close the innermost open element, padding to a word boundary and
    /// patching its size field.
    pub fn end(&mut self) -> Result<()> {
        let size_field = self
            .stack
            .pop()
            .ok_or(Error::NotSupported("no open RIFF element to end"))?;
        let pos = self.writer.stream_position()?;
        let length = pos - size_field;
        if length > i32::MAX as u64 {
            return Err(Error::ElementTooLarge(length));
        }
        let padding = length & 1;
        if padding != 0 {
            self.writer.write_all(&[0u8])?;
        }
        self.writer.seek(SeekFrom::Start(size_field))?;
        self.writer.write_all(&((length - 4) as u32).to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(pos + padding))?;
        Ok(())
    }

    /// Write a complete chunk: id, size, data, and pad byte when odd.
    pub fn write_chunk(&mut self, id: FourCc, data: &[u8]) -> Result<()> {
        self.writer.write_all(&id.0.to_le_bytes())?;
        self.writer.write_all(&(data.len() as u32).to_le_bytes())?;
        self.writer.write_all(data)?;
        if data.len() % 2 != 0 {
            self.writer.write_all(&[0u8])?;
        }
        Ok(())
    }

    /// Bytes written into the innermost open element so far (including its
    /// size field), zero when nothing is open.
    pub fn current_element_size(&mut self) -> Result<u64> {
        match self.stack.last() {
            Some(&size_field) => Ok(self.writer.stream_position()? - size_field),
            None => Ok(0),
        }
    }

    /// Current absolute write position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.writer.stream_position()?)
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        Ok(self.writer.write_all(&[v])?)
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        Ok(self.writer.write_all(&v.to_le_bytes())?)
    }

    pub fn put_i16(&mut self, v: i16) -> Result<()> {
        Ok(self.writer.write_all(&v.to_le_bytes())?)
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        Ok(self.writer.write_all(&v.to_le_bytes())?)
    }

    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        Ok(self.writer.write_all(&v.to_le_bytes())?)
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        Ok(self.writer.write_all(&v.to_le_bytes())?)
    }

    pub fn put_fourcc(&mut self, v: FourCc) -> Result<()> {
        self.put_u32(v.0)
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.writer.write_all(data)?)
    }

    /// Overwrite a `u32` at an absolute offset, restoring the write position.
    pub fn patch_u32(&mut self, at: u64, v: u32) -> Result<()> {
        let pos = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(at))?;
        self.writer.write_all(&v.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Overwrite a `u64` at an absolute offset, restoring the write position.
    pub fn patch_u64(&mut self, at: u64, v: u64) -> Result<()> {
        let pos = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(at))?;
        self.writer.write_all(&v.to_le_bytes())?;
        self.writer.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// End every open element so the output is at least structurally
    /// consistent, flush, and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        while !self.stack.is_empty() {
            self.end()?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fourcc::fourcc;
    use std::io::Cursor;

    #[test]
    fn test_chunk_padding_and_size_patch() {
        let mut w = RiffWriter::new(Cursor::new(Vec::new()));
        w.begin_riff(fourcc(b"xmpl")).unwrap();
        w.write_chunk(fourcc(b"data"), &[1, 2, 3]).unwrap();
        let out = w.finish().unwrap().into_inner();

        // RIFF(4) size(4) form(4) id(4) size(4) data(3) pad(1)
        assert_eq!(out.len(), 24);
        assert_eq!(&out[..4], b"RIFF");
        // RIFF size = everything after its own size field
        assert_eq!(u32::from_le_bytes(out[4..8].try_into().unwrap()), 16);
        assert_eq!(&out[8..12], b"xmpl");
        assert_eq!(&out[12..16], b"data");
        assert_eq!(u32::from_le_bytes(out[16..20].try_into().unwrap()), 3);
        assert_eq!(&out[20..23], &[1, 2, 3]);
        assert_eq!(out[23], 0);
    }

    #[test]
    fn test_nested_lists_patched_inside_out() {
        let mut w = RiffWriter::new(Cursor::new(Vec::new()));
        w.begin_riff(fourcc(b"xmpl")).unwrap();
        w.begin_list(fourcc(b"hdrl")).unwrap();
        w.write_chunk(fourcc(b"avih"), &[0u8; 8]).unwrap();
        w.end().unwrap();
        let out = w.finish().unwrap().into_inner();

        assert_eq!(&out[12..16], b"LIST");
        let list_size = u32::from_le_bytes(out[16..20].try_into().unwrap());
        // list type + chunk header + chunk body
        assert_eq!(list_size, 4 + 8 + 8);
    }

    #[test]
    fn test_finish_closes_loose_elements() {
        let mut w = RiffWriter::new(Cursor::new(Vec::new()));
        w.begin_riff(fourcc(b"xmpl")).unwrap();
        w.begin_list(fourcc(b"movi")).unwrap();
        let out = w.finish().unwrap().into_inner();
        let riff_size = u32::from_le_bytes(out[4..8].try_into().unwrap());
        assert_eq!(riff_size as usize, out.len() - 8);
    }
}
