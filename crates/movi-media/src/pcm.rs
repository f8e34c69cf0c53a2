//! Raw PCM demux: headerless interleaved samples.
//!
//! There is nothing in the stream to describe itself, so the caller must
//! supply an [`AudioStreamInfo`] override; a zero `sample_count` in it is
//! filled in from the stream length.

use crate::demux::Demux;
use crate::error::{Error, Result};
use crate::info::{AudioStreamInfo, LoadOptions, VideoStreamInfo};
use crate::reader::SharedReader;
use std::io::{Read, Seek};

pub struct RawPcmDemux<R> {
    reader: SharedReader<R>,
    audio_info: AudioStreamInfo,
    sample_bytes: u32,
    audio_pos: usize,
}

impl<R: Read + Seek + Send> RawPcmDemux<R> {
    pub fn new(reader: SharedReader<R>, options: &LoadOptions) -> Result<Self> {
        let mut info = options
            .audio_override
            .clone()
            .ok_or(Error::MissingStreamInfo("audio"))?;
        let sample_bytes = info.sample_size_bytes().max(1);
        if info.sample_count == 0 {
            info.sample_count = (reader.len()? / sample_bytes as u64) as u32;
        }
        Ok(Self {
            reader,
            audio_info: info,
            sample_bytes,
            audio_pos: 0,
        })
    }
}

impl<R: Read + Seek + Send> Demux for RawPcmDemux<R> {
    fn video_info(&self) -> Option<&VideoStreamInfo> {
        None
    }

    fn audio_info(&self) -> Option<&AudioStreamInfo> {
        Some(&self.audio_info)
    }

    fn video_position(&self) -> usize {
        0
    }

    fn set_video_position(&mut self, _frame: usize) -> Result<()> {
        Err(Error::NotSupported("raw PCM has no video stream"))
    }

    fn audio_position(&self) -> usize {
        self.audio_pos
    }

    fn set_audio_position(&mut self, sample: usize) -> Result<()> {
        self.audio_pos = sample;
        Ok(())
    }

    fn read_video_frame(&mut self, _out: &mut Vec<u8>) -> Result<usize> {
        Err(Error::NotSupported("raw PCM has no video stream"))
    }

    fn read_audio_samples(&mut self, out: &mut Vec<u8>, count: usize) -> Result<usize> {
        let total = self.audio_info.sample_count as usize;
        if self.audio_pos >= total || count == 0 {
            out.clear();
            return Ok(0);
        }
        let count = count.min(total - self.audio_pos);
        out.resize(count * self.sample_bytes as usize, 0);
        let mut at = self.audio_pos as u64 * self.sample_bytes as u64;
        self.reader.read_exact_at(&mut at, out, "PCM sample data")?;
        self.audio_pos += count;
        Ok(count)
    }
}
