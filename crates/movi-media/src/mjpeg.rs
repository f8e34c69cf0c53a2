//! Raw MJPEG demux: a bare concatenation of JPEG images with no container.
//!
//! The stream is indexed once by scanning for SOI/EOI marker pairs. The scan
//! trusts JPEG byte stuffing: `FF D8` and `FF D9` cannot occur inside
//! entropy-coded data, so no segment-level parsing is needed. A stray SOI
//! before the matching EOI re-anchors the current frame.

use crate::demux::Demux;
use crate::error::{Error, Result};
use crate::fourcc::{fourcc, FourCc};
use crate::info::{LoadOptions, VideoStreamInfo};
use crate::reader::SharedReader;
use std::io::{Read, Seek};
use tracing::debug;

pub const FOURCC_MJPG: FourCc = fourcc(b"MJPG");

const SCAN_CHUNK: usize = 8096;

pub struct RawMjpegDemux<R> {
    reader: SharedReader<R>,
    video_info: VideoStreamInfo,
    /// Byte offset and length of each image, SOI through EOI inclusive.
    frames: Vec<(u64, u32)>,
    video_pos: usize,
}

impl<R: Read + Seek + Send> RawMjpegDemux<R> {
    pub fn new(reader: SharedReader<R>, options: &LoadOptions) -> Result<Self> {
        let frames = index_frames(&reader)?;
        if frames.is_empty() {
            return Err(Error::NoDemux);
        }
        debug!(frames = frames.len(), "raw MJPEG stream indexed");

        let mut info = options.video_override.clone().unwrap_or_default();
        info.codec_fourcc = FOURCC_MJPG;
        info.frame_count = frames.len() as u32;
        Ok(Self {
            reader,
            video_info: info,
            frames,
            video_pos: 0,
        })
    }
}

/// One pass over the stream collecting `(offset, length)` per image.
fn index_frames<R: Read + Seek>(reader: &SharedReader<R>) -> Result<Vec<(u64, u32)>> {
    let mut frames = Vec::new();
    let mut buf = vec![0u8; SCAN_CHUNK];
    let mut offset = 0u64;
    let mut prev = 0u8;
    let mut start: Option<u64> = None;
    loop {
        let base = offset;
        let got = reader.read_at(&mut offset, &mut buf)?;
        if got == 0 {
            break;
        }
        for (i, &b) in buf[..got].iter().enumerate() {
            if prev == 0xFF {
                let at = base + i as u64 - 1;
                if b == 0xD8 {
                    start = Some(at);
                } else if b == 0xD9 {
                    if let Some(s) = start.take() {
                        frames.push((s, (at + 2 - s) as u32));
                    }
                }
            }
            prev = b;
        }
    }
    Ok(frames)
}

impl<R: Read + Seek + Send> Demux for RawMjpegDemux<R> {
    fn video_info(&self) -> Option<&VideoStreamInfo> {
        Some(&self.video_info)
    }

    fn audio_info(&self) -> Option<&crate::info::AudioStreamInfo> {
        None
    }

    fn video_position(&self) -> usize {
        self.video_pos
    }

    fn set_video_position(&mut self, frame: usize) -> Result<()> {
        self.video_pos = frame;
        Ok(())
    }

    fn audio_position(&self) -> usize {
        0
    }

    fn set_audio_position(&mut self, _sample: usize) -> Result<()> {
        Err(Error::NotSupported("raw MJPEG has no audio stream"))
    }

    fn read_video_frame(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let Some(&(offset, length)) = self.frames.get(self.video_pos) else {
            out.clear();
            return Ok(0);
        };
        out.resize(length as usize, 0);
        let mut at = offset;
        self.reader.read_exact_at(&mut at, out, "JPEG image data")?;
        self.video_pos += 1;
        Ok(length as usize)
    }

    fn read_audio_samples(&mut self, _out: &mut Vec<u8>, _count: usize) -> Result<usize> {
        Err(Error::NotSupported("raw MJPEG has no audio stream"))
    }
}
