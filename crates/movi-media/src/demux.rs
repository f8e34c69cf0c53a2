//! The demux abstraction every container front-end implements, plus
//! signature-based selection of a demux for an unknown stream.

use crate::avi::AviDemux;
use crate::error::{Error, Result};
use crate::info::{AudioStreamInfo, DemuxOverride, LoadOptions, VideoStreamInfo};
use crate::mjpeg::RawMjpegDemux;
use crate::pcm::RawPcmDemux;
use crate::reader::SharedReader;
use std::io::{Read, Seek};

/// Random-access (where the source allows) frame and sample extraction from
/// one container.
///
/// Positions are in frames for video and samples for audio. Implementations
/// backed by non-seekable sources return [`Error::NotSeekable`] from the
/// position setters; implementations without an audio stream return
/// [`Error::NotSupported`] from the audio operations.
pub trait Demux: Send {
    fn video_info(&self) -> Option<&VideoStreamInfo>;
    fn audio_info(&self) -> Option<&AudioStreamInfo>;

    fn has_video(&self) -> bool {
        self.video_info().is_some()
    }
    fn has_audio(&self) -> bool {
        self.audio_info().is_some()
    }

    /// Next frame to be read, 0 when there is no video stream.
    fn video_position(&self) -> usize;
    fn set_video_position(&mut self, frame: usize) -> Result<()>;

    /// Next sample to be read, 0 when there is no audio stream.
    fn audio_position(&self) -> usize;
    fn set_audio_position(&mut self, sample: usize) -> Result<()>;

    /// Read the frame at the current position into `out` (replacing its
    /// contents) and advance. Returns the byte count, 0 past the end.
    fn read_video_frame(&mut self, out: &mut Vec<u8>) -> Result<usize>;

    /// Read up to `count` samples at the current position into `out`
    /// (replacing its contents) and advance by the samples actually read.
    /// Returns that sample count, 0 past the end.
    fn read_audio_samples(&mut self, out: &mut Vec<u8>, count: usize) -> Result<usize>;

    /// Release background resources. Reads after this return errors or 0.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Pick and initialize a demux for a seekable byte stream.
///
/// Honors `options.demux` when it names a container, otherwise sniffs the
/// first bytes: a RIFF signature selects AVI, a JPEG SOI marker at the start
/// paired with an EOI at the very end selects raw MJPEG. Raw PCM is never
/// detected, it carries no signature and must be forced.
pub fn demux_for<R: Read + Seek + Send + 'static>(
    stream: R,
    options: &LoadOptions,
) -> Result<Box<dyn Demux>> {
    let reader = SharedReader::new(stream);
    match options.demux {
        DemuxOverride::Avi => return Ok(Box::new(AviDemux::new(reader, options)?)),
        DemuxOverride::RawMjpeg => return Ok(Box::new(RawMjpegDemux::new(reader, options)?)),
        DemuxOverride::RawPcm => return Ok(Box::new(RawPcmDemux::new(reader, options)?)),
        DemuxOverride::Detect => {}
    }

    let len = reader.len()?;
    let mut head = [0u8; 4];
    let mut offset = 0u64;
    let got = reader.read_at(&mut offset, &mut head)?;

    if got == 4 && (&head == b"RIFF" || &head == b"RIFX") {
        return Ok(Box::new(AviDemux::new(reader, options)?));
    }
    if got >= 2 && head[0] == 0xFF && head[1] == 0xD8 && len >= 4 {
        let mut tail = [0u8; 2];
        let mut at = len - 2;
        reader.read_exact_at(&mut at, &mut tail, "stream tail")?;
        if tail == [0xFF, 0xD9] {
            return Ok(Box::new(RawMjpegDemux::new(reader, options)?));
        }
    }
    Err(Error::NoDemux)
}
