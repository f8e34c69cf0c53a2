//! The remux abstraction container back-ends implement.

use crate::error::{Error, Result};
use crate::info::{AudioStreamInfo, VideoStreamInfo};

/// Sequential frame and sample emission into one container.
///
/// Frames are appended in presentation order. Random-offset writes are not
/// part of the contract and fail with
/// [`Error::NotSupported`](crate::Error::NotSupported); the one way to refer
/// back is [`write_lookback_frame`](Remux::write_lookback_frame), which adds
/// an index entry sharing an already written frame's bytes.
pub trait Remux {
    fn video_info(&self) -> &VideoStreamInfo;
    fn audio_info(&self) -> Option<&AudioStreamInfo>;

    /// Frames appended so far.
    fn written_frames(&self) -> usize;
    /// Samples appended so far.
    fn written_samples(&self) -> usize;

    /// Append one encoded frame.
    fn write_video_frame(&mut self, data: &[u8], keyframe: bool) -> Result<()>;

    /// Append interleaved samples; `data` must hold whole samples.
    fn write_audio_samples(&mut self, data: &[u8]) -> Result<()>;

    /// Append one frame that repeats an already written frame's byte range.
    /// No data is written, only an index entry. Negative `frame` counts back
    /// from the end, so `-1` repeats the most recent frame.
    fn write_lookback_frame(&mut self, frame: i64) -> Result<()> {
        let _ = frame;
        Err(Error::NotSupported("look-back frames"))
    }

    /// Random-offset frame writes are outside this contract.
    fn write_video_frame_at(&mut self, _data: &[u8], _keyframe: bool, _frame: u64) -> Result<()> {
        Err(Error::NotSupported("random-access frame writes"))
    }

    /// Random-offset sample writes are outside this contract.
    fn write_audio_samples_at(&mut self, _data: &[u8], _sample: u64) -> Result<()> {
        Err(Error::NotSupported("random-access sample writes"))
    }
}
