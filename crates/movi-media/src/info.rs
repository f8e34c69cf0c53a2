//! Stream descriptions and load-time options.

use crate::fourcc::FourCc;
use std::time::Duration;

/// Properties of a video stream, as declared by the container or overridden
/// by the caller.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct VideoStreamInfo {
    /// Codec fourcc, `FourCc::NONE` when unknown.
    pub codec_fourcc: FourCc,
    /// Nominal frames per second.
    pub framerate: f32,
    pub width: u32,
    pub height: u32,
    /// Bits per pixel of the decoded image.
    pub bit_depth: u32,
    /// Total frame count, including padding frames.
    pub frame_count: u32,
}

impl Default for VideoStreamInfo {
    fn default() -> Self {
        Self {
            codec_fourcc: FourCc::NONE,
            framerate: 30.0,
            width: 1,
            height: 1,
            bit_depth: 32,
            frame_count: 1,
        }
    }
}

impl VideoStreamInfo {
    pub fn length_seconds(&self) -> f32 {
        self.frame_count as f32 / self.framerate
    }
}

/// Properties of an audio stream.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AudioStreamInfo {
    /// Codec fourcc or wave format tag widened to 32 bits.
    pub codec_fourcc: FourCc,
    pub sample_rate: u32,
    pub channels: u16,
    /// Bits per sample for one channel.
    pub sample_size: u16,
    /// Total sample count (one sample spans all channels).
    pub sample_count: u32,
}

impl Default for AudioStreamInfo {
    fn default() -> Self {
        Self {
            codec_fourcc: FourCc::NONE,
            sample_rate: 44100,
            channels: 2,
            sample_size: 16,
            sample_count: 0,
        }
    }
}

impl AudioStreamInfo {
    /// Bytes one sample occupies across all channels.
    pub fn sample_size_bytes(&self) -> u32 {
        self.channels as u32 * (self.sample_size as u32 / 8)
    }

    pub fn length_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count as f32 / self.sample_rate as f32
    }
}

/// What to do when loading fails partway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Return the error to the caller.
    Propagate,
    /// Log the error and leave the movie unloaded.
    #[default]
    Log,
}

/// Force a specific demux instead of probing the stream signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemuxOverride {
    /// Probe the first bytes of the stream.
    #[default]
    Detect,
    Avi,
    RawMjpeg,
    RawPcm,
}

/// Options controlling [`Movie::load`](crate::movie::Movie::load).
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Skip the video stream even if the container has one.
    pub skip_video: bool,
    /// Skip the audio stream even if the container has one.
    pub skip_audio: bool,
    /// Read every video frame into memory up front.
    pub preload_video: bool,
    /// Read the whole audio stream into memory up front.
    pub preload_audio: bool,
    /// Replaces or, for headerless sources, supplies the video description.
    pub video_override: Option<VideoStreamInfo>,
    /// Replaces or supplies the audio description. Required by the raw PCM
    /// demux, which has no header to read one from.
    pub audio_override: Option<AudioStreamInfo>,
    pub demux: DemuxOverride,
    pub error_policy: ErrorPolicy,
    /// Network connect timeout for streamed sources.
    pub connect_timeout: Option<Duration>,
}

impl LoadOptions {
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout.unwrap_or(Duration::from_secs(10))
    }
}
