//! The loaded-movie handle tying a demux to playback-side state.

use crate::demux::{demux_for, Demux};
use crate::error::Result;
use crate::info::{AudioStreamInfo, ErrorPolicy, LoadOptions, VideoStreamInfo};
use std::io::{Read, Seek, Write};
use tracing::{debug, error};

/// Normalized texture rectangle of one frame inside its decoded image,
/// for sources that pack several frames into an atlas.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct FrameUv {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl FrameUv {
    /// The whole image.
    pub const FULL: FrameUv = FrameUv {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };
}

/// A loaded movie: the demux plus whatever was preloaded at load time.
///
/// Closing is idempotent and also happens on drop.
pub struct Movie {
    demux: Option<Box<dyn Demux>>,
    /// One rect per packed frame; a single [`FrameUv::FULL`] for ordinary
    /// sources.
    pub frame_uv: Vec<FrameUv>,
    preloaded_frames: Vec<Vec<u8>>,
    preloaded_audio: Vec<u8>,
}

impl Movie {
    /// Load a movie from a seekable stream. Fails without leaving partial
    /// state behind; preloading honors `options.preload_video` and
    /// `options.preload_audio`.
    pub fn load<R: Read + Seek + Send + 'static>(
        stream: R,
        options: &LoadOptions,
    ) -> Result<Movie> {
        let mut demux = demux_for(stream, options)?;

        let mut preloaded_frames = Vec::new();
        if options.preload_video && demux.has_video() {
            demux.set_video_position(0)?;
            loop {
                let mut frame = Vec::new();
                if demux.read_video_frame(&mut frame)? == 0 {
                    break;
                }
                preloaded_frames.push(frame);
            }
        }
        let mut preloaded_audio = Vec::new();
        if options.preload_audio && demux.has_audio() {
            demux.set_audio_position(0)?;
            let mut chunk = Vec::new();
            while demux.read_audio_samples(&mut chunk, 4096)? > 0 {
                preloaded_audio.extend_from_slice(&chunk);
            }
        }
        debug!(
            video = demux.has_video(),
            audio = demux.has_audio(),
            preloaded_frames = preloaded_frames.len(),
            "movie loaded"
        );
        Ok(Movie {
            demux: Some(demux),
            frame_uv: vec![FrameUv::FULL],
            preloaded_frames,
            preloaded_audio,
        })
    }

    /// Wrap an already constructed demux, e.g. a live stream.
    pub fn from_demux(demux: Box<dyn Demux>) -> Movie {
        Movie {
            demux: Some(demux),
            frame_uv: vec![FrameUv::FULL],
            preloaded_frames: Vec::new(),
            preloaded_audio: Vec::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.demux.is_some()
    }

    pub fn demux(&self) -> Option<&dyn Demux> {
        self.demux.as_deref()
    }

    pub fn demux_mut(&mut self) -> Option<&mut (dyn Demux + 'static)> {
        self.demux.as_deref_mut()
    }

    pub fn video_info(&self) -> Option<&VideoStreamInfo> {
        self.demux.as_ref().and_then(|d| d.video_info())
    }

    pub fn audio_info(&self) -> Option<&AudioStreamInfo> {
        self.demux.as_ref().and_then(|d| d.audio_info())
    }

    pub fn has_video(&self) -> bool {
        self.video_info().is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio_info().is_some()
    }

    /// A frame kept in memory by `preload_video`.
    pub fn preloaded_frame(&self, index: usize) -> Option<&[u8]> {
        self.preloaded_frames.get(index).map(Vec::as_slice)
    }

    /// Sample bytes kept in memory by `preload_audio`.
    pub fn preloaded_audio(&self) -> &[u8] {
        &self.preloaded_audio
    }

    /// Copy the undecoded video stream, frame after frame, into `out`.
    /// Returns the byte count written.
    pub fn extract_raw_video<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let Some(demux) = &mut self.demux else {
            return Ok(0);
        };
        demux.set_video_position(0)?;
        let mut frame = Vec::new();
        let mut written = 0u64;
        while demux.read_video_frame(&mut frame)? > 0 {
            out.write_all(&frame)?;
            written += frame.len() as u64;
        }
        Ok(written)
    }

    /// Copy the undecoded audio stream into `out`. Returns the byte count
    /// written.
    pub fn extract_raw_audio<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let Some(demux) = &mut self.demux else {
            return Ok(0);
        };
        demux.set_audio_position(0)?;
        let mut chunk = Vec::new();
        let mut written = 0u64;
        while demux.read_audio_samples(&mut chunk, 4096)? > 0 {
            out.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }

    /// Release the demux and its resources. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut demux) = self.demux.take() {
            if let Err(err) = demux.shutdown() {
                error!(%err, "demux shutdown failed");
            }
        }
        self.preloaded_frames.clear();
        self.preloaded_audio.clear();
    }
}

impl Drop for Movie {
    fn drop(&mut self) {
        self.close();
    }
}

/// [`Movie::load`] with the failure handling chosen by
/// `options.error_policy`: `Propagate` returns the error, `Log` records it
/// and returns `None`.
pub fn load_movie<R: Read + Seek + Send + 'static>(
    stream: R,
    options: &LoadOptions,
) -> Result<Option<Movie>> {
    match Movie::load(stream, options) {
        Ok(movie) => Ok(Some(movie)),
        Err(err) => match options.error_policy {
            ErrorPolicy::Propagate => Err(err),
            ErrorPolicy::Log => {
                error!(%err, "failed to load movie");
                Ok(None)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::DemuxOverride;
    use std::io::Cursor;

    fn mjpeg_stream(frames: &[&[u8]]) -> Vec<u8> {
        let mut v = Vec::new();
        for payload in frames {
            v.extend_from_slice(&[0xFF, 0xD8]);
            v.extend_from_slice(payload);
            v.extend_from_slice(&[0xFF, 0xD9]);
        }
        v
    }

    #[test]
    fn test_load_detects_mjpeg_and_preloads() {
        let stream = mjpeg_stream(&[&[1, 2], &[3, 4, 5]]);
        let options = LoadOptions {
            preload_video: true,
            ..Default::default()
        };
        let mut movie = Movie::load(Cursor::new(stream), &options).unwrap();
        assert!(movie.has_video());
        assert_eq!(movie.frame_uv, vec![FrameUv::FULL]);
        assert_eq!(movie.preloaded_frame(0), Some(&[0xFF, 0xD8, 1, 2, 0xFF, 0xD9][..]));
        assert!(movie.preloaded_frame(2).is_none());

        movie.close();
        assert!(!movie.is_loaded());
        movie.close(); // second close is a no-op
    }

    #[test]
    fn test_demux_mut_reads_through_the_handle() {
        let stream = mjpeg_stream(&[&[9, 9], &[7]]);
        let mut movie = Movie::load(Cursor::new(stream), &LoadOptions::default()).unwrap();
        let demux = movie.demux_mut().unwrap();
        let mut frame = Vec::new();
        assert!(demux.read_video_frame(&mut frame).unwrap() > 0);
        assert_eq!(frame, [0xFF, 0xD8, 9, 9, 0xFF, 0xD9]);
        assert!(movie.demux().is_some());
    }

    #[test]
    fn test_extract_raw_video_concatenates_frames() {
        let stream = mjpeg_stream(&[&[1], &[2]]);
        let mut movie = Movie::load(Cursor::new(stream.clone()), &LoadOptions::default()).unwrap();
        let mut out = Vec::new();
        let written = movie.extract_raw_video(&mut out).unwrap();
        assert_eq!(written, stream.len() as u64);
        assert_eq!(out, stream);
    }

    #[test]
    fn test_log_policy_swallows_errors() {
        // not a movie at all
        let junk = Cursor::new(vec![0u8; 16]);
        let loaded = load_movie(junk, &LoadOptions::default()).unwrap();
        assert!(loaded.is_none());

        let junk = Cursor::new(vec![0u8; 16]);
        let options = LoadOptions {
            error_policy: ErrorPolicy::Propagate,
            demux: DemuxOverride::Detect,
            ..Default::default()
        };
        assert!(load_movie(junk, &options).is_err());
    }
}
