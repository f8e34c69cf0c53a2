//! Movi-Media: RIFF/AVI demuxing, streaming AVI remuxing, and raw MJPEG/PCM
//! elementary streams
//!
//! This crate is the container engine for movi. It reads and writes movie
//! containers at the byte level; decoding pixels or samples is someone
//! else's job.
//!
//! # Modules
//!
//! - `reader` - shared positioned reads over one seekable stream
//! - `riff` - RIFF tokenizer (visitor-driven) and incremental writer
//! - `avi` - AVI/OpenDML demux and remux built on `riff`
//! - `mjpeg` - raw MJPEG elementary stream demux
//! - `pcm` - raw PCM elementary stream demux
//! - `demux` / `remux` - the container contracts and the probing factory
//! - `movie` - the loaded-movie handle and load policies
//! - `dedup` - duplicate frame search over decoded pixels
//!
//! # Architecture
//!
//! A [`SharedReader`] makes "seek then read" one atomic unit, so a video
//! path and an audio path can interleave positioned reads on the same file
//! handle. Demuxes resolve the container's index once at load; after that
//! every frame read is a single positioned read. The AVI remux streams:
//! headers with placeholder totals go out first, frames append behind them,
//! and a final patch-up pass fills in what only the end of the stream
//! knows.

pub mod avi;
pub mod dedup;
pub mod demux;
pub mod error;
pub mod fourcc;
pub mod info;
pub mod mjpeg;
pub mod movie;
pub mod pcm;
pub mod reader;
pub mod remux;
pub mod riff;

pub use demux::{demux_for, Demux};
pub use error::{Error, Result};
pub use fourcc::{fourcc, FourCc};
pub use info::{AudioStreamInfo, ErrorPolicy, LoadOptions, VideoStreamInfo};
pub use movie::{load_movie, Movie};
pub use reader::SharedReader;
pub use remux::Remux;
