//! Movi-Stream: live MJPEG-over-HTTP sources for movi
//!
//! Connects to an HTTP endpoint serving concatenated JPEG images (with or
//! without `multipart/x-mixed-replace` boundaries — only the JPEG marker
//! bytes are trusted) and exposes the arriving frames through the same
//! [`Demux`](movi_media::Demux) contract file-backed sources use. Reads are
//! always non-blocking: the caller gets the most recent complete frame or
//! nothing.

pub mod error;
pub mod http_mjpeg;
pub mod scan;
pub mod streamer;

pub use error::{Error, Result};
pub use http_mjpeg::HttpMjpegStream;
pub use scan::FrameScanner;
pub use streamer::{streamer_for_url, Streamer};
