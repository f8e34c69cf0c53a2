//! The live-source abstraction and URL-based selection.

use crate::error::{Error, Result};
use crate::http_mjpeg::HttpMjpegStream;
use movi_media::demux::Demux;
use movi_media::info::LoadOptions;

/// A live, non-seekable source. Everything a file demux offers, plus
/// connection state.
pub trait Streamer: Demux {
    fn is_connected(&self) -> bool;
    /// Human-readable connection state for status displays.
    fn status(&self) -> String;
    fn bytes_received(&self) -> u64;
    /// Graceful stop, takes effect at the next received chunk.
    fn disconnect(&mut self);
    /// Forced stop for a connection with no data arriving.
    fn disconnect_now(&mut self);
}

/// Pick a streamer implementation from the URL scheme.
pub async fn streamer_for_url(url: &str, options: &LoadOptions) -> Result<Box<dyn Streamer>> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(Box::new(HttpMjpegStream::connect(url, options).await?))
    } else {
        Err(Error::UnsupportedUrl(url.to_string()))
    }
}
