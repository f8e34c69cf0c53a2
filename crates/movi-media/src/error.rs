//! Error types for movi-media.

use crate::fourcc::FourCc;
use std::io;
use thiserror::Error;

/// Result type for movi-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for movi-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying stream.
    #[error("stream I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream does not start with a RIFF or RIFX marker.
    #[error("not a RIFF stream")]
    NotRiff,

    /// An element's size field claims more bytes than remain in the stream.
    #[error("element size mismatch for {fourcc}: need {need} bytes")]
    SizeMismatch { fourcc: FourCc, need: u64 },

    /// The stream ended inside a structure that promised more bytes.
    #[error("truncated stream while reading {0}")]
    Truncated(&'static str),

    /// Malformed or internally inconsistent AVI structure.
    #[error("invalid AVI: {0}")]
    InvalidAvi(String),

    /// An OpenDML index chunk carries an index type this engine cannot read.
    #[error("unsupported index type {index_type:#04x} for stream {stream_id}")]
    UnsupportedIndex { index_type: u8, stream_id: FourCc },

    /// Neither an OpenDML indx nor a legacy idx1 index was found.
    ///
    /// Rebuilding an index by scanning the whole movi region is possible but
    /// not implemented; random access requires one to be present.
    #[error("no {0} index found (required for playback and seeking)")]
    NoIndex(&'static str),

    /// No demuxer recognizes the stream's magic bytes.
    #[error("no suitable demux for stream")]
    NoDemux,

    /// Position was set on a non-seekable source.
    #[error("source is not seekable")]
    NotSeekable,

    /// The operation is outside this component's contract.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// More index batches were produced than the superindex reservation holds.
    #[error("not enough space reserved for superindex (capacity {capacity})")]
    SuperindexFull { capacity: usize },

    /// A required stream descriptor was not provided.
    #[error("missing {0} stream info")]
    MissingStreamInfo(&'static str),

    /// A RIFF or LIST element grew past what a 32-bit size field can hold.
    #[error("RIFF element too large for writing ({0} bytes)")]
    ElementTooLarge(u64),
}

impl Error {
    /// Create an invalid AVI error.
    pub fn invalid_avi(msg: impl Into<String>) -> Self {
        Self::InvalidAvi(msg.into())
    }
}
