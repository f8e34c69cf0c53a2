//! RIFF container plumbing.
//!
//! - `parser` - tokenizer walking RIFF/LIST/CHUNK trees with visitor callbacks
//! - `writer` - incremental writer with deferred size patch-up

mod parser;
mod writer;

pub use parser::{RiffParser, RiffVisitor};
pub use writer::RiffWriter;

use crate::fourcc::{fourcc, FourCc};

/// `RIFF` container marker.
pub const RIFF: FourCc = fourcc(b"RIFF");
/// `RIFX` container marker (big-endian data; tokenized identically).
pub const RIFX: FourCc = fourcc(b"RIFX");
/// `LIST` element marker.
pub const LIST: FourCc = fourcc(b"LIST");
