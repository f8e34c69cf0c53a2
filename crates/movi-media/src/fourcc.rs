//! Four-character codes.
//!
//! RIFF stores every tag as four ASCII bytes. They are kept in file byte
//! order in a `u32`, so a `FourCc` read with a little-endian `u32` read
//! compares equal to the matching `fourcc(b"...")` constant.

use std::fmt;

/// A four-character code as stored in a RIFF file.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
#[cfg_attr(feature = "serialize", serde(transparent))]
pub struct FourCc(pub u32);

/// Build a `FourCc` from its four ASCII bytes.
pub const fn fourcc(bytes: &[u8; 4]) -> FourCc {
    FourCc(u32::from_le_bytes(*bytes))
}

impl FourCc {
    /// The four bytes in file order.
    pub const fn bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Zero value used for "no code".
    pub const NONE: FourCc = FourCc(0);
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bytes() {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({self})")
    }
}

impl From<u32> for FourCc {
    fn from(raw: u32) -> Self {
        FourCc(raw)
    }
}
