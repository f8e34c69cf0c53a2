//! AVI container support: RIFF form constants, on-disk header structures,
//! and the demux/remux built on them.

mod demux;
mod remux;

pub use demux::AviDemux;
pub use remux::{AviRemux, RemuxOptions};

use crate::error::Result;
use crate::fourcc::{fourcc, FourCc};
use crate::reader::SharedReader;
use crate::riff::RiffWriter;
use std::io::{Read, Seek, Write};

pub const ID_AVI_: FourCc = fourcc(b"AVI ");
pub const ID_AVIX: FourCc = fourcc(b"AVIX");
pub const ID_HDRL: FourCc = fourcc(b"hdrl");
pub const ID_AVIH: FourCc = fourcc(b"avih");
pub const ID_STRL: FourCc = fourcc(b"strl");
pub const ID_STRH: FourCc = fourcc(b"strh");
pub const ID_STRF: FourCc = fourcc(b"strf");
pub const ID_ODML: FourCc = fourcc(b"odml");
pub const ID_DMLH: FourCc = fourcc(b"dmlh");
pub const ID_MOVI: FourCc = fourcc(b"movi");
pub const ID_IDX1: FourCc = fourcc(b"idx1");
pub const ID_INDX: FourCc = fourcc(b"indx");
pub const ID_00DC: FourCc = fourcc(b"00dc");
pub const ID_00DB: FourCc = fourcc(b"00db");
pub const ID_01WB: FourCc = fourcc(b"01wb");

pub const FCC_VIDS: FourCc = fourcc(b"vids");
pub const FCC_AUDS: FourCc = fourcc(b"auds");

pub const AVIF_HASINDEX: u32 = 0x10;
pub const AVIF_MUSTUSEINDEX: u32 = 0x20;
pub const AVIF_ISINTERLEAVED: u32 = 0x100;
pub const AVIF_TRUSTCKTYPE: u32 = 0x800;

pub const AVIIF_KEYFRAME: u32 = 0x10;

/// OpenDML index-of-indexes.
pub const INDEX_OF_INDEXES: u8 = 0x00;
/// OpenDML index pointing at data chunks.
pub const INDEX_OF_CHUNKS: u8 = 0x01;

/// `avih` chunk body, 56 bytes on disk.
#[derive(Debug, Clone, Default)]
pub struct MainHeader {
    pub micro_sec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub padding_granularity: u32,
    pub flags: u32,
    pub total_frames: u32,
    pub initial_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
}

impl MainHeader {
    pub fn read<R: Read + Seek>(reader: &SharedReader<R>, offset: &mut u64) -> Result<Self> {
        let h = Self {
            micro_sec_per_frame: reader.read_u32(offset)?,
            max_bytes_per_sec: reader.read_u32(offset)?,
            padding_granularity: reader.read_u32(offset)?,
            flags: reader.read_u32(offset)?,
            total_frames: reader.read_u32(offset)?,
            initial_frames: reader.read_u32(offset)?,
            streams: reader.read_u32(offset)?,
            suggested_buffer_size: reader.read_u32(offset)?,
            width: reader.read_u32(offset)?,
            height: reader.read_u32(offset)?,
        };
        *offset += 16; // dwReserved[4]
        Ok(h)
    }

    pub fn write<W: Write + Seek>(&self, w: &mut RiffWriter<W>) -> Result<()> {
        w.put_u32(self.micro_sec_per_frame)?;
        w.put_u32(self.max_bytes_per_sec)?;
        w.put_u32(self.padding_granularity)?;
        w.put_u32(self.flags)?;
        w.put_u32(self.total_frames)?;
        w.put_u32(self.initial_frames)?;
        w.put_u32(self.streams)?;
        w.put_u32(self.suggested_buffer_size)?;
        w.put_u32(self.width)?;
        w.put_u32(self.height)?;
        w.put_bytes(&[0u8; 16])?;
        Ok(())
    }
}

/// `strh` chunk body, 56 bytes on disk.
#[derive(Debug, Clone, Default)]
pub struct StreamHeader {
    pub fcc_type: FourCc,
    pub fcc_handler: FourCc,
    pub flags: u32,
    pub priority: u16,
    pub language: u16,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
    pub frame: [i16; 4],
}

impl StreamHeader {
    pub fn read<R: Read + Seek>(reader: &SharedReader<R>, offset: &mut u64) -> Result<Self> {
        Ok(Self {
            fcc_type: reader.read_fourcc(offset)?,
            fcc_handler: reader.read_fourcc(offset)?,
            flags: reader.read_u32(offset)?,
            priority: reader.read_u16(offset)?,
            language: reader.read_u16(offset)?,
            initial_frames: reader.read_u32(offset)?,
            scale: reader.read_u32(offset)?,
            rate: reader.read_u32(offset)?,
            start: reader.read_u32(offset)?,
            length: reader.read_u32(offset)?,
            suggested_buffer_size: reader.read_u32(offset)?,
            quality: reader.read_u32(offset)?,
            sample_size: reader.read_u32(offset)?,
            frame: [
                reader.read_i16(offset)?,
                reader.read_i16(offset)?,
                reader.read_i16(offset)?,
                reader.read_i16(offset)?,
            ],
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut RiffWriter<W>) -> Result<()> {
        w.put_fourcc(self.fcc_type)?;
        w.put_fourcc(self.fcc_handler)?;
        w.put_u32(self.flags)?;
        w.put_u16(self.priority)?;
        w.put_u16(self.language)?;
        w.put_u32(self.initial_frames)?;
        w.put_u32(self.scale)?;
        w.put_u32(self.rate)?;
        w.put_u32(self.start)?;
        w.put_u32(self.length)?;
        w.put_u32(self.suggested_buffer_size)?;
        w.put_u32(self.quality)?;
        w.put_u32(self.sample_size)?;
        for v in self.frame {
            w.put_i16(v)?;
        }
        Ok(())
    }

    /// Frames (or samples) per second implied by rate/scale.
    pub fn frames_per_second(&self) -> f32 {
        if self.scale == 0 {
            return 0.0;
        }
        self.rate as f32 / self.scale as f32
    }
}

/// Video `strf` body, the classic 40-byte BITMAPINFOHEADER.
#[derive(Debug, Clone, Default)]
pub struct BitmapInfoHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: FourCc,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub clr_used: u32,
    pub clr_important: u32,
}

impl BitmapInfoHeader {
    pub fn read<R: Read + Seek>(reader: &SharedReader<R>, offset: &mut u64) -> Result<Self> {
        Ok(Self {
            size: reader.read_u32(offset)?,
            width: reader.read_i32(offset)?,
            height: reader.read_i32(offset)?,
            planes: reader.read_u16(offset)?,
            bit_count: reader.read_u16(offset)?,
            compression: reader.read_fourcc(offset)?,
            size_image: reader.read_u32(offset)?,
            x_pels_per_meter: reader.read_i32(offset)?,
            y_pels_per_meter: reader.read_i32(offset)?,
            clr_used: reader.read_u32(offset)?,
            clr_important: reader.read_u32(offset)?,
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut RiffWriter<W>) -> Result<()> {
        w.put_u32(self.size)?;
        w.put_i32(self.width)?;
        w.put_i32(self.height)?;
        w.put_u16(self.planes)?;
        w.put_u16(self.bit_count)?;
        w.put_fourcc(self.compression)?;
        w.put_u32(self.size_image)?;
        w.put_i32(self.x_pels_per_meter)?;
        w.put_i32(self.y_pels_per_meter)?;
        w.put_u32(self.clr_used)?;
        w.put_u32(self.clr_important)?;
        Ok(())
    }
}

/// Audio `strf` body, WAVEFORMATEX without the extra bytes.
#[derive(Debug, Clone, Default)]
pub struct WaveFormatEx {
    pub format_tag: u16,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl WaveFormatEx {
    pub fn read<R: Read + Seek>(reader: &SharedReader<R>, offset: &mut u64) -> Result<Self> {
        Ok(Self {
            format_tag: reader.read_u16(offset)?,
            channels: reader.read_u16(offset)?,
            samples_per_sec: reader.read_u32(offset)?,
            avg_bytes_per_sec: reader.read_u32(offset)?,
            block_align: reader.read_u16(offset)?,
            bits_per_sample: reader.read_u16(offset)?,
        })
    }

    pub fn write<W: Write + Seek>(&self, w: &mut RiffWriter<W>) -> Result<()> {
        w.put_u16(self.format_tag)?;
        w.put_u16(self.channels)?;
        w.put_u32(self.samples_per_sec)?;
        w.put_u32(self.avg_bytes_per_sec)?;
        w.put_u16(self.block_align)?;
        w.put_u16(self.bits_per_sample)?;
        w.put_u16(0)?; // cbSize
        Ok(())
    }
}

/// One entry of a resolved stream index: absolute chunk data position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// First byte of the chunk's data.
    pub offset: u64,
    /// Data byte count (pad byte excluded).
    pub length: u32,
    pub keyframe: bool,
}

/// Resolved index for a single stream, offsets already absolute.
#[derive(Debug, Clone, Default)]
pub struct StreamIndex {
    pub stream_id: FourCc,
    pub entries: Vec<IndexEntry>,
}

impl StreamIndex {
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.length as u64).sum()
    }
}

/// Stream number encoded in the two leading digits of a data chunk id,
/// `None` when they aren't digits.
pub fn stream_number(id: FourCc) -> Option<u16> {
    let b = id.bytes();
    if b[0].is_ascii_digit() && b[1].is_ascii_digit() {
        Some(((b[0] - b'0') as u16) * 10 + (b[1] - b'0') as u16)
    } else {
        None
    }
}

/// Data chunk id for a stream number, e.g. stream 0 + `dc` -> `00dc`.
pub fn data_chunk_id(stream: u16, suffix: &[u8; 2]) -> FourCc {
    let id = [
        b'0' + (stream / 10) as u8,
        b'0' + (stream % 10) as u8,
        suffix[0],
        suffix[1],
    ];
    fourcc(&id)
}

/// Approximate a rational `scale`/`rate` pair for a floating framerate.
pub fn find_scale_and_rate(fps: f32) -> (u32, u32) {
    // common NTSC rates are x/1001
    for &(scale, rate) in &[(1001u32, 24000u32), (1001, 30000), (1001, 60000)] {
        if (rate as f32 / scale as f32 - fps).abs() < 0.01 {
            return (scale, rate);
        }
    }
    if (fps - fps.round()).abs() < 0.001 {
        return (1, fps.round() as u32);
    }
    (1000, (fps * 1000.0).round() as u32)
}
