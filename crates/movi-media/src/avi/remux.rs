//! OpenDML AVI remux.
//!
//! Writes an AVI 2.0 file: headers with a reserved superindex per stream,
//! data chunks inside `movi` lists, and a standard chunk index flushed into
//! each RIFF before it closes. Output longer than one RIFF can hold rolls
//! over into `AVIX` continuation RIFFs, so files beyond 2 GiB work.

use super::{
    data_chunk_id, find_scale_and_rate, BitmapInfoHeader, IndexEntry, MainHeader, StreamHeader,
    WaveFormatEx, AVIF_ISINTERLEAVED, AVIF_TRUSTCKTYPE, FCC_AUDS, FCC_VIDS, ID_AVIH, ID_AVIX,
    ID_AVI_, ID_DMLH, ID_HDRL, ID_INDX, ID_MOVI, ID_ODML, ID_STRF, ID_STRH, ID_STRL,
    INDEX_OF_CHUNKS, INDEX_OF_INDEXES,
};
use crate::error::{Error, Result};
use crate::fourcc::{fourcc, FourCc};
use crate::info::{AudioStreamInfo, VideoStreamInfo};
use crate::remux::Remux;
use crate::riff::RiffWriter;
use std::io::{Seek, Write};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RemuxOptions {
    /// Superindex slots reserved per stream; each slot covers one RIFF.
    pub superindex_entries: usize,
    /// Data volume after which the current RIFF is closed and an `AVIX`
    /// continuation begins. Capped at `i32::MAX`, the largest element a
    /// RIFF file can carry.
    pub max_riff_size: u64,
}

impl Default for RemuxOptions {
    fn default() -> Self {
        Self {
            superindex_entries: 32,
            max_riff_size: 2_000_000_000,
        }
    }
}

/// Per-stream streaming state.
struct StreamState {
    chunk_id: FourCc,
    /// Absolute data offset and length of every chunk written.
    entries: Vec<IndexEntry>,
    /// Entries already flushed into a chunk index.
    flushed: usize,
    /// Position of the `strh` dwLength field.
    strh_length_at: u64,
    /// Data start of the reserved `indx` chunk.
    indx_at: u64,
    /// Superindex slots consumed.
    slots_used: usize,
    /// Superindex slots reserved.
    slots: usize,
}

pub struct AviRemux<W> {
    writer: RiffWriter<W>,
    options: RemuxOptions,
    video_info: VideoStreamInfo,
    audio_info: Option<AudioStreamInfo>,
    video: StreamState,
    audio: Option<StreamState>,
    audio_sample_bytes: u32,
    samples_written: u64,
    avih_total_frames_at: u64,
    dmlh_total_frames_at: u64,
    /// Start of the RIFF currently being filled.
    riff_start: u64,
    /// Base offset chunk-index entries in the current RIFF are relative to.
    movi_base: u64,
}

impl<W: Write + Seek> AviRemux<W> {
    pub fn new(
        writer: W,
        video: VideoStreamInfo,
        audio: Option<AudioStreamInfo>,
        options: RemuxOptions,
    ) -> Result<Self> {
        if options.max_riff_size > i32::MAX as u64 {
            return Err(Error::ElementTooLarge(options.max_riff_size));
        }
        let mut w = RiffWriter::new(writer);
        let slots = options.superindex_entries;
        let streams = 1 + audio.is_some() as u32;
        let (scale, rate) = find_scale_and_rate(video.framerate);

        w.begin_riff(ID_AVI_)?;
        w.begin_list(ID_HDRL)?;

        w.begin_chunk(ID_AVIH)?;
        let avih_at = w.position()?;
        MainHeader {
            micro_sec_per_frame: if video.framerate > 0.0 {
                (1_000_000.0 / video.framerate) as u32
            } else {
                0
            },
            flags: AVIF_ISINTERLEAVED | AVIF_TRUSTCKTYPE,
            total_frames: 0,
            streams,
            width: video.width,
            height: video.height,
            ..Default::default()
        }
        .write(&mut w)?;
        w.end()?;

        // video strl
        w.begin_list(ID_STRL)?;
        w.begin_chunk(ID_STRH)?;
        let video_strh_at = w.position()?;
        StreamHeader {
            fcc_type: FCC_VIDS,
            fcc_handler: video.codec_fourcc,
            scale,
            rate,
            length: 0,
            frame: [0, 0, video.width as i16, video.height as i16],
            ..Default::default()
        }
        .write(&mut w)?;
        w.end()?;
        w.begin_chunk(ID_STRF)?;
        BitmapInfoHeader {
            size: 40,
            width: video.width as i32,
            height: video.height as i32,
            planes: 1,
            bit_count: video.bit_depth as u16,
            compression: video.codec_fourcc,
            size_image: video.width * video.height * (video.bit_depth / 8).max(1),
            ..Default::default()
        }
        .write(&mut w)?;
        w.end()?;
        let video_indx_at =
            write_superindex_placeholder(&mut w, data_chunk_id(0, b"dc"), options.superindex_entries)?;
        w.end()?; // strl

        // audio strl
        let mut audio_state = None;
        let mut audio_sample_bytes = 0u32;
        if let Some(a) = &audio {
            audio_sample_bytes = a.sample_size_bytes().max(1);
            w.begin_list(ID_STRL)?;
            w.begin_chunk(ID_STRH)?;
            let audio_strh_at = w.position()?;
            StreamHeader {
                fcc_type: FCC_AUDS,
                scale: 1,
                rate: a.sample_rate,
                length: 0,
                sample_size: audio_sample_bytes,
                ..Default::default()
            }
            .write(&mut w)?;
            w.end()?;
            w.begin_chunk(ID_STRF)?;
            WaveFormatEx {
                format_tag: if a.codec_fourcc == FourCc::NONE {
                    1 // PCM
                } else {
                    a.codec_fourcc.0 as u16
                },
                channels: a.channels,
                samples_per_sec: a.sample_rate,
                avg_bytes_per_sec: a.sample_rate * audio_sample_bytes,
                block_align: audio_sample_bytes as u16,
                bits_per_sample: a.sample_size,
            }
            .write(&mut w)?;
            w.end()?;
            let audio_indx_at = write_superindex_placeholder(
                &mut w,
                data_chunk_id(1, b"wb"),
                options.superindex_entries,
            )?;
            w.end()?; // strl
            audio_state = Some(StreamState {
                chunk_id: data_chunk_id(1, b"wb"),
                entries: Vec::new(),
                flushed: 0,
                strh_length_at: audio_strh_at + 32,
                indx_at: audio_indx_at,
                slots_used: 0,
                slots,
            });
        }

        w.begin_list(ID_ODML)?;
        w.begin_chunk(ID_DMLH)?;
        let dmlh_at = w.position()?;
        w.put_u32(0)?;
        w.end()?;
        w.end()?; // odml
        w.end()?; // hdrl

        w.begin_list(ID_MOVI)?;
        let movi_base = w.position()?;

        Ok(Self {
            writer: w,
            options,
            video_info: video,
            audio_info: audio,
            video: StreamState {
                chunk_id: data_chunk_id(0, b"dc"),
                entries: Vec::new(),
                flushed: 0,
                strh_length_at: video_strh_at + 32,
                indx_at: video_indx_at,
                slots_used: 0,
                slots,
            },
            audio: audio_state,
            audio_sample_bytes,
            samples_written: 0,
            avih_total_frames_at: avih_at + 16,
            dmlh_total_frames_at: dmlh_at,
            riff_start: 0,
            movi_base,
        })
    }

    /// Close the current RIFF and start an `AVIX` continuation.
    fn start_new_riff(&mut self) -> Result<()> {
        flush_chunk_index(&mut self.writer, &mut self.video, self.movi_base)?;
        if let Some(a) = &mut self.audio {
            flush_chunk_index(&mut self.writer, a, self.movi_base)?;
        }
        self.writer.end()?; // movi
        self.writer.end()?; // riff
        self.riff_start = self.writer.position()?;
        self.writer.begin_riff(ID_AVIX)?;
        self.writer.begin_list(ID_MOVI)?;
        self.movi_base = self.writer.position()?;
        debug!(at = self.riff_start, "started AVIX continuation");
        Ok(())
    }

    fn roll_over_if_needed(&mut self, incoming: usize) -> Result<()> {
        let used = self.writer.position()? - self.riff_start;
        if used + incoming as u64 + 8 > self.options.max_riff_size {
            self.start_new_riff()?;
        }
        Ok(())
    }

    fn append_chunk(&mut self, stream_is_video: bool, data: &[u8], keyframe: bool) -> Result<()> {
        self.roll_over_if_needed(data.len())?;
        let id = if stream_is_video {
            self.video.chunk_id
        } else {
            self.audio.as_ref().map(|a| a.chunk_id).unwrap_or(FourCc::NONE)
        };
        let data_at = self.writer.position()? + 8;
        self.writer.write_chunk(id, data)?;
        let entry = IndexEntry {
            offset: data_at,
            length: data.len() as u32,
            keyframe,
        };
        if stream_is_video {
            self.video.entries.push(entry);
        } else if let Some(a) = &mut self.audio {
            a.entries.push(entry);
        }
        Ok(())
    }

    /// Patch totals, flush the trailing chunk indexes, and close every open
    /// element. Returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        flush_chunk_index(&mut self.writer, &mut self.video, self.movi_base)?;
        if let Some(a) = &mut self.audio {
            flush_chunk_index(&mut self.writer, a, self.movi_base)?;
        }

        let frames = self.video.entries.len() as u32;
        self.writer.patch_u32(self.avih_total_frames_at, frames)?;
        self.writer.patch_u32(self.dmlh_total_frames_at, frames)?;
        self.writer.patch_u32(self.video.strh_length_at, frames)?;
        self.writer
            .patch_u32(self.video.indx_at + 4, self.video.slots_used as u32)?;
        if let Some(a) = &self.audio {
            self.writer
                .patch_u32(a.strh_length_at, self.samples_written as u32)?;
            self.writer.patch_u32(a.indx_at + 4, a.slots_used as u32)?;
        }
        self.writer.finish()
    }
}

impl<W: Write + Seek> Remux for AviRemux<W> {
    fn video_info(&self) -> &VideoStreamInfo {
        &self.video_info
    }

    fn audio_info(&self) -> Option<&AudioStreamInfo> {
        self.audio_info.as_ref()
    }

    fn written_frames(&self) -> usize {
        self.video.entries.len()
    }

    fn written_samples(&self) -> usize {
        self.samples_written as usize
    }

    fn write_video_frame(&mut self, data: &[u8], keyframe: bool) -> Result<()> {
        self.append_chunk(true, data, keyframe)
    }

    fn write_audio_samples(&mut self, data: &[u8]) -> Result<()> {
        if self.audio.is_none() {
            return Err(Error::NotSupported("remux has no audio stream"));
        }
        self.append_chunk(false, data, true)?;
        self.samples_written += data.len() as u64 / self.audio_sample_bytes as u64;
        Ok(())
    }

    fn write_lookback_frame(&mut self, frame: i64) -> Result<()> {
        let total = self.video.entries.len() as i64;
        let index = if frame < 0 { total + frame } else { frame };
        if index < 0 || index >= total {
            return Err(Error::NotSupported("look-back frame was never written"));
        }
        let entry = self.video.entries[index as usize];
        // chunk-index offsets are relative to the current RIFF's movi base
        if entry.offset < self.movi_base {
            return Err(Error::NotSupported(
                "look-back frame lives in an earlier RIFF",
            ));
        }
        self.video.entries.push(entry);
        Ok(())
    }
}

/// Reserve an `indx` superindex with zeroed slots; returns its data offset.
fn write_superindex_placeholder<W: Write + Seek>(
    w: &mut RiffWriter<W>,
    chunk_id: FourCc,
    slots: usize,
) -> Result<u64> {
    w.begin_chunk(ID_INDX)?;
    let data_at = w.position()?;
    w.put_u16(4)?; // longs per entry
    w.put_u8(0)?;
    w.put_u8(INDEX_OF_INDEXES)?;
    w.put_u32(0)?; // entries in use, patched at finish
    w.put_fourcc(chunk_id)?;
    w.put_bytes(&[0u8; 12])?; // reserved
    for _ in 0..slots {
        w.put_bytes(&[0u8; 16])?;
    }
    w.end()?;
    Ok(data_at)
}

/// Index chunk id for a stream: `ix00`, `ix01`, ...
fn ix_chunk_id(stream_id: FourCc) -> FourCc {
    let digits = stream_id.bytes();
    fourcc(&[b'i', b'x', digits[0], digits[1]])
}

/// Write the unflushed entries of one stream as a standard chunk index
/// inside the current `movi`, and point the next superindex slot at it.
fn flush_chunk_index<W: Write + Seek>(
    w: &mut RiffWriter<W>,
    stream: &mut StreamState,
    movi_base: u64,
) -> Result<()> {
    let pending = &stream.entries[stream.flushed..];
    if pending.is_empty() {
        return Ok(());
    }
    // superindex slots are a fixed reservation made at header time
    if stream.slots_used >= stream.slots {
        return Err(Error::SuperindexFull {
            capacity: stream.slots,
        });
    }
    let slot_at = stream.indx_at + 24 + stream.slots_used as u64 * 16;

    let ix_header_at = w.position()?;
    w.begin_chunk(ix_chunk_id(stream.chunk_id))?;
    w.put_u16(2)?; // longs per entry
    w.put_u8(0)?;
    w.put_u8(INDEX_OF_CHUNKS)?;
    w.put_u32(pending.len() as u32)?;
    w.put_fourcc(stream.chunk_id)?;
    w.put_u64(movi_base)?;
    w.put_u32(0)?; // reserved
    for e in pending {
        w.put_u32((e.offset - movi_base) as u32)?;
        let mut len = e.length & 0x7FFF_FFFF;
        if !e.keyframe {
            len |= 0x8000_0000;
        }
        w.put_u32(len)?;
    }
    w.end()?;

    // chunk size including the 8-byte chunk header
    let ix_size = 24 + 8 * pending.len() as u32 + 8;
    w.patch_u64(slot_at, ix_header_at)?;
    w.patch_u32(slot_at + 8, ix_size)?;
    w.patch_u32(slot_at + 12, pending.len() as u32)?;

    stream.flushed = stream.entries.len();
    stream.slots_used += 1;
    Ok(())
}
