//! AVI demux: header scan, index resolution, and indexed frame/sample reads.

use super::{
    data_chunk_id, stream_number, BitmapInfoHeader, IndexEntry, MainHeader, StreamHeader,
    StreamIndex, WaveFormatEx, AVIIF_KEYFRAME, FCC_AUDS, FCC_VIDS, ID_AVIH, ID_AVIX, ID_AVI_,
    ID_DMLH, ID_HDRL, ID_IDX1, ID_INDX, ID_MOVI, ID_ODML, ID_STRF, ID_STRH, ID_STRL,
    INDEX_OF_CHUNKS, INDEX_OF_INDEXES,
};
use crate::demux::Demux;
use crate::error::{Error, Result};
use crate::fourcc::FourCc;
use crate::info::{AudioStreamInfo, LoadOptions, VideoStreamInfo};
use crate::reader::SharedReader;
use crate::riff::{RiffParser, RiffVisitor};
use std::io::{Read, Seek};
use tracing::{debug, warn};

/// Demux for AVI and OpenDML (AVI 2.0) files.
///
/// The whole header tree and every index are resolved up front; after
/// construction each frame read costs one seek and one read.
pub struct AviDemux<R> {
    reader: SharedReader<R>,
    video_info: Option<VideoStreamInfo>,
    audio_info: Option<AudioStreamInfo>,
    video_index: StreamIndex,
    audio_index: StreamIndex,
    /// Cumulative byte offset of each audio index entry within the stream.
    audio_byte_starts: Vec<u64>,
    /// Bytes one audio sample occupies across all channels.
    audio_sample_bytes: u32,
    video_pos: usize,
    audio_pos: usize,
}

/// Everything one pass over the RIFF tree collects.
#[derive(Default)]
struct Scan {
    main: Option<MainHeader>,
    /// strh waiting for its strf, with the stream number it was seen at.
    pending_strh: Option<(u16, StreamHeader)>,
    next_stream: u16,
    video: Option<(u16, StreamHeader, BitmapInfoHeader)>,
    audio: Option<(u16, StreamHeader, WaveFormatEx)>,
    video_indx_pos: Option<u64>,
    audio_indx_pos: Option<u64>,
    odml_total_frames: Option<u32>,
    /// Position of the first data chunk in the first `movi` list.
    movi_children: Option<u64>,
    idx1: Option<(u64, u32)>,
    saw_avi_form: bool,
}

struct ScanVisitor<'a, R> {
    reader: &'a SharedReader<R>,
    scan: &'a mut Scan,
}

impl<R: Read + Seek> RiffVisitor for ScanVisitor<'_, R> {
    fn on_riff(&mut self, form: FourCc, _len: u32, _pos: u64) -> Result<bool> {
        if !self.scan.saw_avi_form {
            if form != ID_AVI_ {
                return Err(Error::invalid_avi(format!(
                    "RIFF form is {form}, expected AVI "
                )));
            }
            self.scan.saw_avi_form = true;
        } else if form != ID_AVIX {
            return Err(Error::invalid_avi(format!(
                "trailing RIFF form is {form}, expected AVIX"
            )));
        }
        Ok(true)
    }

    fn on_list(&mut self, kind: FourCc, _len: u32, pos: u64) -> Result<bool> {
        if kind == ID_MOVI {
            if self.scan.movi_children.is_none() {
                self.scan.movi_children = Some(pos);
            }
            // data chunks are reached through the index, never walked
            return Ok(false);
        }
        Ok(kind == ID_HDRL || kind == ID_STRL || kind == ID_ODML)
    }

    fn on_chunk(&mut self, id: FourCc, len: u32, _padded_len: u32, pos: u64) -> Result<()> {
        let mut at = pos;
        if id == ID_AVIH {
            self.scan.main = Some(MainHeader::read(self.reader, &mut at)?);
        } else if id == ID_STRH {
            let strh = StreamHeader::read(self.reader, &mut at)?;
            let n = self.scan.next_stream;
            self.scan.next_stream += 1;
            self.scan.pending_strh = Some((n, strh));
        } else if id == ID_STRF {
            if let Some((n, strh)) = self.scan.pending_strh.take() {
                if strh.fcc_type == FCC_VIDS && self.scan.video.is_none() {
                    let strf = BitmapInfoHeader::read(self.reader, &mut at)?;
                    self.scan.video = Some((n, strh, strf));
                } else if strh.fcc_type == FCC_AUDS && self.scan.audio.is_none() {
                    let strf = WaveFormatEx::read(self.reader, &mut at)?;
                    self.scan.audio = Some((n, strh, strf));
                } else {
                    debug!(stream = n, kind = %strh.fcc_type, "ignoring stream");
                }
            }
        } else if id == ID_INDX {
            // indx sits inside strl, after strf, so the matching stream is
            // the most recently completed one
            let n = self.scan.next_stream.wrapping_sub(1);
            match (&self.scan.video, &self.scan.audio) {
                (Some((vn, ..)), _) if *vn == n => self.scan.video_indx_pos = Some(pos),
                (_, Some((an, ..))) if *an == n => self.scan.audio_indx_pos = Some(pos),
                _ => {}
            }
        } else if id == ID_DMLH {
            self.scan.odml_total_frames = Some(self.reader.read_u32(&mut at)?);
        } else if id == ID_IDX1 && self.scan.idx1.is_none() {
            self.scan.idx1 = Some((pos, len));
        }
        Ok(())
    }
}

impl<R: Read + Seek + Send> AviDemux<R> {
    pub fn new(reader: SharedReader<R>, options: &LoadOptions) -> Result<Self> {
        let mut parser = RiffParser::new(reader.clone())?;
        let mut scan = Scan::default();
        {
            let mut visitor = ScanVisitor {
                reader: &reader,
                scan: &mut scan,
            };
            while parser.read_next(&mut visitor)? {}
        }

        let main = scan
            .main
            .as_ref()
            .ok_or_else(|| Error::invalid_avi("no avih header"))?;
        let movi_children = scan
            .movi_children
            .ok_or_else(|| Error::invalid_avi("no movi list"))?;

        let mut demux = Self {
            reader,
            video_info: None,
            audio_info: None,
            video_index: StreamIndex::default(),
            audio_index: StreamIndex::default(),
            audio_byte_starts: Vec::new(),
            audio_sample_bytes: 0,
            video_pos: 0,
            audio_pos: 0,
        };

        demux.resolve_indexes(&scan, movi_children)?;

        if !options.skip_video {
            if let Some((_, strh, strf)) = &scan.video {
                demux.video_info = Some(demux.build_video_info(main, strh, strf, &scan));
            }
        }
        if !options.skip_audio {
            if let Some((_, strh, strf)) = &scan.audio {
                demux.audio_info = Some(demux.build_audio_info(strh, strf));
            }
        }
        if demux.video_info.is_none() && demux.audio_info.is_none() {
            return Err(Error::invalid_avi("no usable stream"));
        }

        if let Some(over) = &options.video_override {
            if demux.video_info.is_some() {
                demux.video_info = Some(over.clone());
            }
        }
        if let Some(over) = &options.audio_override {
            if demux.audio_info.is_some() {
                demux.audio_info = Some(over.clone());
            }
        }
        Ok(demux)
    }

    fn build_video_info(
        &self,
        main: &MainHeader,
        strh: &StreamHeader,
        strf: &BitmapInfoHeader,
        scan: &Scan,
    ) -> VideoStreamInfo {
        let indexed = self.video_index.entries.len() as u32;
        let declared = scan
            .odml_total_frames
            .unwrap_or(strh.length.max(main.total_frames));
        if indexed != declared {
            warn!(
                declared,
                indexed, "frame count from headers disagrees with the index, using the index"
            );
        }
        let framerate = if strh.scale != 0 {
            strh.frames_per_second()
        } else if main.micro_sec_per_frame != 0 {
            1_000_000.0 / main.micro_sec_per_frame as f32
        } else {
            VideoStreamInfo::default().framerate
        };
        VideoStreamInfo {
            codec_fourcc: if strf.compression != FourCc::NONE {
                strf.compression
            } else {
                strh.fcc_handler
            },
            framerate,
            width: strf.width.unsigned_abs(),
            height: strf.height.unsigned_abs(),
            bit_depth: strf.bit_count as u32,
            frame_count: indexed,
        }
    }

    fn build_audio_info(&mut self, strh: &StreamHeader, strf: &WaveFormatEx) -> AudioStreamInfo {
        let sample_bytes = if strf.block_align != 0 {
            strf.block_align as u32
        } else {
            strf.channels as u32 * (strf.bits_per_sample as u32 / 8).max(1)
        };
        self.audio_sample_bytes = sample_bytes.max(1);
        let total_bytes = self.audio_index.total_bytes();
        let indexed_samples = (total_bytes / self.audio_sample_bytes as u64) as u32;
        if strh.sample_size != 0 && indexed_samples != strh.length {
            debug!(
                declared = strh.length,
                indexed = indexed_samples,
                "audio sample count from strh disagrees with the index, using the index"
            );
        }
        AudioStreamInfo {
            codec_fourcc: FourCc(strf.format_tag as u32),
            sample_rate: if strh.sample_size != 0 && strh.scale != 0 {
                // rate/scale counts samples per second for PCM-style streams
                (strh.rate / strh.scale).max(strf.samples_per_sec)
            } else {
                strf.samples_per_sec
            },
            channels: strf.channels,
            sample_size: strf.bits_per_sample,
            sample_count: indexed_samples,
        }
    }

    /// Resolve each stream's index on its own: the stream's OpenDML `indx`
    /// when it has one, otherwise that stream's slice of the legacy `idx1`.
    /// A hybrid file can index one stream each way. A stream left with no
    /// entries by both paths is unplayable without a full movi walk, which
    /// this demux does not attempt.
    fn resolve_indexes(&mut self, scan: &Scan, movi_children: u64) -> Result<()> {
        if let (Some(pos), Some((n, ..))) = (scan.video_indx_pos, &scan.video) {
            self.video_index = self.parse_indx(pos, data_chunk_id(*n, b"dc"), 0)?;
        }
        if let (Some(pos), Some((n, ..))) = (scan.audio_indx_pos, &scan.audio) {
            self.audio_index = self.parse_indx(pos, data_chunk_id(*n, b"wb"), 0)?;
        }
        let video_pending = scan.video.is_some() && self.video_index.entries.is_empty();
        let audio_pending = scan.audio.is_some() && self.audio_index.entries.is_empty();
        if video_pending || audio_pending {
            if let Some((pos, len)) = scan.idx1 {
                self.parse_idx1(pos, len, movi_children, scan, video_pending, audio_pending)?;
            }
        }
        // an empty index is as useless as a missing one
        if scan.video.is_some() && self.video_index.entries.is_empty() {
            return Err(Error::NoIndex("video idx1 or indx"));
        }
        if scan.audio.is_some() && self.audio_index.entries.is_empty() {
            return Err(Error::NoIndex("audio idx1 or indx"));
        }

        self.audio_byte_starts = Vec::with_capacity(self.audio_index.entries.len());
        let mut acc = 0u64;
        for e in &self.audio_index.entries {
            self.audio_byte_starts.push(acc);
            acc += e.length as u64;
        }
        debug!(
            video_entries = self.video_index.entries.len(),
            audio_entries = self.audio_index.entries.len(),
            "index resolved"
        );
        Ok(())
    }

    /// Parse an OpenDML index chunk body at `pos`. A superindex recurses
    /// into each of its standard-index chunks; the format is exactly
    /// two-level, so a superindex reached through another superindex (as a
    /// self-referencing offset would) is rejected as corrupt.
    fn parse_indx(&self, pos: u64, expect_id: FourCc, depth: u8) -> Result<StreamIndex> {
        let mut at = pos;
        let _longs_per_entry = self.reader.read_u16(&mut at)?;
        let _index_sub_type = self.reader.read_u8(&mut at)?;
        let index_type = self.reader.read_u8(&mut at)?;
        let entries_in_use = self.reader.read_u32(&mut at)?;
        let chunk_id = self.reader.read_fourcc(&mut at)?;

        let mut index = StreamIndex {
            stream_id: chunk_id,
            entries: Vec::new(),
        };
        match index_type {
            INDEX_OF_INDEXES => {
                if depth > 0 {
                    return Err(Error::invalid_avi("superindex nested inside a superindex"));
                }
                at += 12; // dwReserved[3]
                for _ in 0..entries_in_use {
                    let chunk_offset = self.reader.read_u64(&mut at)?;
                    let _size = self.reader.read_u32(&mut at)?;
                    let _duration = self.reader.read_u32(&mut at)?;
                    // chunk_offset addresses the ix chunk header, skip id+size
                    let sub = self.parse_indx(chunk_offset + 8, expect_id, depth + 1)?;
                    index.entries.extend(sub.entries);
                }
            }
            INDEX_OF_CHUNKS => {
                let base = self.reader.read_u64(&mut at)?;
                at += 4; // dwReserved
                let available = self.reader.bytes_left(at)? / 8;
                if entries_in_use as u64 > available {
                    return Err(Error::invalid_avi(format!(
                        "index declares {entries_in_use} entries, only {available} fit in the file"
                    )));
                }
                index.entries.reserve(entries_in_use as usize);
                for _ in 0..entries_in_use {
                    let off = self.reader.read_u32(&mut at)?;
                    let raw_len = self.reader.read_u32(&mut at)?;
                    index.entries.push(IndexEntry {
                        offset: base + off as u64,
                        length: raw_len & 0x7FFF_FFFF,
                        keyframe: raw_len & 0x8000_0000 == 0,
                    });
                }
            }
            other => {
                return Err(Error::UnsupportedIndex {
                    index_type: other,
                    stream_id: chunk_id,
                })
            }
        }
        if chunk_id != expect_id {
            debug!(indexed = %chunk_id, expected = %expect_id, "indx chunk id mismatch");
        }
        Ok(index)
    }

    /// Parse the legacy idx1 chunk for the streams still lacking an index.
    /// Offsets are usually relative to the `movi` fourcc, but some muxers
    /// write absolute file offsets; the first entry is probed to tell which
    /// convention the file uses.
    fn parse_idx1(
        &mut self,
        pos: u64,
        len: u32,
        movi_children: u64,
        scan: &Scan,
        fill_video: bool,
        fill_audio: bool,
    ) -> Result<()> {
        let movi_kind_pos = movi_children - 4;
        let video_id = scan.video.as_ref().map(|(n, ..)| *n);
        let audio_id = scan.audio.as_ref().map(|(n, ..)| *n);

        let count = len as usize / 16;
        let mut at = pos;
        let mut base = movi_kind_pos;
        for i in 0..count {
            let ckid = self.reader.read_fourcc(&mut at)?;
            let flags = self.reader.read_u32(&mut at)?;
            let offset = self.reader.read_u32(&mut at)?;
            let length = self.reader.read_u32(&mut at)?;

            if i == 0 {
                let mut probe_at = movi_kind_pos + offset as u64;
                let relative_id = self.reader.read_fourcc(&mut probe_at).unwrap_or(FourCc::NONE);
                if relative_id != ckid {
                    base = 0;
                    debug!("idx1 offsets are absolute file positions");
                }
            }

            let entry = IndexEntry {
                offset: base + offset as u64 + 8,
                length,
                keyframe: flags & AVIIF_KEYFRAME != 0,
            };
            match stream_number(ckid) {
                Some(n) if fill_video && Some(n) == video_id => {
                    self.video_index.entries.push(entry)
                }
                Some(n) if fill_audio && Some(n) == audio_id => {
                    self.audio_index.entries.push(entry)
                }
                _ => {}
            }
        }
        if fill_video {
            self.video_index.stream_id =
                video_id.map(|n| data_chunk_id(n, b"dc")).unwrap_or(FourCc::NONE);
        }
        if fill_audio {
            self.audio_index.stream_id =
                audio_id.map(|n| data_chunk_id(n, b"wb")).unwrap_or(FourCc::NONE);
        }
        Ok(())
    }
}

impl<R: Read + Seek + Send> Demux for AviDemux<R> {
    fn video_info(&self) -> Option<&VideoStreamInfo> {
        self.video_info.as_ref()
    }

    fn audio_info(&self) -> Option<&AudioStreamInfo> {
        self.audio_info.as_ref()
    }

    fn video_position(&self) -> usize {
        self.video_pos
    }

    fn set_video_position(&mut self, frame: usize) -> Result<()> {
        self.video_pos = frame;
        Ok(())
    }

    fn audio_position(&self) -> usize {
        self.audio_pos
    }

    fn set_audio_position(&mut self, sample: usize) -> Result<()> {
        self.audio_pos = sample;
        Ok(())
    }

    fn read_video_frame(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        if self.video_info.is_none() {
            return Err(Error::NotSupported("container has no video stream"));
        }
        let Some(entry) = self.video_index.entries.get(self.video_pos) else {
            out.clear();
            return Ok(0);
        };
        out.resize(entry.length as usize, 0);
        let mut at = entry.offset;
        self.reader.read_exact_at(&mut at, out, "video frame data")?;
        self.video_pos += 1;
        Ok(entry.length as usize)
    }

    fn read_audio_samples(&mut self, out: &mut Vec<u8>, count: usize) -> Result<usize> {
        let Some(info) = &self.audio_info else {
            return Err(Error::NotSupported("container has no audio stream"));
        };
        let total = info.sample_count as usize;
        if self.audio_pos >= total || count == 0 {
            out.clear();
            return Ok(0);
        }
        let count = count.min(total - self.audio_pos);
        let sample_bytes = self.audio_sample_bytes as u64;
        let start_byte = self.audio_pos as u64 * sample_bytes;
        out.resize(count * sample_bytes as usize, 0);

        // locate the entry holding the first byte, then copy across entry
        // boundaries until the request is filled
        let mut idx = self
            .audio_byte_starts
            .partition_point(|&start| start <= start_byte)
            - 1;
        let mut skip = start_byte - self.audio_byte_starts[idx];
        let mut written = 0usize;
        while written < out.len() {
            let entry = &self.audio_index.entries[idx];
            let avail = (entry.length as u64 - skip) as usize;
            let take = avail.min(out.len() - written);
            let mut at = entry.offset + skip;
            self.reader
                .read_exact_at(&mut at, &mut out[written..written + take], "audio data")?;
            written += take;
            idx += 1;
            skip = 0;
        }
        self.audio_pos += count;
        Ok(count)
    }
}
