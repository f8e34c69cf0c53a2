//! End-to-end container tests: files built by the remux, read back by the
//! demux, plus hand-built AVIs for the index policy cases.

use movi_media::avi::{
    AviDemux, AviRemux, BitmapInfoHeader, MainHeader, RemuxOptions, StreamHeader, WaveFormatEx,
    FCC_AUDS, FCC_VIDS, ID_00DC, ID_01WB, ID_AVIH, ID_AVI_, ID_HDRL, ID_IDX1, ID_INDX, ID_MOVI,
    ID_STRF, ID_STRH, ID_STRL, INDEX_OF_CHUNKS,
};
use movi_media::demux::{demux_for, Demux};
use movi_media::fourcc::fourcc;
use movi_media::info::{AudioStreamInfo, LoadOptions, VideoStreamInfo};
use movi_media::reader::SharedReader;
use movi_media::remux::Remux;
use movi_media::riff::RiffWriter;
use movi_media::Error;
use std::io::{Cursor, Seek, SeekFrom, Write};

fn video_info(frames: u32) -> VideoStreamInfo {
    VideoStreamInfo {
        codec_fourcc: fourcc(b"MJPG"),
        framerate: 25.0,
        width: 64,
        height: 48,
        bit_depth: 24,
        frame_count: frames,
    }
}

fn audio_info() -> AudioStreamInfo {
    AudioStreamInfo {
        sample_rate: 8000,
        channels: 2,
        sample_size: 16,
        ..Default::default()
    }
}

/// Frame `i` gets length `20 + i` and a recognizable fill byte.
fn frame_bytes(i: usize) -> Vec<u8> {
    vec![(i % 251) as u8; 20 + i]
}

fn build_avi(frame_count: usize, with_audio: Option<&[usize]>) -> Vec<u8> {
    let audio = with_audio.map(|_| audio_info());
    let mut remux = AviRemux::new(
        Cursor::new(Vec::new()),
        video_info(frame_count as u32),
        audio,
        RemuxOptions::default(),
    )
    .unwrap();

    let sample_bytes = 4; // stereo 16-bit
    if let Some(chunks) = with_audio {
        // interleave roughly like a real muxer would
        let mut sample = 0u8;
        for (i, &samples) in chunks.iter().enumerate() {
            if i < frame_count {
                remux.write_video_frame(&frame_bytes(i), true).unwrap();
            }
            let data: Vec<u8> = (0..samples * sample_bytes)
                .map(|_| {
                    sample = sample.wrapping_add(1);
                    sample
                })
                .collect();
            remux.write_audio_samples(&data).unwrap();
        }
        for i in chunks.len()..frame_count {
            remux.write_video_frame(&frame_bytes(i), true).unwrap();
        }
    } else {
        for i in 0..frame_count {
            remux.write_video_frame(&frame_bytes(i), true).unwrap();
        }
    }
    remux.finish().unwrap().into_inner()
}

#[test]
fn test_video_roundtrip_bytes_exact() {
    let file = build_avi(7, None);
    let mut demux = demux_for(Cursor::new(file), &LoadOptions::default()).unwrap();

    let info = demux.video_info().unwrap();
    assert_eq!(info.frame_count, 7);
    assert_eq!((info.width, info.height), (64, 48));
    assert!((info.framerate - 25.0).abs() < 0.01);

    let mut out = Vec::new();
    for i in 0..7 {
        assert_eq!(demux.video_position(), i);
        let n = demux.read_video_frame(&mut out).unwrap();
        assert_eq!(n, 20 + i);
        assert_eq!(out, frame_bytes(i));
    }
    // past the end: zero bytes, no error, no advance
    assert_eq!(demux.read_video_frame(&mut out).unwrap(), 0);
    assert_eq!(demux.video_position(), 7);
}

#[test]
fn test_roundtrip_through_a_real_file() {
    let file = build_avi(3, None);
    let mut tmp = tempfile::tempfile().unwrap();
    tmp.write_all(&file).unwrap();
    tmp.seek(SeekFrom::Start(0)).unwrap();

    let mut demux = demux_for(tmp, &LoadOptions::default()).unwrap();
    let mut out = Vec::new();
    demux.set_video_position(2).unwrap();
    demux.read_video_frame(&mut out).unwrap();
    assert_eq!(out, frame_bytes(2));
}

#[test]
fn test_audio_reads_are_position_additive() {
    // chunk sizes in samples, so reads can straddle 0, 1, 2, and 3+
    // chunk boundaries
    let chunks = [3usize, 5, 2, 7, 1, 4];
    let total: usize = chunks.iter().sum();
    let file = build_avi(4, Some(&chunks));

    let read_range = |from: usize, count: usize| -> Vec<u8> {
        let mut demux = demux_for(Cursor::new(file.clone()), &LoadOptions::default()).unwrap();
        demux.set_audio_position(from).unwrap();
        let mut out = Vec::new();
        let got = demux.read_audio_samples(&mut out, count).unwrap();
        assert_eq!(out.len(), got * 4);
        out
    };

    let whole = read_range(0, total);
    assert_eq!(whole.len(), total * 4);

    for split in [0, 1, 3, 8, 10, 17, total] {
        let mut parts = read_range(0, split);
        parts.extend(read_range(split, total - split));
        assert_eq!(parts, whole, "split at {split}");
    }

    // reading past the end returns what is left
    let tail = read_range(total - 2, 100);
    assert_eq!(tail, whole[(total - 2) * 4..]);
    assert_eq!(read_range(total, 5).len(), 0);
}

#[test]
fn test_lookback_frame_shares_bytes() {
    let mut remux = AviRemux::new(
        Cursor::new(Vec::new()),
        video_info(3),
        None,
        RemuxOptions::default(),
    )
    .unwrap();
    remux.write_video_frame(&frame_bytes(0), true).unwrap();
    remux.write_video_frame(&frame_bytes(1), true).unwrap();
    remux.write_lookback_frame(-2).unwrap();
    assert_eq!(remux.written_frames(), 3);
    let file = remux.finish().unwrap().into_inner();

    let mut demux = demux_for(Cursor::new(file), &LoadOptions::default()).unwrap();
    assert_eq!(demux.video_info().unwrap().frame_count, 3);
    let mut out = Vec::new();
    demux.set_video_position(2).unwrap();
    demux.read_video_frame(&mut out).unwrap();
    assert_eq!(out, frame_bytes(0));
}

#[test]
fn test_random_access_writes_are_rejected() {
    let mut remux = AviRemux::new(
        Cursor::new(Vec::new()),
        video_info(1),
        None,
        RemuxOptions::default(),
    )
    .unwrap();
    remux.write_video_frame(&frame_bytes(0), true).unwrap();
    assert!(matches!(
        remux.write_video_frame_at(&frame_bytes(0), true, 0),
        Err(Error::NotSupported(_))
    ));
    assert!(matches!(
        remux.write_audio_samples_at(&[0; 4], 0),
        Err(Error::NotSupported(_))
    ));
}

#[test]
fn test_superindex_overflow_fails_loudly() {
    let options = RemuxOptions {
        superindex_entries: 2,
        max_riff_size: 1024,
    };
    let mut remux =
        AviRemux::new(Cursor::new(Vec::new()), video_info(0), None, options).unwrap();

    let frame = vec![0xABu8; 200];
    let mut failed = None;
    for _ in 0..64 {
        if let Err(err) = remux.write_video_frame(&frame, true) {
            failed = Some(err);
            break;
        }
    }
    match failed {
        Some(Error::SuperindexFull { capacity }) => assert_eq!(capacity, 2),
        other => panic!("expected superindex overflow, got {other:?}"),
    }
}

#[test]
fn test_riff_ceiling_above_element_limit_is_rejected() {
    // index offsets within a RIFF are 32-bit, so a larger ceiling would
    // silently truncate them
    let options = RemuxOptions {
        superindex_entries: 32,
        max_riff_size: 3_000_000_000,
    };
    assert!(matches!(
        AviRemux::new(Cursor::new(Vec::new()), video_info(0), None, options),
        Err(Error::ElementTooLarge(3_000_000_000))
    ));
}

#[test]
fn test_avix_rollover_roundtrips() {
    // small ceiling forces AVIX continuations well before 64 frames
    let options = RemuxOptions {
        superindex_entries: 32,
        max_riff_size: 2048,
    };
    let mut remux =
        AviRemux::new(Cursor::new(Vec::new()), video_info(0), None, options).unwrap();
    for i in 0..64 {
        remux.write_video_frame(&frame_bytes(i), true).unwrap();
    }
    let file = remux.finish().unwrap().into_inner();

    let mut demux = demux_for(Cursor::new(file), &LoadOptions::default()).unwrap();
    assert_eq!(demux.video_info().unwrap().frame_count, 64);
    let mut out = Vec::new();
    for i in 0..64 {
        demux.read_video_frame(&mut out).unwrap();
        assert_eq!(out, frame_bytes(i), "frame {i}");
    }
}

/// Build a one-stream AVI carrying both an `indx` and an `idx1`, where the
/// `idx1` deliberately points at the wrong chunk.
fn build_avi_with_both_indexes() -> Vec<u8> {
    let mut w = RiffWriter::new(Cursor::new(Vec::new()));
    w.begin_riff(ID_AVI_).unwrap();
    w.begin_list(ID_HDRL).unwrap();
    w.begin_chunk(ID_AVIH).unwrap();
    MainHeader {
        total_frames: 1,
        streams: 1,
        width: 8,
        height: 8,
        ..Default::default()
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();
    w.begin_list(ID_STRL).unwrap();
    w.begin_chunk(ID_STRH).unwrap();
    StreamHeader {
        fcc_type: FCC_VIDS,
        scale: 1,
        rate: 10,
        length: 1,
        ..Default::default()
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();
    w.begin_chunk(ID_STRF).unwrap();
    BitmapInfoHeader {
        size: 40,
        width: 8,
        height: 8,
        planes: 1,
        bit_count: 24,
        ..Default::default()
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();
    w.begin_chunk(ID_INDX).unwrap();
    let indx_slot_at = w.position().unwrap() + 24;
    w.put_u16(4).unwrap();
    w.put_u8(0).unwrap();
    w.put_u8(0).unwrap(); // superindex
    w.put_u32(1).unwrap();
    w.put_fourcc(ID_00DC).unwrap();
    w.put_bytes(&[0u8; 12]).unwrap();
    w.put_bytes(&[0u8; 16]).unwrap(); // the one slot, patched below
    w.end().unwrap();
    w.end().unwrap(); // strl
    w.end().unwrap(); // hdrl

    w.begin_list(ID_MOVI).unwrap();
    let movi_base = w.position().unwrap();
    let right_at = w.position().unwrap() + 8;
    w.write_chunk(ID_00DC, b"right!").unwrap();
    w.write_chunk(ID_00DC, b"wrong!").unwrap();

    // sub-index pointing at the first chunk only
    let ix_header_at = w.position().unwrap();
    w.begin_chunk(fourcc(b"ix00")).unwrap();
    w.put_u16(2).unwrap();
    w.put_u8(0).unwrap();
    w.put_u8(INDEX_OF_CHUNKS).unwrap();
    w.put_u32(1).unwrap();
    w.put_fourcc(ID_00DC).unwrap();
    w.put_u64(movi_base).unwrap();
    w.put_u32(0).unwrap();
    w.put_u32((right_at - movi_base) as u32).unwrap();
    w.put_u32(6).unwrap();
    w.end().unwrap();
    w.end().unwrap(); // movi

    // legacy index pointing at the second chunk
    w.begin_chunk(ID_IDX1).unwrap();
    w.put_fourcc(ID_00DC).unwrap();
    w.put_u32(0x10).unwrap(); // keyframe flag
    w.put_u32((right_at + 6 - (movi_base - 4)) as u32).unwrap();
    w.put_u32(6).unwrap();
    w.end().unwrap();

    w.patch_u64(indx_slot_at, ix_header_at).unwrap();
    w.patch_u32(indx_slot_at + 8, 32 + 8 + 8).unwrap();
    w.patch_u32(indx_slot_at + 12, 1).unwrap();
    let out = w.finish().unwrap().into_inner();
    out
}

#[test]
fn test_hierarchical_index_is_preferred_over_idx1() {
    let file = build_avi_with_both_indexes();
    let reader = SharedReader::new(Cursor::new(file));
    let mut demux = AviDemux::new(reader, &LoadOptions::default()).unwrap();

    let mut out = Vec::new();
    demux.read_video_frame(&mut out).unwrap();
    assert_eq!(out, b"right!");
}

/// Build a two-stream AVI where the video has an `indx` superindex but the
/// audio is indexed only through the legacy `idx1`.
fn build_hybrid_index_avi() -> Vec<u8> {
    let mut w = RiffWriter::new(Cursor::new(Vec::new()));
    w.begin_riff(ID_AVI_).unwrap();
    w.begin_list(ID_HDRL).unwrap();
    w.begin_chunk(ID_AVIH).unwrap();
    MainHeader {
        total_frames: 1,
        streams: 2,
        width: 8,
        height: 8,
        ..Default::default()
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();

    // video strl with a superindex
    w.begin_list(ID_STRL).unwrap();
    w.begin_chunk(ID_STRH).unwrap();
    StreamHeader {
        fcc_type: FCC_VIDS,
        scale: 1,
        rate: 10,
        length: 1,
        ..Default::default()
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();
    w.begin_chunk(ID_STRF).unwrap();
    BitmapInfoHeader {
        size: 40,
        width: 8,
        height: 8,
        planes: 1,
        bit_count: 24,
        ..Default::default()
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();
    w.begin_chunk(ID_INDX).unwrap();
    let indx_slot_at = w.position().unwrap() + 24;
    w.put_u16(4).unwrap();
    w.put_u8(0).unwrap();
    w.put_u8(0).unwrap(); // superindex
    w.put_u32(1).unwrap();
    w.put_fourcc(ID_00DC).unwrap();
    w.put_bytes(&[0u8; 12]).unwrap();
    w.put_bytes(&[0u8; 16]).unwrap(); // the one slot, patched below
    w.end().unwrap();
    w.end().unwrap(); // strl

    // audio strl with no indx of its own
    w.begin_list(ID_STRL).unwrap();
    w.begin_chunk(ID_STRH).unwrap();
    StreamHeader {
        fcc_type: FCC_AUDS,
        scale: 1,
        rate: 8000,
        length: 4,
        sample_size: 4,
        ..Default::default()
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();
    w.begin_chunk(ID_STRF).unwrap();
    WaveFormatEx {
        format_tag: 1,
        channels: 2,
        samples_per_sec: 8000,
        avg_bytes_per_sec: 32_000,
        block_align: 4,
        bits_per_sample: 16,
    }
    .write(&mut w)
    .unwrap();
    w.end().unwrap();
    w.end().unwrap(); // strl
    w.end().unwrap(); // hdrl

    w.begin_list(ID_MOVI).unwrap();
    let movi_base = w.position().unwrap();
    let video_header_at = w.position().unwrap();
    w.write_chunk(ID_00DC, b"video!").unwrap();
    let mut audio_header_at = [0u64; 4];
    for (i, at) in audio_header_at.iter_mut().enumerate() {
        *at = w.position().unwrap();
        w.write_chunk(ID_01WB, &[i as u8; 4]).unwrap();
    }

    // sub-index covering the one video chunk
    let ix_header_at = w.position().unwrap();
    w.begin_chunk(fourcc(b"ix00")).unwrap();
    w.put_u16(2).unwrap();
    w.put_u8(0).unwrap();
    w.put_u8(INDEX_OF_CHUNKS).unwrap();
    w.put_u32(1).unwrap();
    w.put_fourcc(ID_00DC).unwrap();
    w.put_u64(movi_base).unwrap();
    w.put_u32(0).unwrap();
    w.put_u32((video_header_at + 8 - movi_base) as u32).unwrap();
    w.put_u32(6).unwrap();
    w.end().unwrap();
    w.end().unwrap(); // movi

    // full legacy index covering both streams
    w.begin_chunk(ID_IDX1).unwrap();
    w.put_fourcc(ID_00DC).unwrap();
    w.put_u32(0x10).unwrap(); // keyframe flag
    w.put_u32((video_header_at - (movi_base - 4)) as u32).unwrap();
    w.put_u32(6).unwrap();
    for at in &audio_header_at {
        w.put_fourcc(ID_01WB).unwrap();
        w.put_u32(0x10).unwrap();
        w.put_u32((*at - (movi_base - 4)) as u32).unwrap();
        w.put_u32(4).unwrap();
    }
    w.end().unwrap();

    w.patch_u64(indx_slot_at, ix_header_at).unwrap();
    w.patch_u32(indx_slot_at + 8, 32 + 8 + 8).unwrap();
    w.patch_u32(indx_slot_at + 12, 1).unwrap();
    w.finish().unwrap().into_inner()
}

#[test]
fn test_idx1_fallback_is_per_stream() {
    let file = build_hybrid_index_avi();
    let reader = SharedReader::new(Cursor::new(file));
    let mut demux = AviDemux::new(reader, &LoadOptions::default()).unwrap();

    // audio resolves through idx1 even though the video carried an indx
    assert_eq!(demux.audio_info().unwrap().sample_count, 4);

    let mut out = Vec::new();
    demux.read_video_frame(&mut out).unwrap();
    assert_eq!(out, b"video!");

    let mut samples = Vec::new();
    assert_eq!(demux.read_audio_samples(&mut samples, 4).unwrap(), 4);
    assert_eq!(samples, [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
}

#[test]
fn test_self_referencing_superindex_is_rejected() {
    // point the superindex slot back at the indx chunk's own header
    let mut file = build_avi_with_both_indexes();
    let indx_at = file.windows(4).position(|wnd| wnd == b"indx").unwrap() as u64;
    let slot_at = indx_at as usize + 8 + 24;
    file[slot_at..slot_at + 8].copy_from_slice(&indx_at.to_le_bytes());

    let reader = SharedReader::new(Cursor::new(file));
    assert!(matches!(
        AviDemux::new(reader, &LoadOptions::default()),
        Err(Error::InvalidAvi(_))
    ));
}

#[test]
fn test_overstated_index_count_is_rejected() {
    // claim far more entries than the file could possibly hold
    let mut file = build_avi_with_both_indexes();
    let ix_at = file.windows(4).position(|wnd| wnd == b"ix00").unwrap();
    let count_at = ix_at + 8 + 4;
    file[count_at..count_at + 4].copy_from_slice(&0x4000_0000u32.to_le_bytes());

    let reader = SharedReader::new(Cursor::new(file));
    assert!(matches!(
        AviDemux::new(reader, &LoadOptions::default()),
        Err(Error::InvalidAvi(_))
    ));
}

#[test]
fn test_missing_index_is_an_error() {
    // same file, with both index chunk ids damaged so neither is found
    let mut file = build_avi_with_both_indexes();
    let indx = ID_INDX.bytes();
    let idx1 = ID_IDX1.bytes();
    for i in 0..file.len() - 4 {
        if file[i..i + 4] == indx || file[i..i + 4] == idx1 {
            file[i..i + 4].copy_from_slice(b"JUNK");
        }
    }
    let reader = SharedReader::new(Cursor::new(file));
    assert!(matches!(
        AviDemux::new(reader, &LoadOptions::default()),
        Err(Error::NoIndex(_))
    ));
}
