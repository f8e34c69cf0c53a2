mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use movi_media::avi::{AviRemux, RemuxOptions};
use movi_media::demux::Demux;
use movi_media::info::LoadOptions;
use movi_media::mjpeg::FOURCC_MJPG;
use movi_media::remux::Remux;
use movi_media::{Movie, VideoStreamInfo};
use movi_stream::{streamer_for_url, Streamer};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

fn probe(file: &Path, json: bool) -> Result<()> {
    let movie = Movie::load(File::open(file)?, &LoadOptions::default())
        .with_context(|| format!("failed to load {}", file.display()))?;

    if json {
        let report = serde_json::json!({
            "file": file.display().to_string(),
            "video": movie.video_info(),
            "audio": movie.audio_info(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", file.display());
    match movie.video_info() {
        Some(v) => println!(
            "  video: {} {}x{} @ {:.3} fps, {} frames ({:.2}s)",
            v.codec_fourcc,
            v.width,
            v.height,
            v.framerate,
            v.frame_count,
            v.length_seconds()
        ),
        None => println!("  video: none"),
    }
    match movie.audio_info() {
        Some(a) => println!(
            "  audio: {} ch, {} Hz, {} bit, {} samples ({:.2}s)",
            a.channels,
            a.sample_rate,
            a.sample_size,
            a.sample_count,
            a.length_seconds()
        ),
        None => println!("  audio: none"),
    }
    Ok(())
}

fn extract(file: &Path, video: Option<&Path>, audio: Option<&Path>) -> Result<()> {
    if video.is_none() && audio.is_none() {
        bail!("nothing to do: pass --video and/or --audio");
    }
    let mut movie = Movie::load(File::open(file)?, &LoadOptions::default())
        .with_context(|| format!("failed to load {}", file.display()))?;

    if let Some(path) = video {
        let mut out = BufWriter::new(File::create(path)?);
        let written = movie.extract_raw_video(&mut out)?;
        tracing::info!(bytes = written, path = %path.display(), "video stream extracted");
    }
    if let Some(path) = audio {
        let mut out = BufWriter::new(File::create(path)?);
        let written = movie.extract_raw_audio(&mut out)?;
        tracing::info!(bytes = written, path = %path.display(), "audio stream extracted");
    }
    Ok(())
}

fn remux(input: &Path, output: &Path, fps: f32, width: u32, height: u32) -> Result<()> {
    let options = LoadOptions {
        video_override: Some(VideoStreamInfo {
            framerate: fps,
            width,
            height,
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut movie = Movie::load(File::open(input)?, &options)
        .with_context(|| format!("failed to load {}", input.display()))?;
    let video = movie
        .video_info()
        .context("input has no video stream")?
        .clone();

    let mut writer = AviRemux::new(
        File::create(output)?,
        video,
        movie.audio_info().cloned(),
        RemuxOptions::default(),
    )?;
    let demux = movie.demux_mut().context("movie is not loaded")?;
    let mut frame = Vec::new();
    let mut frames = 0usize;
    while demux.read_video_frame(&mut frame)? > 0 {
        writer.write_video_frame(&frame, true)?;
        frames += 1;
    }
    if demux.has_audio() {
        let mut samples = Vec::new();
        demux.set_audio_position(0)?;
        while demux.read_audio_samples(&mut samples, 4096)? > 0 {
            writer.write_audio_samples(&samples)?;
        }
    }
    writer.finish()?;
    tracing::info!(frames, path = %output.display(), "remux complete");
    Ok(())
}

async fn capture(url: &str, output: &Path, max_frames: usize, fps: f32) -> Result<()> {
    let mut stream = streamer_for_url(url, &LoadOptions::default()).await?;
    tracing::info!(%url, "connected, waiting for frames");

    let mut writer: Option<AviRemux<File>> = None;
    let mut frame = Vec::new();
    let mut captured = 0usize;
    let mut seen = 0usize;
    while captured < max_frames {
        if !stream.is_connected() {
            bail!("stream disconnected: {}", stream.status());
        }
        let position = stream.video_position();
        if position == seen {
            tokio::time::sleep(Duration::from_millis(5)).await;
            continue;
        }
        seen = position;
        if stream.read_video_frame(&mut frame)? == 0 {
            continue;
        }
        if writer.is_none() {
            // create the output only once a frame has actually arrived
            let info = VideoStreamInfo {
                codec_fourcc: FOURCC_MJPG,
                framerate: fps,
                ..Default::default()
            };
            writer = Some(AviRemux::new(
                File::create(output)?,
                info,
                None,
                RemuxOptions::default(),
            )?);
        }
        if let Some(w) = writer.as_mut() {
            w.write_video_frame(&frame, true)?;
            captured += 1;
        }
    }
    stream.disconnect_now();
    match writer {
        Some(w) => {
            w.finish()?;
            tracing::info!(captured, path = %output.display(), "capture complete");
            Ok(())
        }
        None => bail!("no frames arrived"),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "movi=trace,movi_media=trace,movi_stream=trace".to_string()
        } else {
            "movi=info,movi_media=info,movi_stream=info".to_string()
        }
    });
    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    match cli.command {
        Commands::Probe { file, json } => probe(&file, json),
        Commands::Extract { file, video, audio } => {
            extract(&file, video.as_deref(), audio.as_deref())
        }
        Commands::Remux {
            input,
            output,
            fps,
            width,
            height,
        } => remux(&input, &output, fps, width, height),
        Commands::Capture {
            url,
            output,
            frames,
            fps,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(capture(&url, &output, frames, fps))
        }
    }
}
