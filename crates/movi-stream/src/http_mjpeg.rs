//! Live MJPEG over HTTP.
//!
//! A background task reads the response body and publishes completed frames
//! into a small ring; the foreground polls through the [`Demux`] contract
//! and always gets the most recent frame without blocking. The source is
//! not seekable by definition, so position writes fail.

use crate::error::{Error, Result};
use crate::scan::FrameScanner;
use crate::streamer::Streamer;
use bytes::Bytes;
use futures::StreamExt;
use movi_media::demux::Demux;
use movi_media::info::{AudioStreamInfo, LoadOptions, VideoStreamInfo};
use movi_media::mjpeg::FOURCC_MJPG;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const RING_FRAMES: usize = 4;

/// State shared between the worker task and the polling side.
struct Shared {
    ring: Mutex<[Option<Bytes>; RING_FRAMES]>,
    status: Mutex<String>,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    connected: AtomicBool,
    /// Graceful stop, checked by the worker between chunks.
    stop: AtomicBool,
}

pub struct HttpMjpegStream {
    shared: Arc<Shared>,
    /// Forced interrupt for a worker blocked waiting on bytes.
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
    video_info: VideoStreamInfo,
}

impl HttpMjpegStream {
    /// Issue the GET and start the background reader. Must be called from
    /// within a tokio runtime. Returns once the server has answered, so a
    /// returned stream is connected (frames may still take a while).
    pub async fn connect(url: &str, options: &LoadOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout())
            .build()?;
        let response = client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::BadStatus(response.status()));
        }
        debug!(%url, "MJPEG stream connected");

        let shared = Arc::new(Shared {
            ring: Mutex::new(Default::default()),
            status: Mutex::new(format!("connected to {url}")),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            connected: AtomicBool::new(true),
            stop: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(response, shared.clone(), cancel.clone()));

        let mut video_info = options.video_override.clone().unwrap_or_default();
        video_info.codec_fourcc = FOURCC_MJPG;
        Ok(Self {
            shared,
            cancel,
            worker: Some(worker),
            video_info,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Human-readable connection state, updated by the worker.
    pub fn status(&self) -> String {
        self.shared.status.lock().clone()
    }

    pub fn bytes_received(&self) -> u64 {
        self.shared.bytes_received.load(Ordering::Relaxed)
    }

    /// Ask the worker to stop at the next chunk boundary. A worker blocked
    /// on a silent connection keeps waiting; use
    /// [`disconnect_now`](Self::disconnect_now) for that.
    pub fn disconnect(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// Interrupt the worker even when no data is arriving. The response
    /// body, and with it the socket, is dropped by the exiting worker.
    pub fn disconnect_now(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.shared.connected.store(false, Ordering::Release);
    }
}

impl Drop for HttpMjpegStream {
    fn drop(&mut self) {
        self.disconnect_now();
    }
}

async fn run_worker(response: reqwest::Response, shared: Arc<Shared>, cancel: CancellationToken) {
    let mut body = response.bytes_stream();
    let mut scanner = FrameScanner::new();
    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            next = body.next() => next,
        };
        match chunk {
            Some(Ok(chunk)) => {
                shared
                    .bytes_received
                    .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                scanner.push(&chunk, |frame| {
                    let count = shared.frames_received.load(Ordering::Relaxed);
                    shared.ring.lock()[count as usize % RING_FRAMES] = Some(frame);
                    shared.frames_received.fetch_add(1, Ordering::Release);
                });
            }
            Some(Err(err)) => {
                warn!(%err, "MJPEG stream read failed");
                *shared.status.lock() = format!("read failed: {err}");
                break;
            }
            None => {
                *shared.status.lock() = "stream ended".to_string();
                break;
            }
        }
    }
    shared.connected.store(false, Ordering::Release);
    debug!("MJPEG worker stopped");
}

impl Demux for HttpMjpegStream {
    fn video_info(&self) -> Option<&VideoStreamInfo> {
        Some(&self.video_info)
    }

    fn audio_info(&self) -> Option<&AudioStreamInfo> {
        None
    }

    /// The count of frames received so far, not a playhead.
    fn video_position(&self) -> usize {
        self.shared.frames_received.load(Ordering::Acquire) as usize
    }

    fn set_video_position(&mut self, _frame: usize) -> movi_media::Result<()> {
        Err(movi_media::Error::NotSeekable)
    }

    fn audio_position(&self) -> usize {
        0
    }

    fn set_audio_position(&mut self, _sample: usize) -> movi_media::Result<()> {
        Err(movi_media::Error::NotSupported("live MJPEG has no audio"))
    }

    /// The most recently completed frame, or zero bytes when none has
    /// arrived yet. Never blocks.
    fn read_video_frame(&mut self, out: &mut Vec<u8>) -> movi_media::Result<usize> {
        let count = self.shared.frames_received.load(Ordering::Acquire);
        if count == 0 {
            out.clear();
            return Ok(0);
        }
        let ring = self.shared.ring.lock();
        match &ring[(count as usize - 1) % RING_FRAMES] {
            Some(frame) => {
                out.clear();
                out.extend_from_slice(frame);
                Ok(frame.len())
            }
            None => {
                out.clear();
                Ok(0)
            }
        }
    }

    fn read_audio_samples(&mut self, _out: &mut Vec<u8>, _count: usize) -> movi_media::Result<usize> {
        Err(movi_media::Error::NotSupported("live MJPEG has no audio"))
    }

    fn shutdown(&mut self) -> movi_media::Result<()> {
        self.disconnect_now();
        Ok(())
    }
}

impl Streamer for HttpMjpegStream {
    fn is_connected(&self) -> bool {
        HttpMjpegStream::is_connected(self)
    }

    fn status(&self) -> String {
        HttpMjpegStream::status(self)
    }

    fn bytes_received(&self) -> u64 {
        HttpMjpegStream::bytes_received(self)
    }

    fn disconnect(&mut self) {
        HttpMjpegStream::disconnect(self)
    }

    fn disconnect_now(&mut self) {
        HttpMjpegStream::disconnect_now(self)
    }
}
