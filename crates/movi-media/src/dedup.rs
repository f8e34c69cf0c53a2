//! Duplicate frame finder.
//!
//! Walks a decoded-pixel source frame by frame and, for each frame, searches
//! a bounded lookback window for an earlier frame with the same content.
//! Comparison is staged from cheap to expensive: average tone first, then a
//! sparse green-channel pass over roughly 2% of the pixels, and only when
//! both agree a full per-channel pass. Feed the result to
//! [`Remux::write_lookback_frame`](crate::remux::Remux::write_lookback_frame)
//! to share bytes between repeated frames.

use crate::error::Result;
use tracing::debug;

/// One decoded pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Supplies decoded frames; the finder has no decoding of its own.
pub trait FrameSource {
    /// Decode the frame at `frame` into RGBA pixels. Every frame must
    /// decode to the same pixel count.
    fn decode(&mut self, frame: usize) -> Result<Vec<Rgba>>;
}

/// Comparison thresholds and cache sizing. The defaults balance speed,
/// accuracy, and memory.
#[derive(Debug, Clone)]
pub struct DedupOptions {
    /// Mean squared per-pixel difference above which frames differ.
    pub max_image_diff: f32,
    /// Largest single-pixel difference allowed in a duplicate.
    pub max_pixel_diff: i32,
    /// How many earlier frames are candidates for each frame.
    pub max_lookback_frames: usize,
    /// Tone distance (per channel) under which a pixel compare is worth
    /// running at all.
    pub tone_compare_distrust: i32,
    /// Frames of decoded pixels kept in the ring cache; zero disables the
    /// cache. Should be at least `max_lookback_frames + 1` to avoid
    /// re-decoding.
    pub pixel_cache_frames: usize,
    /// When the frames carry other streams alongside (audio in the same
    /// window), count skipped candidates against the window too.
    pub other_streams_available: bool,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            max_image_diff: 5.0,
            max_pixel_diff: 50,
            max_lookback_frames: 100,
            tone_compare_distrust: 2,
            pixel_cache_frames: 101,
            other_streams_available: false,
        }
    }
}

/// Counters updated while processing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupStats {
    pub frames_compared: u64,
    pub frames_partially_compared: u64,
    pub frames_fully_compared: u64,
    pub pixel_cache_queries: u64,
    pub pixel_cache_hits: u64,
    pub duplicate_count: usize,
}

pub struct DuplicateFrameFinder<S> {
    source: S,
    frame_offset: usize,
    frame_count: usize,
    options: DedupOptions,
    /// `duplicate_of[i] == Some(j)` means frame `i` repeats frame `j`,
    /// with `j < i`. Entries below `frames_processed` are final.
    duplicate_of: Vec<Option<usize>>,
    frame_tones: Vec<Rgba>,
    /// Ring of decoded frames, indexed by `frame % len`.
    pixel_cache: Vec<Option<Vec<Rgba>>>,
    current_frame: usize,
    pub stats: DedupStats,
}

impl<S: FrameSource> DuplicateFrameFinder<S> {
    pub fn new(source: S, frame_offset: usize, frame_count: usize, options: DedupOptions) -> Self {
        let pixel_cache = vec![None; options.pixel_cache_frames];
        Self {
            source,
            frame_offset,
            frame_count,
            duplicate_of: vec![None; frame_count],
            frame_tones: vec![Rgba::default(); frame_count],
            pixel_cache,
            current_frame: 0,
            options,
            stats: DedupStats::default(),
        }
    }

    /// Frames processed so far; compare against the frame count for
    /// progress reporting.
    pub fn frames_processed(&self) -> usize {
        self.current_frame
    }

    /// The mapping found so far. Entries at indexes below
    /// [`frames_processed`](Self::frames_processed) will not change.
    pub fn duplicates(&self) -> &[Option<usize>] {
        &self.duplicate_of
    }

    /// Process one frame. Returns `false` once every frame is done.
    pub fn progress(&mut self) -> Result<bool> {
        if self.current_frame >= self.frame_count {
            return Ok(false);
        }
        let frame = self.current_frame;
        let pixels = self.source.decode(frame + self.frame_offset)?;
        self.frame_tones[frame] = tone(&pixels);

        let mut candidate = frame.checked_sub(1);
        let mut considered = 0usize;
        while considered < self.options.max_lookback_frames {
            let Some(other) = candidate else { break };
            // comparing against a frame that is itself a duplicate would
            // build reference chains
            if self.duplicate_of[other].is_none() {
                self.stats.frames_compared += 1;
                if self.tones_close(frame, other) && self.pixels_match(&pixels, other)? {
                    self.duplicate_of[frame] = Some(other);
                    self.stats.duplicate_count += 1;
                    debug!(frame, duplicate_of = other, "duplicate frame");
                    break;
                }
                if !self.options.other_streams_available {
                    considered += 1;
                }
            }
            if self.options.other_streams_available {
                considered += 1;
            }
            candidate = other.checked_sub(1);
        }

        if !self.pixel_cache.is_empty() {
            let len = self.pixel_cache.len();
            self.pixel_cache[frame % len] = Some(pixels);
        }
        self.current_frame += 1;
        Ok(true)
    }

    fn tones_close(&self, a: usize, b: usize) -> bool {
        let d = self.options.tone_compare_distrust;
        sqr_pixel_diff(self.frame_tones[a], self.frame_tones[b]) <= d * d
    }

    /// The staged pixel comparison: sparse green-channel pass, then every
    /// pixel on every channel.
    fn pixels_match(&mut self, pixels: &[Rgba], other: usize) -> Result<bool> {
        self.stats.pixel_cache_queries += 1;
        let cached = if !self.pixel_cache.is_empty()
            && self.current_frame - other < self.pixel_cache.len()
        {
            self.pixel_cache[other % self.pixel_cache.len()].clone()
        } else {
            None
        };
        let other_pixels = match cached {
            Some(p) => {
                self.stats.pixel_cache_hits += 1;
                p
            }
            None => self.source.decode(other + self.frame_offset)?,
        };

        self.stats.frames_partially_compared += 1;
        let (mean, peak) = green_diff(pixels, &other_pixels, 53);
        if mean > self.options.max_image_diff || peak > self.options.max_pixel_diff {
            return Ok(false);
        }
        self.stats.frames_fully_compared += 1;
        let (mean, peak) = full_diff(pixels, &other_pixels);
        Ok(mean <= self.options.max_image_diff && peak <= self.options.max_pixel_diff)
    }
}

fn tone(pixels: &[Rgba]) -> Rgba {
    let (mut r, mut g, mut b, mut a) = (0u64, 0u64, 0u64, 0u64);
    for p in pixels {
        r += p.r as u64;
        g += p.g as u64;
        b += p.b as u64;
        a += p.a as u64;
    }
    let n = pixels.len().max(1) as u64;
    Rgba {
        r: (r / n) as u8,
        g: (g / n) as u8,
        b: (b / n) as u8,
        a: (a / n) as u8,
    }
}

fn sqr_pixel_diff(a: Rgba, b: Rgba) -> i32 {
    let r = a.r as i32 - b.r as i32;
    let g = a.g as i32 - b.g as i32;
    let bl = a.b as i32 - b.b as i32;
    let al = a.a as i32 - b.a as i32;
    r * r + g * g + bl * bl + al * al
}

/// Green channel only on every `step`-th pixel; the x4 keeps the mean on
/// the same scale as the four-channel pass.
fn green_diff(a: &[Rgba], b: &[Rgba], step: usize) -> (f32, i32) {
    let step = step.max(1);
    let mut sum = 0i64;
    let mut peak = 0i32;
    let mut i = 0;
    while i < a.len() && i < b.len() {
        let diff = (a[i].g as i32 - b[i].g as i32).abs();
        peak = peak.max(diff);
        sum += (diff * diff) as i64;
        i += step;
    }
    ((sum * 4) as f32 / a.len().max(1) as f32, peak)
}

fn full_diff(a: &[Rgba], b: &[Rgba]) -> (f32, i32) {
    let mut sum = 0i64;
    let mut peak = 0i32;
    for (pa, pb) in a.iter().zip(b.iter()) {
        let diff = sqr_pixel_diff(*pa, *pb);
        sum += diff as i64;
        peak = peak.max(diff);
    }
    (
        sum as f32 / a.len().max(1) as f32,
        (peak as f32).sqrt().round() as i32,
    )
}
