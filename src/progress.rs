//! Progress projection: pure mapping from playback state to visuals.
//!
//! The bar is a fixed run of [`SEGMENTS`] cells; each sentence owns the cells
//! between its cumulative-length start and end fractions. Nothing here feeds
//! back into playback.

use std::ops::Range;

use crate::speech::TextMetadata;

/// Resolution of the progress bar.
pub const SEGMENTS: usize = 1000;

/// A sentence's place on the normalized timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressMark {
    pub player_idx: usize,
    pub length: usize,
    pub start_pct: f64,
    pub end_pct: f64,
    pub sentence: String,
}

impl ProgressMark {
    /// Bar cells `[floor(start*K), floor(end*K))` owned by this sentence.
    pub fn segment_range(&self) -> Range<usize> {
        let from = (self.start_pct * SEGMENTS as f64).floor() as usize;
        let to = (self.end_pct * SEGMENTS as f64).floor() as usize;
        from.min(SEGMENTS)..to.min(SEGMENTS)
    }

    /// Half-open containment, so a shared boundary belongs to the later
    /// sentence.
    pub fn contains(&self, fraction: f64) -> bool {
        fraction >= self.start_pct && fraction < self.end_pct
    }
}

/// Cumulative-length marks; they partition [0, 1] with the last mark ending
/// at exactly 1.0.
pub fn build_progress_marks(metadata: &TextMetadata) -> Vec<ProgressMark> {
    let total = metadata.total_length();
    let mut marched = 0usize;
    let last = metadata.num_sentences.saturating_sub(1);

    metadata
        .sentence_lengths
        .iter()
        .zip(&metadata.sentences)
        .enumerate()
        .map(|(player_idx, (&length, sentence))| {
            let start_pct = fraction_of(marched, total);
            marched += length;
            let end_pct = if player_idx == last {
                1.0
            } else {
                fraction_of(marched, total)
            };
            ProgressMark {
                player_idx,
                length,
                start_pct,
                end_pct,
                sentence: sentence.clone(),
            }
        })
        .collect()
}

fn fraction_of(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Mark whose range contains `fraction`. Ranges are half-open except the
/// last, which also owns 1.0.
pub fn find_mark(marks: &[ProgressMark], fraction: f64) -> Option<&ProgressMark> {
    if !fraction.is_finite() {
        return None;
    }
    marks.iter().find(|m| m.contains(fraction)).or_else(|| {
        marks
            .last()
            .filter(|last| fraction == last.end_pct && fraction >= last.start_pct)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentState {
    #[default]
    Default,
    Loaded,
    Playing,
    Paused,
}

impl SegmentState {
    pub fn color(self) -> &'static str {
        match self {
            Self::Default => "#f6f6f7",
            Self::Loaded => "#8fa0a6",
            Self::Playing => "#007bff",
            Self::Paused => "#6de19e",
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        let hex = &self.color()[1..];
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }
}

/// The segmented progress bar.
#[derive(Debug, Clone)]
pub struct ProgressBar {
    segments: Vec<SegmentState>,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBar {
    pub fn new() -> Self {
        Self {
            segments: vec![SegmentState::Default; SEGMENTS],
        }
    }

    pub fn reset(&mut self) {
        self.segments.fill(SegmentState::Default);
    }

    pub fn paint(&mut self, mark: &ProgressMark, state: SegmentState) {
        let range = mark.segment_range();
        self.segments[range].fill(state);
    }

    pub fn segments(&self) -> &[SegmentState] {
        &self.segments
    }

    /// State of the sentence owning `mark`, read from its first cell.
    pub fn state_of(&self, mark: &ProgressMark) -> SegmentState {
        let range = mark.segment_range();
        self.segments
            .get(range.start)
            .filter(|_| !range.is_empty())
            .copied()
            .unwrap_or_default()
    }

    /// Squeeze the bar into `width` columns, each taking the state of the
    /// cell at its left edge.
    pub fn downsample(&self, width: usize) -> Vec<SegmentState> {
        (0..width)
            .map(|col| self.segments[col * SEGMENTS / width.max(1)])
            .collect()
    }
}

/// Stacking style of one sentence relative to the active one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStyle {
    /// Signed distance from the active sentence.
    pub offset: i64,
    pub opacity: f32,
    pub blur: f32,
    /// Vertical shift in percent of a sentence height.
    pub translate_pct: i64,
    pub z_index: i64,
    pub active: bool,
}

const MIN_OPACITY: f32 = 0.1;
const OPACITY_STEP: f32 = 0.3;
const MAX_BLUR: f32 = 8.0;
const BLUR_STEP: f32 = 2.0;

pub fn depth_style(idx: usize, play_idx: usize, total: usize) -> DepthStyle {
    let offset = idx as i64 - play_idx as i64;
    if offset == 0 {
        return DepthStyle {
            offset,
            opacity: 1.0,
            blur: 0.0,
            translate_pct: -50,
            z_index: total as i64,
            active: true,
        };
    }
    let distance = offset.unsigned_abs() as f32;
    DepthStyle {
        offset,
        opacity: (1.0 - distance * OPACITY_STEP).max(MIN_OPACITY),
        blur: (distance * BLUR_STEP).min(MAX_BLUR),
        translate_pct: 100 * offset,
        z_index: total as i64 - offset.abs() - 1,
        active: false,
    }
}
