//! Progress extraction from analysis tool output.
//!
//! Pure logic. The orchestrator feeds every output line through
//! [`parse_progress_line`] and folds matches into a job-wide percentage with
//! [`global_progress`].

use std::sync::LazyLock;

use regex::Regex;

/// Marker preceding the `current/total` page token in analysis output.
pub const PROGRESS_MARKER: &str = "Processing page";

static PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Processing page\s+(\S+?)\s*/\s*(\S+)").expect("valid regex")
});

/// Progress ceiling of the analysis stage when translation follows.
pub const ANALYSIS_CEILING_WITH_TRANSLATION: f32 = 90.0;

/// Progress ceiling of the analysis stage when it is the only stage.
pub const ANALYSIS_CEILING: f32 = 99.0;

/// Progress ceiling of the translation stage. 100 is reserved for `Complete`.
pub const TRANSLATION_CEILING: f32 = 99.0;

/// A `(current, total)` page pair reported by the analysis tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    pub current: u32,
    pub total: u32,
}

impl PageProgress {
    /// Fraction of the current file that is done, in `0.0..=1.0`.
    pub fn fraction(self) -> f32 {
        (self.current as f32 / self.total as f32).clamp(0.0, 1.0)
    }
}

/// Detect a page progress token in a raw output line.
///
/// Returns `None` for lines without the marker and for malformed tokens
/// (non-numeric, missing slash, zero total, current beyond total).
pub fn parse_progress_line(line: &str) -> Option<PageProgress> {
    let caps = PROGRESS_RE.captures(line)?;
    let current: u32 = caps.get(1)?.as_str().parse().ok()?;
    let total: u32 = caps
        .get(2)?
        .as_str()
        .trim_end_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .ok()?;
    if total == 0 || current > total {
        return None;
    }
    Some(PageProgress { current, total })
}

/// Job-wide progress for file `file_index` of `total_files`.
///
/// `(file_index + per_file_fraction) / total_files`, scaled into
/// `0.0..=ceiling`. Stays monotonic across file boundaries even though the
/// tool restarts its page counter for every file.
pub fn global_progress(
    file_index: usize,
    total_files: usize,
    page: Option<PageProgress>,
    ceiling: f32,
) -> f32 {
    if total_files == 0 {
        return 0.0;
    }
    let per_file = page.map(PageProgress::fraction).unwrap_or(0.0);
    let done = (file_index as f32 + per_file) / total_files as f32;
    (done * ceiling).clamp(0.0, ceiling)
}

/// Linear interpolation inside a stage band `[start, end]`.
pub fn stage_progress(start: f32, end: f32, done: usize, total: usize) -> f32 {
    if total == 0 {
        return end;
    }
    let fraction = (done as f32 / total as f32).clamp(0.0, 1.0);
    start + (end - start) * fraction
}
