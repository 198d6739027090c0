//! Horizontal break detection inside a column.
//!
//! Image form: printed rules separating items in a column strip are found
//! with a wide, short opening followed by a closing that bridges segments of
//! faint or tilted rules. A candidate is accepted only when it is thin, so a
//! line of bold headline type is never mistaken for a divider.
//!
//! Fragment form: the whitespace-gap rule used by the article grouper.

use crate::config::RuleDetectionConfig;
use crate::geometry::Rect;
use crate::layout::morphology::binarize;
use image::{imageops, GrayImage};

/// Detects horizontal dividers in column strips.
#[derive(Debug, Clone, Default)]
pub struct RuleDetector {
    config: RuleDetectionConfig,
}

impl RuleDetector {
    /// Create a detector.
    pub fn new(config: RuleDetectionConfig) -> Self {
        Self { config }
    }

    /// Find break points of a column strip.
    ///
    /// Returns strip-relative y-coordinates, always starting with 0 and
    /// ending with the strip height.
    pub fn detect(&self, strip: &GrayImage) -> Vec<u32> {
        let (w, h) = (strip.width(), strip.height());
        if h == 0 {
            return vec![0];
        }
        if h < self.config.min_strip_height {
            return vec![0, h];
        }

        let shave = ((w as f32 * self.config.shave_ratio) as u32).max(1);
        if w <= 2 * shave {
            return vec![0, h];
        }
        let cw = w - 2 * shave;
        let clean = imageops::crop_imm(strip, shave, 0, cw, h).to_image();
        let mask = binarize(&clean, self.config.binarization);

        let kw = ((cw as f32 * self.config.kernel_width_ratio) as usize).max(1);
        let mut detected = mask.open(kw, 1);
        for _ in 0..self.config.close_iterations {
            detected = detected.dilate(kw, 1);
        }
        for _ in 0..self.config.close_iterations {
            detected = detected.erode(kw, 1);
        }

        let projection = detected.row_sums();
        let dividers = self.scan_runs(&projection, cw);
        let kept = merge_close(dividers, self.config.min_snippet_height);

        let mut bounds = Vec::with_capacity(kept.len() + 2);
        bounds.push(0);
        bounds.extend(kept.into_iter().filter(|&y| y > 0 && y < h));
        bounds.push(h);
        bounds
    }

    /// Midpoints of thin ink-heavy row runs.
    fn scan_runs(&self, projection: &[u32], strip_width: u32) -> Vec<u32> {
        let h = projection.len();
        let threshold = strip_width as f32 * self.config.ink_ratio;
        let edge = self.config.edge_skip as usize;

        let mut dividers = Vec::new();
        let mut y = edge;
        while y + edge < h {
            if projection[y] as f32 > threshold {
                let start = y;
                while y < h && projection[y] as f32 > threshold * 0.5 {
                    y += 1;
                }
                let thickness = y - start;
                if thickness < self.config.max_rule_thickness as usize {
                    dividers.push(((start + y) / 2) as u32);
                } else {
                    log::trace!("rejected {}px ink run at y={} as bold text", thickness, start);
                }
            }
            y += 1;
        }
        dividers
    }
}

/// Keep the first divider of every cluster closer than `min_gap`.
fn merge_close(mut dividers: Vec<u32>, min_gap: u32) -> Vec<u32> {
    dividers.sort_unstable();
    dividers.dedup();
    let mut kept: Vec<u32> = Vec::with_capacity(dividers.len());
    for d in dividers {
        if kept.last().map_or(true, |&last| d > last + min_gap) {
            kept.push(d);
        }
    }
    kept
}

/// Vertical whitespace between the bottom of `prev` and the top of `next`.
pub fn vertical_gap(prev: &Rect, next: &Rect) -> f32 {
    next.top() - prev.bottom()
}

/// Whitespace-gap break rule for fragment streams.
///
/// True when the gap exceeds `multiplier` times the local average height.
/// The average is floored at `height_floor`, so zero-height fragments
/// never produce a zero or NaN ratio.
pub fn gap_exceeds(prev: &Rect, next: &Rect, multiplier: f32, height_floor: f32) -> bool {
    let local_avg = ((prev.height + next.height) / 2.0).max(height_floor);
    vertical_gap(prev, next) > local_avg * multiplier
}
