//! Column snippets and their page frame.
//!
//! Pages are cut into column strips, and strips are cut at printed rules into
//! snippets small enough for an OCR engine. Anything recognized inside a
//! snippet is in the snippet's frame and must be moved back into full-page
//! coordinates with [`SnippetOrigin::to_page`] before it reaches the grouper.

use crate::geometry::Rect;
use crate::layout::column_detector::ColumnBoundaries;
use crate::layout::fragment::TextFragment;
use crate::layout::rule_detector::RuleDetector;
use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a cropped image sits on its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetOrigin {
    /// Column index of the strip the snippet was cut from
    pub column: usize,
    /// Left edge on the page
    pub x_offset: u32,
    /// Top edge on the page
    pub y_offset: u32,
}

impl SnippetOrigin {
    /// Translate a snippet-relative box into full-page coordinates.
    pub fn to_page(&self, bbox: &Rect) -> Rect {
        bbox.translate(self.x_offset as f32, self.y_offset as f32)
    }

    /// Move a fragment recognized inside the snippet into the page frame.
    pub fn place(&self, mut fragment: TextFragment) -> TextFragment {
        fragment.bbox = self.to_page(&fragment.bbox);
        fragment.column = self.column;
        fragment
    }
}

/// One rule-delimited piece of a column strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// 1-based page number
    pub page_number: u32,
    /// Position of the snippet within its column, top to bottom
    pub index: usize,
    /// Page frame of the snippet
    #[serde(flatten)]
    pub origin: SnippetOrigin,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Snippet {
    /// Conventional file name, e.g. `p01_c02_s003.png`.
    pub fn file_name(&self, extension: &str) -> String {
        format!(
            "p{:02}_c{:02}_s{:03}.{}",
            self.page_number, self.origin.column, self.index, extension
        )
    }

    /// Snippet area on the page.
    pub fn page_rect(&self) -> Rect {
        Rect::new(
            self.origin.x_offset as f32,
            self.origin.y_offset as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

/// Cut every column band of a page into snippets at its horizontal rules.
///
/// Zero-width bands and zero-height pieces are skipped.
pub fn split_column_into_snippets(
    page: &GrayImage,
    page_number: u32,
    boundaries: &ColumnBoundaries,
    rules: &RuleDetector,
) -> Vec<Snippet> {
    let height = page.height();
    let mut snippets = Vec::new();
    if height == 0 {
        return snippets;
    }

    for (column, x0, x1) in boundaries.bands() {
        let x1 = x1.min(page.width());
        if x1 <= x0 {
            continue;
        }
        let strip = imageops::crop_imm(page, x0, 0, x1 - x0, height).to_image();
        let breaks = rules.detect(&strip);
        log::debug!(
            "page {} column {}: {} rule breaks",
            page_number,
            column,
            breaks.len().saturating_sub(2)
        );

        let mut index = 0;
        for pair in breaks.windows(2) {
            let (y0, y1) = (pair[0], pair[1]);
            if y1 <= y0 {
                continue;
            }
            snippets.push(Snippet {
                page_number,
                index,
                origin: SnippetOrigin {
                    column,
                    x_offset: x0,
                    y_offset: y0,
                },
                width: x1 - x0,
                height: y1 - y0,
            });
            index += 1;
        }
    }
    snippets
}

/// Crop a snippet out of its page.
pub fn snippet_image(page: &GrayImage, snippet: &Snippet) -> GrayImage {
    imageops::crop_imm(
        page,
        snippet.origin.x_offset,
        snippet.origin.y_offset,
        snippet.width,
        snippet.height,
    )
    .to_image()
}

/// Drop fragments recognized twice where slices overlap.
///
/// A fragment is a duplicate when an earlier kept fragment of the same
/// document, page and column overlaps it horizontally and their vertical
/// centres are within `tolerance`. Returns the kept fragments in input order
/// and the number dropped.
pub fn dedup_overlapping(fragments: Vec<TextFragment>, tolerance: f32) -> (Vec<TextFragment>, usize) {
    let mut kept_boxes: HashMap<(String, u32, usize), Vec<Rect>> = HashMap::new();
    let mut kept = Vec::with_capacity(fragments.len());
    let mut dropped = 0;

    for fragment in fragments {
        let key = (fragment.source_document_id.clone(), fragment.page_number, fragment.column);
        let boxes = kept_boxes.entry(key).or_default();
        let cy = fragment.center().y;
        let duplicate = boxes
            .iter()
            .any(|b| b.overlaps_horizontally(&fragment.bbox) && (b.center().y - cy).abs() < tolerance);
        if duplicate {
            log::debug!("dropping duplicate fragment {:?} at y={}", fragment.text, fragment.bbox.y);
            dropped += 1;
            continue;
        }
        boxes.push(fragment.bbox);
        kept.push(fragment);
    }
    (kept, dropped)
}
