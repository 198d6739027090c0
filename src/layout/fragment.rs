//! Text fragment representation for layout analysis.
//!
//! A fragment is the atomic unit of recovered text: one OCR line (or word
//! run) with its bounding box in full-page pixel coordinates.

use crate::geometry::{Point, Rect};
use crate::utils::safe_float_cmp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A piece of recovered text and where it sits on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Recognized text
    pub text: String,
    /// Bounding box in full-page pixel coordinates
    pub bbox: Rect,
    /// OCR confidence (0.0 - 1.0), if the engine reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Index into the page's column set
    pub column: usize,
    /// 1-based page number
    pub page_number: u32,
    /// Identifier of the scanned source document
    pub source_document_id: String,
}

impl TextFragment {
    /// Create a fragment with no confidence score.
    ///
    /// # Examples
    ///
    /// ```
    /// use broadsheet::geometry::Rect;
    /// use broadsheet::layout::TextFragment;
    ///
    /// let f = TextFragment::new("THE TIMES", Rect::new(0.0, 0.0, 120.0, 30.0), 0, 1, "times_1888");
    /// assert_eq!(f.height(), 30.0);
    /// assert!(f.confidence.is_none());
    /// ```
    pub fn new(
        text: impl Into<String>,
        bbox: Rect,
        column: usize,
        page_number: u32,
        source_document_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: None,
            column,
            page_number,
            source_document_id: source_document_id.into(),
        }
    }

    /// Attach an OCR confidence score.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Glyph height of the fragment.
    pub fn height(&self) -> f32 {
        self.bbox.height
    }

    /// Top edge.
    pub fn top(&self) -> f32 {
        self.bbox.top()
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f32 {
        self.bbox.bottom()
    }

    /// Center point of the bounding box.
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// True when the fragment carries no visible text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Order two fragments by `(column, y, x)`.
///
/// NaN coordinates sort last so the ordering stays total; ingestion rejects
/// such fragments before they get here.
pub fn reading_order_cmp(a: &TextFragment, b: &TextFragment) -> Ordering {
    a.column
        .cmp(&b.column)
        .then_with(|| safe_float_cmp(a.bbox.y, b.bbox.y))
        .then_with(|| safe_float_cmp(a.bbox.x, b.bbox.x))
}

/// Sort fragments into column-major reading order.
///
/// The grouper's column and gap rules assume this order; an unsorted stream
/// produces silently wrong segmentation. The sort is stable, so fragments
/// at identical positions keep their input order.
pub fn sort_reading_order(fragments: &mut [TextFragment]) {
    fragments.sort_by(reading_order_cmp);
}

/// Check whether a slice is already in reading order.
pub fn is_reading_ordered(fragments: &[TextFragment]) -> bool {
    fragments
        .windows(2)
        .all(|w| reading_order_cmp(&w[0], &w[1]) != Ordering::Greater)
}

/// Mean height of a set of fragments, `None` when empty.
pub fn average_height(fragments: &[TextFragment]) -> Option<f32> {
    if fragments.is_empty() {
        return None;
    }
    Some(fragments.iter().map(|f| f.height()).sum::<f32>() / fragments.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(column: usize, x: f32, y: f32) -> TextFragment {
        TextFragment::new("text", Rect::new(x, y, 10.0, 10.0), column, 1, "doc")
    }

    #[test]
    fn test_sort_reading_order_column_major() {
        let mut frags = vec![frag(1, 0.0, 0.0), frag(0, 0.0, 50.0), frag(0, 0.0, 10.0)];
        sort_reading_order(&mut frags);
        assert_eq!(frags[0].column, 0);
        assert_eq!(frags[0].bbox.y, 10.0);
        assert_eq!(frags[1].bbox.y, 50.0);
        assert_eq!(frags[2].column, 1);
        assert!(is_reading_ordered(&frags));
    }

    #[test]
    fn test_sort_ties_broken_by_x() {
        let mut frags = vec![frag(0, 80.0, 10.0), frag(0, 5.0, 10.0)];
        sort_reading_order(&mut frags);
        assert_eq!(frags[0].bbox.x, 5.0);
    }

    #[test]
    fn test_unsorted_detected() {
        let frags = vec![frag(0, 0.0, 50.0), frag(0, 0.0, 10.0)];
        assert!(!is_reading_ordered(&frags));
    }

    #[test]
    fn test_average_height() {
        assert_eq!(average_height(&[]), None);
        let mut tall = frag(0, 0.0, 0.0);
        tall.bbox.height = 30.0;
        assert_eq!(average_height(&[frag(0, 0.0, 0.0), tall]), Some(20.0));
    }

    #[test]
    fn test_nan_sorts_last() {
        let mut frags = vec![frag(0, 0.0, f32::NAN), frag(0, 0.0, 30.0), frag(0, 0.0, 10.0)];
        sort_reading_order(&mut frags);
        assert_eq!(frags[0].bbox.y, 10.0);
        assert_eq!(frags[1].bbox.y, 30.0);
        assert!(frags[2].bbox.y.is_nan());
    }

    #[test]
    fn test_blank() {
        let mut f = frag(0, 0.0, 0.0);
        f.text = "   ".into();
        assert!(f.is_blank());
    }
}
