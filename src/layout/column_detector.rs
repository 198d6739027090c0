//! Column boundary detection on page images.
//!
//! Three interchangeable strategies find the interior column dividers of a
//! binarized page region:
//!
//! - [`VerticalRuleDetector`]: printed vertical rules, isolated by opening the
//!   ink with a tall, narrow rectangle and reading peaks of the vertical
//!   projection
//! - [`GutterValleyDetector`]: whitespace gutters, read as valleys of the
//!   projection after smearing words together horizontally
//! - [`EvenDivisionDetector`]: the page width split into equal bands
//!
//! [`ColumnDetector`] wraps a strategy with the shared policy: region of
//! interest, degenerate-page handling and the even-division fallback when a
//! strategy returns an implausible number of dividers.

use crate::config::{ColumnDetectionConfig, ColumnStrategy};
use crate::layout::fragment::TextFragment;
use crate::layout::morphology::{binarize, BinaryMask};
use image::GrayImage;

/// Ordered x-coordinates `[0, x1, ..., width]` partitioning a page into columns.
///
/// Strictly increasing, starting at 0 and ending at the page width. A page
/// of zero width is represented as `[0]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnBoundaries {
    xs: Vec<u32>,
}

impl ColumnBoundaries {
    /// Build a boundary set from interior dividers.
    ///
    /// Dividers outside `(0, width)` and duplicates are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use broadsheet::layout::ColumnBoundaries;
    ///
    /// let b = ColumnBoundaries::new(900, vec![600, 300, 300, 0, 950]);
    /// assert_eq!(b.as_slice(), &[0, 300, 600, 900]);
    /// assert_eq!(b.column_count(), 3);
    /// ```
    pub fn new(width: u32, mut interior: Vec<u32>) -> Self {
        if width == 0 {
            return Self { xs: vec![0] };
        }
        interior.retain(|&x| x > 0 && x < width);
        interior.sort_unstable();
        interior.dedup();

        let mut xs = Vec::with_capacity(interior.len() + 2);
        xs.push(0);
        xs.extend(interior);
        xs.push(width);
        Self { xs }
    }

    /// A single column spanning the whole width.
    pub fn single(width: u32) -> Self {
        Self::new(width, Vec::new())
    }

    /// Divide the width into `columns` equal bands.
    pub fn even(width: u32, columns: usize) -> Self {
        Self::new(width, even_dividers(width, columns))
    }

    /// Boundary coordinates.
    pub fn as_slice(&self) -> &[u32] {
        &self.xs
    }

    /// Page width covered by the boundary set.
    pub fn width(&self) -> u32 {
        self.xs.last().copied().unwrap_or(0)
    }

    /// Number of interior dividers.
    pub fn interior_count(&self) -> usize {
        self.xs.len().saturating_sub(2)
    }

    /// Number of column bands.
    pub fn column_count(&self) -> usize {
        self.xs.len().saturating_sub(1)
    }

    /// Column bands as `(index, x_start, x_end)`, skipping zero-width bands.
    pub fn bands(&self) -> impl Iterator<Item = (usize, u32, u32)> + '_ {
        self.xs
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[1] > w[0])
            .map(|(i, w)| (i, w[0], w[1]))
    }

    /// Column index containing `x`.
    ///
    /// Positions left of the page map to column 0, positions at or beyond the
    /// right edge map to the last column.
    pub fn column_of(&self, x: f32) -> usize {
        let count = self.column_count();
        if count == 0 || !(x > 0.0) {
            return 0;
        }
        let idx = self.xs.partition_point(|&b| (b as f32) <= x);
        idx.saturating_sub(1).min(count - 1)
    }
}

fn even_dividers(width: u32, columns: usize) -> Vec<u32> {
    if columns <= 1 {
        return Vec::new();
    }
    (1..columns as u64)
        .map(|i| (i * width as u64 / columns as u64) as u32)
        .collect()
}

/// Assign every fragment to the column containing its bbox x-centre.
pub fn assign_columns(fragments: &mut [TextFragment], boundaries: &ColumnBoundaries) {
    for fragment in fragments {
        fragment.column = boundaries.column_of(fragment.center().x);
    }
}

/// A strategy for locating interior column dividers.
///
/// Implementations receive the binarized region of interest of a page and
/// return divider x-coordinates in that region's frame (which shares the
/// page's x axis). They never fail; an empty result means "no evidence".
pub trait BoundaryDetector: Send + Sync {
    /// Find interior dividers.
    fn find_dividers(&self, roi: &BinaryMask, expected_columns: usize) -> Vec<u32>;

    /// Return the name of this strategy for debugging.
    fn name(&self) -> &'static str;
}

/// Minimum distance between two dividers for a page of `width`.
fn min_separation(width: usize, expected_columns: usize) -> usize {
    (width / (expected_columns + 2)).max(1)
}

/// Keep the first candidate of every cluster closer than `min_sep`, and drop
/// candidates hugging the page edges.
fn separate(candidates: impl IntoIterator<Item = usize>, width: usize, min_sep: usize) -> Vec<u32> {
    let edge = min_sep / 2;
    let mut kept: Vec<usize> = Vec::new();
    for x in candidates {
        if x <= edge || x + edge >= width {
            continue;
        }
        if kept.last().map_or(true, |&last| x > last + min_sep) {
            kept.push(x);
        }
    }
    kept.into_iter().map(|x| x as u32).collect()
}

/// Printed vertical rules found with a tall, narrow morphological opening.
#[derive(Debug, Clone)]
pub struct VerticalRuleDetector {
    /// Height of the vertical structuring element
    pub kernel_height: u32,
    /// Minimum normalized projection value of a peak
    pub min_peak_prominence: f32,
}

impl VerticalRuleDetector {
    /// Create a detector from the column configuration.
    pub fn from_config(config: &ColumnDetectionConfig) -> Self {
        Self {
            kernel_height: config.vertical_kernel_height,
            min_peak_prominence: config.min_peak_prominence,
        }
    }
}

impl BoundaryDetector for VerticalRuleDetector {
    fn find_dividers(&self, roi: &BinaryMask, expected_columns: usize) -> Vec<u32> {
        let kh = (self.kernel_height as usize).clamp(1, roi.height().max(1));
        let lines = roi.open(1, kh);
        let projection = lines.column_sums();

        let max = projection.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return Vec::new();
        }
        let norm: Vec<f32> = projection.iter().map(|&v| v as f32 / max as f32).collect();

        // Plateaus (rules several pixels thick) report their first pixel.
        let peaks = (1..norm.len().saturating_sub(1)).filter(|&x| {
            norm[x] > self.min_peak_prominence && norm[x] > norm[x - 1] && norm[x] >= norm[x + 1]
        });

        separate(peaks, roi.width(), min_separation(roi.width(), expected_columns))
    }

    fn name(&self) -> &'static str {
        "VerticalRules"
    }
}

/// Whitespace gutters read as valleys of a horizontally smeared projection.
#[derive(Debug, Clone)]
pub struct GutterValleyDetector {
    /// Width of the horizontal smear
    pub smear_width: u32,
    /// A valley must fall below this fraction of the mean projection
    pub valley_ratio: f32,
}

impl GutterValleyDetector {
    /// Create a detector from the column configuration.
    pub fn from_config(config: &ColumnDetectionConfig) -> Self {
        Self {
            smear_width: config.gutter_smear_width,
            valley_ratio: config.gutter_valley_ratio,
        }
    }
}

impl BoundaryDetector for GutterValleyDetector {
    fn find_dividers(&self, roi: &BinaryMask, expected_columns: usize) -> Vec<u32> {
        let smeared = roi.dilate(self.smear_width.max(1) as usize, 1);
        let projection = smeared.column_sums();
        if projection.is_empty() {
            return Vec::new();
        }

        let mean = projection.iter().map(|&v| v as f32).sum::<f32>() / projection.len() as f32;
        if mean <= 0.0 {
            return Vec::new();
        }
        let threshold = mean * self.valley_ratio;

        // Centre of every low run that is enclosed by ink on both sides.
        let mut centres = Vec::new();
        let mut run_start: Option<usize> = None;
        for (x, &v) in projection.iter().enumerate() {
            let low = (v as f32) < threshold;
            match (low, run_start) {
                (true, None) => run_start = Some(x),
                (false, Some(start)) => {
                    if start > 0 {
                        centres.push((start + x - 1) / 2);
                    }
                    run_start = None;
                },
                _ => {},
            }
        }

        separate(centres, roi.width(), min_separation(roi.width(), expected_columns))
    }

    fn name(&self) -> &'static str {
        "GutterValleys"
    }
}

/// Equal-width bands; also the shared fallback of the other strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvenDivisionDetector;

impl BoundaryDetector for EvenDivisionDetector {
    fn find_dividers(&self, roi: &BinaryMask, expected_columns: usize) -> Vec<u32> {
        even_dividers(roi.width() as u32, expected_columns)
    }

    fn name(&self) -> &'static str {
        "EvenDivision"
    }
}

/// Create a boundary detector based on configuration.
pub fn create_detector(config: &ColumnDetectionConfig) -> Box<dyn BoundaryDetector> {
    match config.strategy {
        ColumnStrategy::VerticalRules => Box::new(VerticalRuleDetector::from_config(config)),
        ColumnStrategy::GutterValleys => Box::new(GutterValleyDetector::from_config(config)),
        ColumnStrategy::EvenDivision => Box::new(EvenDivisionDetector),
    }
}

/// Page-level column detection: strategy plus fallback policy.
pub struct ColumnDetector {
    config: ColumnDetectionConfig,
    strategy: Box<dyn BoundaryDetector>,
}

impl ColumnDetector {
    /// Create a detector using the configured strategy.
    pub fn new(config: ColumnDetectionConfig) -> Self {
        let strategy = create_detector(&config);
        Self { config, strategy }
    }

    /// Create a detector with a custom strategy.
    pub fn with_strategy(config: ColumnDetectionConfig, strategy: Box<dyn BoundaryDetector>) -> Self {
        Self { config, strategy }
    }

    /// Name of the active strategy.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Detect the column boundaries of a page image.
    ///
    /// Never fails: an empty image yields `[0]`, a page without ink yields a
    /// single column, and an implausible divider count falls back to even
    /// division of the page width.
    pub fn detect(&self, page: &GrayImage, page_number: u32) -> ColumnBoundaries {
        let (width, height) = (page.width(), page.height());
        if width == 0 || height == 0 {
            return ColumnBoundaries::new(width, Vec::new());
        }

        let mask = binarize(page, self.config.binarization);
        let roi = self.region_of_interest(&mask, page_number);
        if roi.is_empty() || roi.ink_count() == 0 {
            log::debug!("page {}: no ink in region of interest, single column", page_number);
            return ColumnBoundaries::single(width);
        }

        let expected = self.config.expected_columns.max(1);
        let dividers = self.strategy.find_dividers(&roi, expected);
        let boundaries = ColumnBoundaries::new(width, dividers);

        let expected_interior = expected - 1;
        if boundaries.interior_count().abs_diff(expected_interior) > self.config.count_tolerance {
            log::debug!(
                "page {}: {} found {} dividers, expected {}; falling back to even division",
                page_number,
                self.strategy.name(),
                boundaries.interior_count(),
                expected_interior
            );
            return ColumnBoundaries::even(width, expected);
        }

        log::debug!(
            "page {}: {} boundaries {:?}",
            page_number,
            self.strategy.name(),
            boundaries.as_slice()
        );
        boundaries
    }

    fn region_of_interest(&self, mask: &BinaryMask, page_number: u32) -> BinaryMask {
        let h = mask.height() as f32;
        let top_ratio = if page_number <= 1 {
            self.config.first_page_top_margin
        } else {
            self.config.interior_top_margin
        };
        let top = (h * top_ratio) as usize;
        let bottom = ((h * (1.0 - self.config.bottom_margin)) as usize).max(top);
        mask.crop(0, top, mask.width(), bottom - top)
    }
}

impl std::fmt::Debug for ColumnDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnDetector")
            .field("config", &self.config)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
