//! Unified configuration for the segmentation engine.
//!
//! Every threshold and weight used by the layout heuristics lives here so
//! the heuristics can be tuned and tested independently of the algorithms
//! that use them. All structures deserialize with `#[serde(default)]`, so a
//! JSON file only needs to name the values it overrides.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Strategy used to find column boundaries on a page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStrategy {
    /// Printed vertical rules isolated by a tall, narrow opening
    #[default]
    VerticalRules,
    /// Whitespace gutters found as valleys of a smeared ink projection
    GutterValleys,
    /// Evenly divide the page width into the expected number of columns
    EvenDivision,
}

/// How a grayscale image is turned into ink/background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Binarization {
    /// Local mean over a `block_size` window minus `c`
    AdaptiveMean {
        /// Window size in pixels (odd)
        block_size: u32,
        /// Constant subtracted from the local mean
        c: f32,
    },
    /// Single global threshold chosen by Otsu's method
    Otsu,
}

impl Default for Binarization {
    fn default() -> Self {
        Binarization::AdaptiveMean {
            block_size: 11,
            c: 2.0,
        }
    }
}

/// Column detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnDetectionConfig {
    /// Detection strategy
    pub strategy: ColumnStrategy,
    /// Number of printed columns expected on a page
    pub expected_columns: usize,
    /// Fraction of the page height skipped at the top of page 1 (masthead)
    pub first_page_top_margin: f32,
    /// Fraction of the page height skipped at the top of interior pages
    pub interior_top_margin: f32,
    /// Fraction of the page height skipped at the bottom of every page
    pub bottom_margin: f32,
    /// Height of the vertical structuring element in pixels
    pub vertical_kernel_height: u32,
    /// Minimum normalized projection value for a rule peak
    pub min_peak_prominence: f32,
    /// Width of the horizontal smear used by the gutter strategy
    pub gutter_smear_width: u32,
    /// A gutter valley must fall below this fraction of the mean projection
    pub gutter_valley_ratio: f32,
    /// Allowed difference between detected and expected interior boundaries
    /// before falling back to even division
    pub count_tolerance: usize,
    /// Binarization method
    pub binarization: Binarization,
}

impl Default for ColumnDetectionConfig {
    fn default() -> Self {
        Self {
            strategy: ColumnStrategy::default(),
            expected_columns: 5,
            first_page_top_margin: 0.18,
            interior_top_margin: 0.05,
            bottom_margin: 0.05,
            vertical_kernel_height: 150,
            min_peak_prominence: 0.1,
            gutter_smear_width: 15,
            gutter_valley_ratio: 0.35,
            count_tolerance: 2,
            binarization: Binarization::default(),
        }
    }
}

/// Horizontal rule detection parameters for a single column strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleDetectionConfig {
    /// Strips shorter than this are returned whole
    pub min_strip_height: u32,
    /// Fraction of the strip width shaved from each side
    pub shave_ratio: f32,
    /// Width of the horizontal structuring element as a fraction of strip width
    pub kernel_width_ratio: f32,
    /// Number of closing passes used to bridge broken or tilted rules
    pub close_iterations: u32,
    /// Row ink must exceed this fraction of the strip width to start a run
    pub ink_ratio: f32,
    /// Runs at least this thick are bold text, not rules
    pub max_rule_thickness: u32,
    /// Dividers closer than this to the previous one are discarded
    pub min_snippet_height: u32,
    /// Rows this close to the strip edges are never scanned
    pub edge_skip: u32,
    /// Binarization method
    pub binarization: Binarization,
}

impl Default for RuleDetectionConfig {
    fn default() -> Self {
        Self {
            min_strip_height: 100,
            shave_ratio: 0.05,
            kernel_width_ratio: 0.15,
            close_iterations: 3,
            ink_ratio: 0.15,
            max_rule_thickness: 15,
            min_snippet_height: 80,
            edge_skip: 10,
            binarization: Binarization::default(),
        }
    }
}

/// Headline scoring weights and thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlineConfig {
    /// Height signal fires above this multiple of the local average height
    pub height_ratio: f32,
    /// Brevity signal fires below this many characters
    pub max_chars: usize,
    /// Weight of the height signal
    pub height_weight: f32,
    /// Weight of the brevity signal
    pub brevity_weight: f32,
    /// Weight of the casing signal
    pub casing_weight: f32,
    /// Weight of the lexical signal
    pub lexical_weight: f32,
    /// Minimum accumulated score for a headline
    pub threshold: f32,
    /// Section-marker vocabulary (matched case-insensitively)
    pub keywords: Vec<String>,
    /// Fragments before the candidate included in its neighbourhood
    pub neighbourhood_before: usize,
    /// Fragments after the candidate included in its neighbourhood
    pub neighbourhood_after: usize,
}

impl Default for HeadlineConfig {
    fn default() -> Self {
        Self {
            height_ratio: 1.3,
            max_chars: 100,
            height_weight: 1.0,
            brevity_weight: 1.0,
            casing_weight: 1.0,
            lexical_weight: 1.0,
            threshold: 2.0,
            keywords: [
                "murder", "arrested", "found", "death", "trial", "police", "inquest", "notice",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            neighbourhood_before: 2,
            neighbourhood_after: 2,
        }
    }
}

impl HeadlineConfig {
    /// Maximum score reachable with the current weights.
    pub fn max_score(&self) -> f32 {
        self.height_weight + self.brevity_weight + self.casing_weight + self.lexical_weight
    }
}

/// Article grouping parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// A gap above this multiple of the local average height starts an article
    pub gap_multiplier: f32,
    /// Floor applied to the local average height (pixels)
    pub min_height_floor: f32,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            gap_multiplier: 2.0,
            min_height_floor: 1.0,
        }
    }
}

/// Ingestion filtering applied before grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Fragments with a confidence below this are dropped
    pub min_confidence: Option<f32>,
    /// Vertical centre distance under which overlapping fragments are duplicates
    pub dedup_center_tolerance: f32,
    /// Recompute columns from fragment positions instead of trusting the input
    pub reassign_columns: bool,
    /// Column count used when columns are derived from fragment positions
    pub fragment_columns: usize,
    /// Page width assumed when the input does not carry one
    pub default_page_width: f32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_confidence: Some(0.4),
            dedup_center_tolerance: 10.0,
            reassign_columns: false,
            fragment_columns: 3,
            default_page_width: 2000.0,
        }
    }
}

/// Date extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateConfig {
    /// Number of body characters scanned after the headline
    pub scan_chars: usize,
}

impl Default for DateConfig {
    fn default() -> Self {
        Self { scan_chars: 200 }
    }
}

/// Complete configuration for the segmentation engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Column detection on page images
    pub columns: ColumnDetectionConfig,
    /// Rule detection on column strips
    pub rules: RuleDetectionConfig,
    /// Headline scoring
    pub headline: HeadlineConfig,
    /// Article grouping
    pub grouping: GroupingConfig,
    /// Fragment ingestion filters
    pub ingest: IngestConfig,
    /// Date extraction
    pub date: DateConfig,
}

impl SegmentationConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings calibrated on five-column Victorian broadsheets.
    pub fn broadsheet() -> Self {
        Self::default()
    }

    /// Fewer, larger articles: stricter headlines and a wider gap rule.
    pub fn conservative() -> Self {
        Self {
            headline: HeadlineConfig {
                height_ratio: 1.25,
                max_chars: 60,
                threshold: 3.0,
                ..HeadlineConfig::default()
            },
            grouping: GroupingConfig {
                gap_multiplier: 2.5,
                ..GroupingConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load overrides from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the expected number of printed columns.
    pub fn with_expected_columns(mut self, columns: usize) -> Self {
        self.columns.expected_columns = columns;
        self
    }

    /// Set the column detection strategy.
    pub fn with_column_strategy(mut self, strategy: ColumnStrategy) -> Self {
        self.columns.strategy = strategy;
        self
    }

    /// Set the gap multiplier of the whitespace-gap break rule.
    pub fn with_gap_multiplier(mut self, multiplier: f32) -> Self {
        self.grouping.gap_multiplier = multiplier;
        self
    }

    /// Set the minimum headline score.
    pub fn with_headline_threshold(mut self, threshold: f32) -> Self {
        self.headline.threshold = threshold;
        self
    }

    /// Set (or clear) the ingestion confidence floor.
    pub fn with_min_confidence(mut self, min_confidence: Option<f32>) -> Self {
        self.ingest.min_confidence = min_confidence;
        self
    }

    /// Check that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.columns.expected_columns == 0 {
            return Err(Error::InvalidConfig("expected_columns must be at least 1".into()));
        }
        if self.ingest.fragment_columns == 0 {
            return Err(Error::InvalidConfig("fragment_columns must be at least 1".into()));
        }
        for (name, value) in [
            ("first_page_top_margin", self.columns.first_page_top_margin),
            ("interior_top_margin", self.columns.interior_top_margin),
            ("bottom_margin", self.columns.bottom_margin),
            ("shave_ratio", self.rules.shave_ratio),
        ] {
            if !(0.0..0.5).contains(&value) {
                return Err(Error::InvalidConfig(format!("{} must be in [0, 0.5), got {}", name, value)));
            }
        }
        if !(self.grouping.gap_multiplier > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "gap_multiplier must be positive, got {}",
                self.grouping.gap_multiplier
            )));
        }
        if !(self.grouping.min_height_floor > 0.0) {
            return Err(Error::InvalidConfig("min_height_floor must be positive".into()));
        }
        if self.headline.threshold > self.headline.max_score() {
            log::warn!(
                "headline threshold {} exceeds the maximum score {}; no fragment can be a headline",
                self.headline.threshold,
                self.headline.max_score()
            );
        }
        if let Some(c) = self.ingest.min_confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(Error::InvalidConfig(format!("min_confidence must be in [0, 1], got {}", c)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SegmentationConfig::default().validate().is_ok());
        assert!(SegmentationConfig::conservative().validate().is_ok());
        assert_eq!(SegmentationConfig::broadsheet(), SegmentationConfig::default());
    }

    #[test]
    fn test_headline_max_score() {
        assert_eq!(HeadlineConfig::default().max_score(), 4.0);
    }

    #[test]
    fn test_partial_json_overrides() {
        let json = r#"{ "grouping": { "gap_multiplier": 2.5 }, "columns": { "strategy": "gutter_valleys" } }"#;
        let config: SegmentationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.grouping.gap_multiplier, 2.5);
        assert_eq!(config.grouping.min_height_floor, 1.0);
        assert_eq!(config.columns.strategy, ColumnStrategy::GutterValleys);
        assert_eq!(config.headline, HeadlineConfig::default());
    }

    #[test]
    fn test_binarization_json() {
        let json = r#"{ "binarization": { "method": "otsu" } }"#;
        let config: RuleDetectionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.binarization, Binarization::Otsu);
    }

    #[test]
    fn test_builder_methods() {
        let config = SegmentationConfig::new()
            .with_expected_columns(6)
            .with_column_strategy(ColumnStrategy::EvenDivision)
            .with_gap_multiplier(3.0)
            .with_headline_threshold(3.0)
            .with_min_confidence(None);
        assert_eq!(config.columns.expected_columns, 6);
        assert_eq!(config.columns.strategy, ColumnStrategy::EvenDivision);
        assert_eq!(config.grouping.gap_multiplier, 3.0);
        assert_eq!(config.headline.threshold, 3.0);
        assert_eq!(config.ingest.min_confidence, None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(SegmentationConfig::new().with_expected_columns(0).validate().is_err());
        assert!(SegmentationConfig::new().with_gap_multiplier(0.0).validate().is_err());
        assert!(SegmentationConfig::new().with_gap_multiplier(f32::NAN).validate().is_err());
        assert!(SegmentationConfig::new().with_min_confidence(Some(1.5)).validate().is_err());

        let mut config = SegmentationConfig::new();
        config.columns.first_page_top_margin = 0.8;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "headline": { "threshold": 3.0 } }"#).unwrap();
        let config = SegmentationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.headline.threshold, 3.0);
        assert!(SegmentationConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
