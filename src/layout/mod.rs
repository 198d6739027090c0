//! Layout analysis for scanned newspaper pages.
//!
//! This module provides the segmentation algorithms:
//! - Column boundary detection (vertical rules, gutters, even division)
//! - Horizontal rule detection inside column strips
//! - Headline classification
//! - Article grouping over reading-ordered fragments
//! - Article materialization (text, envelope, date, id)

pub mod article_grouper;
pub mod column_detector;
pub mod fragment;
pub mod headline;
pub mod materializer;
pub mod morphology;
pub mod rule_detector;
pub mod snippet;

// Re-export main types
pub use article_grouper::{ArticleGroup, ArticleGrouper, BreakReason};
pub use column_detector::{
    assign_columns, create_detector, BoundaryDetector, ColumnBoundaries, ColumnDetector,
    EvenDivisionDetector, GutterValleyDetector, VerticalRuleDetector,
};
pub use fragment::{sort_reading_order, TextFragment};
pub use headline::{HeadlineClassifier, HeadlineScore, HeadlineSignals};
pub use materializer::{extract_date, Article, ArticleMaterializer, FoundDate};
pub use morphology::{binarize, BinaryMask};
pub use rule_detector::{gap_exceeds, RuleDetector};
pub use snippet::{dedup_overlapping, split_column_into_snippets, Snippet, SnippetOrigin};
