// Pixel scans index rows and columns directly
#![allow(clippy::needless_range_loop)]
#![cfg_attr(test, allow(dead_code))]

//! # Broadsheet
//!
//! Column and article segmentation for scanned newspaper pages.
//!
//! ## Core Features
//!
//! ### Page images
//! - **Column Detection**: printed vertical rules, whitespace gutters or even
//!   division, behind one pluggable `BoundaryDetector` trait
//! - **Rule Detection**: horizontal dividers inside a column strip, with bold
//!   headline type rejected by thickness
//! - **Snippets**: rule-delimited pieces of each column with their page offsets
//!
//! ### OCR fragments
//! - **Ingestion**: every historical OCR field-name variant, malformed
//!   fragments skipped with a warning
//! - **Headline Classification**: additive height, brevity, casing and
//!   keyword signals
//! - **Article Grouping**: a two-state machine over the column-major
//!   fragment stream
//! - **Materialization**: article text, bounding envelope, word count, date
//!   and identifiers
//!
//! ## Quick Start
//!
//! ```no_run
//! use broadsheet::pipeline::{load_path, SegmentationPipeline};
//!
//! # fn main() -> broadsheet::Result<()> {
//! let report = load_path("ocr_output.json")?;
//! let pipeline = SegmentationPipeline::new();
//! let output = pipeline.segment_report(report, 4);
//!
//! output.corpus.write_json("articles.json")?;
//! println!("{}", output.summary);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

// Error handling
pub mod error;

// Configuration
pub mod config;

// Layout analysis
pub mod geometry;
pub mod layout;

// Ingestion, batch driver and output
pub mod pipeline;

// Re-exports
pub use config::SegmentationConfig;
pub use error::{Error, Result};
pub use layout::{Article, TextFragment};
pub use pipeline::{ArticleCorpus, SegmentationPipeline};

// Internal utilities
pub(crate) mod utils {
    //! Internal utility functions for the library.

    use std::cmp::Ordering;

    /// Compare two floats with a total order.
    ///
    /// NaN values are equal to each other and greater than all other values,
    /// so sorting never sees an inconsistent comparison.
    #[inline]
    pub fn safe_float_cmp(a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_sort_with_nan() {
            let mut ys = vec![412.0, f32::NAN, 88.5, 88.5, 1020.0];
            ys.sort_by(|a, b| safe_float_cmp(*a, *b));
            assert_eq!(&ys[..4], &[88.5, 88.5, 412.0, 1020.0]);
            assert!(ys[4].is_nan());
        }

        #[test]
        fn test_nan_pairs_are_equal() {
            assert_eq!(safe_float_cmp(f32::NAN, f32::NAN), Ordering::Equal);
            assert_eq!(safe_float_cmp(-0.0, 0.0), Ordering::Equal);
        }
    }
}

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
