//! Page segmentation pipeline with clean abstraction layers.
//!
//! ```text
//! OCR output (JSON / JSON lines / page documents)
//!     ↓
//! [ingest] (field-name variants → TextFragment, grouped by page)
//!     ↓
//! [SegmentationPipeline::prepare_page] (filter, de-duplicate, assign columns, sort)
//!     ↓
//! [ArticleGrouper] (fragment stream → article groups)
//!     ↓
//! [ArticleMaterializer] (group → Article)
//!     ↓
//! [output] ({ total_articles, articles })
//! ```
//!
//! Page images go through the same pipeline object for column detection
//! and snippet splitting before OCR.
//!
//! Pages are independent. The pipeline is immutable while processing, so
//! [`SegmentationPipeline::segment_pages_parallel`] can fan pages out over
//! scoped threads and still produce the same output as the sequential path.

pub mod ingest;
pub mod output;

pub use ingest::{load_path, parse_str, IngestReport, PageInput};
pub use output::{ArticleCorpus, LegacyArticle};

use crate::config::SegmentationConfig;
use crate::error::Result;
use crate::layout::article_grouper::ArticleGrouper;
use crate::layout::column_detector::{assign_columns, ColumnBoundaries, ColumnDetector};
use crate::layout::fragment::{sort_reading_order, TextFragment};
use crate::layout::headline::HeadlineClassifier;
use crate::layout::materializer::{Article, ArticleMaterializer};
use crate::layout::rule_detector::RuleDetector;
use crate::layout::snippet::{dedup_overlapping, split_column_into_snippets, Snippet};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

/// Fragments of one page ready for grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPage {
    /// Fragments in reading order
    pub fragments: Vec<TextFragment>,
    /// Fragments dropped as blank or low-confidence
    pub filtered: usize,
    /// Fragments dropped as overlap duplicates
    pub duplicates: usize,
}

/// Articles of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    /// Source document identifier
    pub source_document_id: String,
    /// 1-based page number
    pub page_number: u32,
    /// Articles in reading order
    pub articles: Vec<Article>,
    /// Fragments dropped as blank or low-confidence
    pub filtered: usize,
    /// Fragments dropped as overlap duplicates
    pub duplicates: usize,
}

/// Batch statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationSummary {
    /// Pages segmented
    pub pages: usize,
    /// Articles produced
    pub total_articles: usize,
    /// Sum of article word counts
    pub total_words: usize,
    /// Articles with a non-empty headline
    pub articles_with_headlines: usize,
    /// Articles with an extracted date
    pub articles_with_dates: usize,
    /// Fragments rejected as malformed during ingestion
    pub skipped_fragments: usize,
    /// Fragments dropped as blank or low-confidence
    pub filtered_fragments: usize,
    /// Fragments dropped as overlap duplicates
    pub duplicate_fragments: usize,
    /// Pages that could not be processed
    pub failed_pages: usize,
}

impl fmt::Display for SegmentationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pages:                   {}", self.pages)?;
        writeln!(f, "Articles:                {}", self.total_articles)?;
        writeln!(f, "Words:                   {}", self.total_words)?;
        writeln!(f, "Articles with headlines: {}", self.articles_with_headlines)?;
        writeln!(f, "Articles with dates:     {}", self.articles_with_dates)?;
        writeln!(f, "Skipped fragments:       {}", self.skipped_fragments)?;
        writeln!(f, "Filtered fragments:      {}", self.filtered_fragments)?;
        writeln!(f, "Duplicate fragments:     {}", self.duplicate_fragments)?;
        write!(f, "Failed pages:            {}", self.failed_pages)
    }
}

/// Output of a batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentationOutput {
    /// All articles, globally numbered
    pub corpus: ArticleCorpus,
    /// Batch statistics
    pub summary: SegmentationSummary,
}

/// The segmentation pipeline - orchestrates the full flow.
pub struct SegmentationPipeline {
    config: SegmentationConfig,
    column_detector: ColumnDetector,
    rule_detector: RuleDetector,
    grouper: ArticleGrouper,
    materializer: ArticleMaterializer,
}

impl SegmentationPipeline {
    /// Create a pipeline with default configuration.
    pub fn new() -> Self {
        Self::with_config(SegmentationConfig::default())
    }

    /// Create a pipeline with custom configuration.
    ///
    /// The configuration is used as given; call
    /// [`SegmentationConfig::validate`] first for untrusted values.
    pub fn with_config(config: SegmentationConfig) -> Self {
        let classifier = HeadlineClassifier::new(config.headline.clone());
        Self {
            column_detector: ColumnDetector::new(config.columns.clone()),
            rule_detector: RuleDetector::new(config.rules.clone()),
            grouper: ArticleGrouper::new(classifier, config.grouping.clone()),
            materializer: ArticleMaterializer::new(config.date.clone()),
            config,
        }
    }

    /// Create a pipeline from a JSON configuration file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_config(SegmentationConfig::from_json_file(path)?))
    }

    /// Get the current configuration.
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Column boundaries of a page image.
    pub fn detect_columns(&self, page: &GrayImage, page_number: u32) -> ColumnBoundaries {
        self.column_detector.detect(page, page_number)
    }

    /// Detect columns and cut each column at its horizontal rules.
    pub fn split_page(&self, page: &GrayImage, page_number: u32) -> (ColumnBoundaries, Vec<Snippet>) {
        let boundaries = self.detect_columns(page, page_number);
        let snippets = split_column_into_snippets(page, page_number, &boundaries, &self.rule_detector);
        log::debug!(
            "page {}: {} columns, {} snippets",
            page_number,
            boundaries.column_count(),
            snippets.len()
        );
        (boundaries, snippets)
    }

    /// Filter, de-duplicate, assign columns and sort one page's fragments.
    pub fn prepare_page(&self, page: PageInput) -> PreparedPage {
        let ingest = &self.config.ingest;
        let total = page.fragments.len();
        let kept: Vec<TextFragment> = page
            .fragments
            .into_iter()
            .filter(|f| {
                if f.is_blank() {
                    return false;
                }
                match (f.confidence, ingest.min_confidence) {
                    (Some(c), Some(floor)) if c < floor => {
                        log::debug!("dropping low-confidence fragment {:?} ({})", f.text, c);
                        false
                    },
                    _ => true,
                }
            })
            .collect();
        let filtered = total - kept.len();

        let mut fragments = kept;
        if ingest.reassign_columns || !page.columns_known {
            let width = page.page_width.unwrap_or(ingest.default_page_width).max(0.0);
            let boundaries = ColumnBoundaries::even(width.round() as u32, ingest.fragment_columns);
            assign_columns(&mut fragments, &boundaries);
        }

        let (mut fragments, duplicates) = dedup_overlapping(fragments, ingest.dedup_center_tolerance);
        sort_reading_order(&mut fragments);

        PreparedPage {
            fragments,
            filtered,
            duplicates,
        }
    }

    /// Group and materialize a single page's fragments.
    ///
    /// The fragments are sorted into reading order first; no filtering is
    /// applied.
    pub fn segment_fragments(&self, mut fragments: Vec<TextFragment>) -> Vec<Article> {
        sort_reading_order(&mut fragments);
        let groups = self.grouper.group(&fragments);
        self.materializer.materialize_all(&fragments, &groups)
    }

    /// Segment one page.
    pub fn segment_page(&self, page: PageInput) -> PageResult {
        let source_document_id = page.source_document_id.clone();
        let page_number = page.page_number;
        let prepared = self.prepare_page(page);
        let groups = self.grouper.group(&prepared.fragments);
        let articles = self.materializer.materialize_all(&prepared.fragments, &groups);
        log::debug!(
            "{} page {}: {} fragments -> {} articles",
            source_document_id,
            page_number,
            prepared.fragments.len(),
            articles.len()
        );
        PageResult {
            source_document_id,
            page_number,
            articles,
            filtered: prepared.filtered,
            duplicates: prepared.duplicates,
        }
    }

    /// Segment pages in order on the calling thread.
    ///
    /// A page whose segmentation panics is logged and counted as failed;
    /// the remaining pages are unaffected.
    pub fn segment_pages(&self, pages: Vec<PageInput>) -> SegmentationOutput {
        let (results, failed) = segment_isolated(&pages, |p| self.segment_page(p));
        assemble(results, failed)
    }

    /// Segment pages on up to `workers` scoped threads.
    ///
    /// Output is identical to [`SegmentationPipeline::segment_pages`],
    /// including page order and per-page failure isolation.
    pub fn segment_pages_parallel(&self, pages: Vec<PageInput>, workers: usize) -> SegmentationOutput {
        if pages.is_empty() {
            return SegmentationOutput::default();
        }
        let workers = workers.clamp(1, pages.len());
        if workers == 1 {
            return self.segment_pages(pages);
        }
        let chunk_size = pages.len().div_ceil(workers);

        let mut results = Vec::with_capacity(pages.len());
        let mut failed = 0;
        std::thread::scope(|scope| {
            let handles: Vec<_> = pages
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = scope.spawn(move || segment_isolated(chunk, |p| self.segment_page(p)));
                    (chunk.len(), handle)
                })
                .collect();
            for (len, handle) in handles {
                match handle.join() {
                    Ok((chunk_results, chunk_failed)) => {
                        results.extend(chunk_results);
                        failed += chunk_failed;
                    },
                    Err(_) => {
                        log::error!("worker panicked; {} pages lost", len);
                        failed += len;
                    },
                }
            }
        });
        assemble(results, failed)
    }

    /// Segment everything in an ingestion report.
    pub fn segment_report(&self, report: IngestReport, workers: usize) -> SegmentationOutput {
        let mut output = self.segment_pages_parallel(report.pages, workers);
        output.summary.skipped_fragments += report.skipped_fragments;
        output.summary.failed_pages += report.failed_pages;
        output
    }
}

impl Default for SegmentationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SegmentationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentationPipeline")
            .field("config", &self.config)
            .field("column_strategy", &self.column_detector.strategy_name())
            .finish()
    }
}

/// Run `segment` over each page, catching a panic per page.
///
/// Returns the results of the pages that completed, in input order, and the
/// number of pages that panicked.
fn segment_isolated<F>(pages: &[PageInput], segment: F) -> (Vec<PageResult>, usize)
where
    F: Fn(PageInput) -> PageResult,
{
    let mut results = Vec::with_capacity(pages.len());
    let mut failed = 0;
    for page in pages {
        match panic::catch_unwind(AssertUnwindSafe(|| segment(page.clone()))) {
            Ok(result) => results.push(result),
            Err(_) => {
                log::error!(
                    "segmentation of {} page {} panicked; page skipped",
                    page.source_document_id,
                    page.page_number
                );
                failed += 1;
            },
        }
    }
    (results, failed)
}

/// Merge page results into a globally numbered corpus.
fn assemble(results: Vec<PageResult>, failed_pages: usize) -> SegmentationOutput {
    let mut summary = SegmentationSummary {
        pages: results.len(),
        failed_pages,
        ..SegmentationSummary::default()
    };
    let mut articles = Vec::new();
    for result in results {
        summary.filtered_fragments += result.filtered;
        summary.duplicate_fragments += result.duplicates;
        articles.extend(result.articles);
    }

    for (n, article) in articles.iter_mut().enumerate() {
        article.global_article_id = Some(format!("article_{:03}", n + 1));
        summary.total_words += article.word_count;
        if article.has_headline() {
            summary.articles_with_headlines += 1;
        }
        if article.extracted_date.is_some() {
            summary.articles_with_dates += 1;
        }
    }
    summary.total_articles = articles.len();

    SegmentationOutput {
        corpus: ArticleCorpus::new(articles),
        summary,
    }
}

/// Load a page image from disk as grayscale.
pub fn load_page_image(path: impl AsRef<Path>) -> Result<GrayImage> {
    Ok(image::open(path)?.to_luma8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    const BODY: &str = "the proceedings were resumed at the vestry hall before a large attendance";

    fn frag(text: &str, column: usize, y: f32) -> TextFragment {
        TextFragment::new(text, Rect::new(10.0 + column as f32 * 600.0, y, 500.0, 10.0), column, 1, "doc")
    }

    fn page(number: u32, fragments: Vec<TextFragment>) -> PageInput {
        let fragments = fragments
            .into_iter()
            .map(|mut f| {
                f.page_number = number;
                f
            })
            .collect();
        PageInput::from_fragments(fragments)
    }

    #[test]
    fn test_pipeline_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SegmentationPipeline>();
    }

    #[test]
    fn test_panicking_page_fails_alone() {
        let pipeline = SegmentationPipeline::new();
        let pages: Vec<_> = (1..=4).map(|n| page(n, vec![frag(BODY, 0, 100.0)])).collect();
        let (results, failed) = segment_isolated(&pages, |p| {
            if p.page_number == 2 {
                panic!("corrupt page");
            }
            pipeline.segment_page(p)
        });
        assert_eq!(failed, 1);
        let numbers: Vec<u32> = results.iter().map(|r| r.page_number).collect();
        assert_eq!(numbers, vec![1, 3, 4]);
    }

    #[test]
    fn test_prepare_page_filters() {
        let pipeline = SegmentationPipeline::new();
        let fragments = vec![
            frag(BODY, 0, 100.0),
            frag("   ", 0, 120.0),
            frag(BODY, 0, 140.0).with_confidence(0.2),
            frag(BODY, 0, 104.0),
            frag(BODY, 0, 20.0).with_confidence(0.9),
        ];
        let prepared = pipeline.prepare_page(page(1, fragments));
        assert_eq!(prepared.filtered, 2);
        assert_eq!(prepared.duplicates, 1);
        assert_eq!(prepared.fragments.len(), 2);
        assert_eq!(prepared.fragments[0].bbox.y, 20.0);
    }

    #[test]
    fn test_confidence_floor_disabled() {
        let config = SegmentationConfig::default().with_min_confidence(None);
        let pipeline = SegmentationPipeline::with_config(config);
        let prepared = pipeline.prepare_page(page(1, vec![frag(BODY, 0, 0.0).with_confidence(0.1)]));
        assert_eq!(prepared.fragments.len(), 1);
    }

    #[test]
    fn test_columns_assigned_when_unknown() {
        let pipeline = SegmentationPipeline::new();
        let mut p = PageInput::new("doc", 1);
        p.columns_known = false;
        p.page_width = Some(1500.0);
        p.fragments = vec![
            TextFragment::new(BODY, Rect::new(1100.0, 0.0, 300.0, 10.0), 0, 1, "doc"),
            TextFragment::new(BODY, Rect::new(100.0, 0.0, 300.0, 10.0), 0, 1, "doc"),
        ];
        let prepared = pipeline.prepare_page(p);
        assert_eq!(prepared.fragments[0].column, 0);
        assert_eq!(prepared.fragments[1].column, 2);
    }

    #[test]
    fn test_segment_fragments_sorts_input() {
        let pipeline = SegmentationPipeline::new();
        let articles = pipeline.segment_fragments(vec![frag(BODY, 1, 0.0), frag(BODY, 0, 0.0)]);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].column, 0);
        assert_eq!(articles[0].article_id, "doc_p001_c00_a001");
        assert_eq!(articles[1].article_id, "doc_p001_c01_a002");
    }

    #[test]
    fn test_global_numbering_and_summary() {
        let pipeline = SegmentationPipeline::new();
        let pages = vec![
            page(1, vec![frag("WHITECHAPEL HORROR", 0, 0.0), frag(BODY, 0, 12.0)]),
            page(2, vec![frag(BODY, 0, 0.0), frag("dated October 12, 1888", 0, 300.0)]),
        ];
        let output = pipeline.segment_pages(pages);
        let ids: Vec<_> = output
            .corpus
            .articles
            .iter()
            .map(|a| a.global_article_id.clone().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["article_001", "article_002", "article_003"]);
        assert_eq!(output.summary.pages, 2);
        assert_eq!(output.summary.total_articles, 3);
        assert_eq!(output.summary.articles_with_headlines, 1);
        assert_eq!(output.summary.articles_with_dates, 1);
        assert_eq!(output.corpus.total_articles, 3);
        assert_eq!(output.corpus.articles[2].article_id, "doc_p002_c00_a002");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pipeline = SegmentationPipeline::new();
        let pages: Vec<_> = (1..=7)
            .map(|n| {
                page(
                    n,
                    vec![
                        frag("LATEST INTELLIGENCE", 0, 0.0),
                        frag(BODY, 0, 12.0),
                        frag(BODY, 1, 0.0),
                        frag(BODY, 1, 400.0),
                    ],
                )
            })
            .collect();
        let sequential = pipeline.segment_pages(pages.clone());
        for workers in [0, 1, 3, 16] {
            assert_eq!(pipeline.segment_pages_parallel(pages.clone(), workers), sequential);
        }
        assert_eq!(pipeline.segment_pages_parallel(Vec::new(), 4), SegmentationOutput::default());
    }

    #[test]
    fn test_segment_report_carries_ingest_counts() {
        let report = IngestReport {
            pages: vec![page(1, vec![frag(BODY, 0, 0.0)])],
            skipped_fragments: 3,
            failed_pages: 1,
        };
        let output = SegmentationPipeline::new().segment_report(report, 2);
        assert_eq!(output.summary.skipped_fragments, 3);
        assert_eq!(output.summary.failed_pages, 1);
        assert_eq!(output.summary.total_articles, 1);
        let text = output.summary.to_string();
        assert!(text.lines().last().is_some_and(|l| l.starts_with("Failed pages:") && l.ends_with(" 1")));
    }

    #[test]
    fn test_load_page_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        GrayImage::from_pixel(8, 4, image::Luma([200])).save(&path).unwrap();
        let img = load_page_image(&path).unwrap();
        assert_eq!((img.width(), img.height()), (8, 4));
        assert!(load_page_image(dir.path().join("missing.png")).is_err());
    }
}
