//! Ingestion of upstream OCR output.
//!
//! OCR engines have written fragments under several field-name variants over
//! time. This module is the only place those variants are accepted; everything
//! past it sees canonical [`TextFragment`]s grouped by page.
//!
//! Accepted shapes:
//! - a JSON array of fragments
//! - JSON lines, one fragment per line
//! - the page document `{ "pdfs": [{ "filename", "pages": [{ "page_number",
//!   "image_width", "text_blocks": [...] }] }] }`
//!
//! A malformed fragment is skipped with a warning; it never aborts the batch.

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::layout::fragment::TextFragment;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Source identifier used when the input names none.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// All fragments of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInput {
    /// Source document identifier
    pub source_document_id: String,
    /// 1-based page number
    pub page_number: u32,
    /// Page width in pixels, when the input carries it
    pub page_width: Option<f32>,
    /// False when at least one fragment arrived without a column
    pub columns_known: bool,
    /// Fragments in input order
    pub fragments: Vec<TextFragment>,
}

impl PageInput {
    /// Create an empty page.
    pub fn new(source_document_id: impl Into<String>, page_number: u32) -> Self {
        Self {
            source_document_id: source_document_id.into(),
            page_number,
            page_width: None,
            columns_known: true,
            fragments: Vec::new(),
        }
    }

    /// Build a page from fragments that already carry their columns.
    pub fn from_fragments(fragments: Vec<TextFragment>) -> Self {
        let (source, page) = fragments
            .first()
            .map(|f| (f.source_document_id.clone(), f.page_number))
            .unwrap_or_else(|| (UNKNOWN_SOURCE.to_string(), 1));
        Self {
            fragments,
            ..Self::new(source, page)
        }
    }
}

/// Result of parsing one input document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Pages in first-seen order
    pub pages: Vec<PageInput>,
    /// Fragments rejected as malformed
    pub skipped_fragments: usize,
    /// Pages the OCR stage reported as failed
    pub failed_pages: usize,
}

impl IngestReport {
    /// Total accepted fragments.
    pub fn fragment_count(&self) -> usize {
        self.pages.iter().map(|p| p.fragments.len()).sum()
    }
}

/// Bounding box as an object or as `[x, y, width, height]`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawBbox {
    Object { x: f32, y: f32, width: f32, height: f32 },
    Array([f32; 4]),
}

impl RawBbox {
    pub(crate) fn to_rect(self) -> Rect {
        match self {
            RawBbox::Object { x, y, width, height } => Rect::new(x, y, width, height),
            RawBbox::Array([x, y, width, height]) => Rect::new(x, y, width, height),
        }
    }
}

/// Fragment with every historical field name.
#[derive(Debug, Deserialize)]
struct RawFragment {
    text: String,
    #[serde(default)]
    bbox: Option<RawBbox>,
    #[serde(default)]
    x: Option<f32>,
    #[serde(default)]
    y: Option<f32>,
    #[serde(default)]
    width: Option<f32>,
    #[serde(default)]
    height: Option<f32>,
    #[serde(default, alias = "conf")]
    confidence: Option<f32>,
    #[serde(default, alias = "col")]
    column: Option<i64>,
    #[serde(default, alias = "page")]
    page_number: Option<i64>,
    #[serde(default, alias = "pub", alias = "source_pdf")]
    source_document_id: Option<String>,
}

/// Defaults a page document supplies to its fragments.
#[derive(Debug, Clone, Default)]
struct PageContext {
    source_document_id: Option<String>,
    page_number: Option<u32>,
    page_width: Option<f32>,
}

/// A validated fragment and whether its column came from the input.
struct Accepted {
    fragment: TextFragment,
    column_known: bool,
}

fn convert(index: usize, value: Value, ctx: &PageContext) -> Result<Accepted> {
    let invalid = |reason: String| Error::InvalidFragment { index, reason };

    let raw: RawFragment = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;

    let bbox = match (raw.bbox, raw.x, raw.y, raw.width, raw.height) {
        (Some(b), ..) => b.to_rect(),
        (None, Some(x), Some(y), Some(w), Some(h)) => Rect::new(x, y, w, h),
        _ => return Err(invalid("missing bbox".into())),
    };
    if !bbox.is_well_formed() {
        return Err(invalid(format!("malformed bbox {:?}", bbox)));
    }

    if let Some(c) = raw.confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(invalid(format!("confidence {} outside [0, 1]", c)));
        }
    }

    let column = match raw.column {
        Some(c) if c < 0 => return Err(invalid(format!("negative column {}", c))),
        Some(c) => Some(c as usize),
        None => None,
    };

    let page_number = match raw.page_number {
        Some(p) if p < 0 || p > u32::MAX as i64 => {
            return Err(invalid(format!("page number {} out of range", p)))
        },
        Some(p) => p as u32,
        None => ctx.page_number.unwrap_or(1),
    };

    let source = raw
        .source_document_id
        .filter(|s| !s.trim().is_empty())
        .map(|s| document_id(s.trim()))
        .or_else(|| ctx.source_document_id.clone())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

    let mut fragment = TextFragment::new(raw.text, bbox, column.unwrap_or(0), page_number, source);
    fragment.confidence = raw.confidence;
    Ok(Accepted {
        fragment,
        column_known: column.is_some(),
    })
}

/// Collects accepted fragments into pages.
#[derive(Default)]
struct PageCollector {
    pages: IndexMap<(String, u32), PageInput>,
    skipped: usize,
    failed_pages: usize,
}

impl PageCollector {
    fn push_values(&mut self, values: impl IntoIterator<Item = Value>, ctx: &PageContext) {
        for (index, value) in values.into_iter().enumerate() {
            match convert(index, value, ctx) {
                Ok(accepted) => self.accept(accepted, ctx.page_width),
                Err(e) => {
                    log::warn!("skipping fragment: {}", e);
                    self.skipped += 1;
                },
            }
        }
    }

    fn accept(&mut self, accepted: Accepted, page_width: Option<f32>) {
        let Accepted { fragment, column_known } = accepted;
        let key = (fragment.source_document_id.clone(), fragment.page_number);
        let page = self
            .pages
            .entry(key)
            .or_insert_with(|| PageInput::new(fragment.source_document_id.clone(), fragment.page_number));
        if page.page_width.is_none() {
            page.page_width = page_width;
        }
        page.columns_known &= column_known;
        page.fragments.push(fragment);
    }

    /// Register a page that exists even if it has no fragments.
    fn ensure_page(&mut self, ctx: &PageContext) {
        let source = ctx
            .source_document_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
        let number = ctx.page_number.unwrap_or(1);
        let page = self
            .pages
            .entry((source.clone(), number))
            .or_insert_with(|| PageInput::new(source, number));
        if page.page_width.is_none() {
            page.page_width = ctx.page_width;
        }
    }

    fn finish(self) -> IngestReport {
        IngestReport {
            pages: self.pages.into_values().collect(),
            skipped_fragments: self.skipped,
            failed_pages: self.failed_pages,
        }
    }
}

/// Top level of the page-document form. Documents and pages stay raw so one
/// malformed entry cannot fail the whole file.
#[derive(Debug, Deserialize)]
struct RawCorpus {
    pdfs: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default, alias = "source_pdf", alias = "source_document_id")]
    filename: Option<String>,
    #[serde(default)]
    pages: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(default, alias = "page_num")]
    page_number: Option<u32>,
    #[serde(default)]
    image_width: Option<f32>,
    #[serde(default)]
    text_blocks: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Strip a file extension from a document name (`times_1888.pdf` → `times_1888`).
fn document_id(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| filename.to_string())
}

fn collect_corpus(corpus: RawCorpus, collector: &mut PageCollector) {
    for (d, value) in corpus.pdfs.into_iter().enumerate() {
        let page_count = value
            .get("pages")
            .and_then(Value::as_array)
            .map_or(1, |pages| pages.len().max(1));
        match serde_json::from_value::<RawDocument>(value) {
            Ok(doc) => collect_document(doc, collector),
            Err(e) => {
                log::warn!("skipping document {}: {}", d + 1, e);
                collector.failed_pages += page_count;
            },
        }
    }
}

fn collect_document(doc: RawDocument, collector: &mut PageCollector) {
    let source = doc.filename.as_deref().map(document_id);
    let source_name = source.as_deref().unwrap_or(UNKNOWN_SOURCE);
    for (i, value) in doc.pages.into_iter().enumerate() {
        let page: RawPage = match serde_json::from_value(value) {
            Ok(page) => page,
            Err(e) => {
                log::warn!("skipping page {} of {}: {}", i + 1, source_name, e);
                collector.failed_pages += 1;
                continue;
            },
        };
        let ctx = PageContext {
            source_document_id: source.clone(),
            page_number: Some(page.page_number.unwrap_or(i as u32 + 1)),
            page_width: page.image_width,
        };
        if let Some(err) = page.error {
            log::warn!(
                "skipping page {} of {}: OCR failed: {}",
                ctx.page_number.unwrap_or(0),
                source_name,
                err
            );
            collector.failed_pages += 1;
            continue;
        }
        collector.ensure_page(&ctx);
        collector.push_values(page.text_blocks, &ctx);
    }
}

/// Parse an OCR output document in any accepted shape.
///
/// An empty input is an empty report. Input that is neither JSON nor JSON
/// lines fails with [`Error::InvalidInput`].
pub fn parse_str(input: &str) -> Result<IngestReport> {
    let mut collector = PageCollector::default();
    let ctx = PageContext::default();
    if input.trim().is_empty() {
        return Ok(collector.finish());
    }

    match serde_json::from_str::<Value>(input) {
        Ok(Value::Array(items)) => collector.push_values(items, &ctx),
        Ok(value @ Value::Object(_)) if value.get("pdfs").is_some() => {
            let corpus: RawCorpus = serde_json::from_value(value)
                .map_err(|e| Error::InvalidInput(format!("malformed page document: {}", e)))?;
            collect_corpus(corpus, &mut collector);
        },
        Ok(value @ Value::Object(_)) => collector.push_values([value], &ctx),
        Ok(other) => {
            return Err(Error::InvalidInput(format!(
                "expected a fragment list or page document, found {}",
                json_kind(&other)
            )))
        },
        Err(_) => parse_lines(input, &mut collector)?,
    }

    let report = collector.finish();
    log::debug!(
        "ingested {} fragments on {} pages ({} skipped)",
        report.fragment_count(),
        report.pages.len(),
        report.skipped_fragments
    );
    Ok(report)
}

fn parse_lines(input: &str, collector: &mut PageCollector) -> Result<()> {
    let mut parsed = 0;
    let mut values = Vec::new();
    for (line_no, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => {
                parsed += 1;
                values.push(v);
            },
            Err(e) => {
                log::warn!("skipping line {}: {}", line_no + 1, e);
                collector.skipped += 1;
            },
        }
    }
    if parsed == 0 {
        return Err(Error::InvalidInput("input is neither JSON nor JSON lines".into()));
    }
    collector.push_values(values, &PageContext::default());
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read and parse an OCR output file.
pub fn load_path(path: impl AsRef<Path>) -> Result<IngestReport> {
    let path = path.as_ref();
    log::debug!("reading OCR output from {}", path.display());
    let data = std::fs::read_to_string(path)?;
    parse_str(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_array() {
        let input = r#"[
            {"text": "WHITECHAPEL HORROR", "bbox": {"x": 10, "y": 20, "width": 300, "height": 30},
             "confidence": 0.95, "column": 1, "page_number": 2, "source_document_id": "times"}
        ]"#;
        let report = parse_str(input).unwrap();
        assert_eq!(report.pages.len(), 1);
        let page = &report.pages[0];
        assert_eq!(page.source_document_id, "times");
        assert_eq!(page.page_number, 2);
        assert!(page.columns_known);
        let f = &page.fragments[0];
        assert_eq!(f.bbox, Rect::new(10.0, 20.0, 300.0, 30.0));
        assert_eq!(f.column, 1);
        assert_eq!(f.confidence, Some(0.95));
    }

    #[test]
    fn test_historical_aliases() {
        let input = r#"{"pub": "echo_1888.pdf", "page": 3, "col": 2, "text": "x", "conf": 0.5, "bbox": [1, 2, 3, 4]}"#;
        let report = parse_str(input).unwrap();
        let f = &report.pages[0].fragments[0];
        assert_eq!(f.source_document_id, "echo_1888");
        assert_eq!(f.page_number, 3);
        assert_eq!(f.column, 2);
        assert_eq!(f.confidence, Some(0.5));
        assert_eq!(f.bbox, Rect::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_flat_coordinates() {
        let input = r#"[{"text": "x", "x": 5, "y": 6, "width": 7, "height": 8}]"#;
        let report = parse_str(input).unwrap();
        let page = &report.pages[0];
        assert_eq!(page.fragments[0].bbox, Rect::new(5.0, 6.0, 7.0, 8.0));
        assert!(!page.columns_known);
        assert_eq!(page.source_document_id, UNKNOWN_SOURCE);
        assert_eq!(page.page_number, 1);
    }

    #[test]
    fn test_malformed_fragments_skipped() {
        let input = r#"[
            {"text": "ok", "bbox": [0, 0, 10, 10], "col": 0},
            {"bbox": [0, 0, 10, 10]},
            {"text": "no box"},
            {"text": "negative", "bbox": [0, 0, -5, 10]},
            {"text": "bad col", "bbox": [0, 0, 5, 10], "col": -1},
            {"text": "bad conf", "bbox": [0, 0, 5, 10], "conf": 7.5},
            "not an object"
        ]"#;
        let report = parse_str(input).unwrap();
        assert_eq!(report.fragment_count(), 1);
        assert_eq!(report.skipped_fragments, 6);
    }

    #[test]
    fn test_json_lines() {
        let input = concat!(
            r#"{"pub": "a", "page": 1, "col": 0, "text": "one", "bbox": [0, 0, 10, 10]}"#,
            "\n\n",
            r#"{"pub": "a", "page": 2, "col": 0, "text": "two", "bbox": [0, 0, 10, 10]}"#,
            "\n{broken\n",
            r#"{"pub": "a", "page": 1, "col": 1, "text": "three", "bbox": [0, 0, 10, 10]}"#,
            "\n"
        );
        let report = parse_str(input).unwrap();
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages[0].page_number, 1);
        assert_eq!(report.pages[0].fragments.len(), 2);
        assert_eq!(report.pages[1].page_number, 2);
        assert_eq!(report.skipped_fragments, 1);
    }

    #[test]
    fn test_page_document() {
        let input = r#"{"pdfs": [{"filename": "times_1888.pdf", "pages": [
            {"page_number": 1, "image_width": 2400, "text_blocks": [
                {"text": "HEAD", "confidence": 0.9, "bbox": {"x": 0, "y": 0, "width": 100, "height": 20}}
            ]},
            {"page_number": 2, "error": "engine crashed"},
            {"page_number": 3, "text_blocks": []}
        ]}]}"#;
        let report = parse_str(input).unwrap();
        assert_eq!(report.failed_pages, 1);
        assert_eq!(report.pages.len(), 2);
        let first = &report.pages[0];
        assert_eq!(first.source_document_id, "times_1888");
        assert_eq!(first.page_width, Some(2400.0));
        assert!(!first.columns_known);
        assert_eq!(report.pages[1].page_number, 3);
        assert!(report.pages[1].fragments.is_empty());
    }

    #[test]
    fn test_corrupt_page_does_not_sink_document() {
        let input = r#"{"pdfs": [
            {"filename": "times_1888.pdf", "pages": [
                {"page_number": 1, "text_blocks": [{"text": "one", "bbox": [0, 0, 10, 10]}]},
                {"page_number": 2, "text_blocks": null},
                {"page_number": "2x", "text_blocks": []}
            ]},
            {"filename": 17, "pages": [{}, {}]},
            {"filename": "echo_1888.pdf", "pages": [
                {"page_number": 4, "text_blocks": [{"text": "two", "bbox": [0, 0, 10, 10]}]}
            ]}
        ]}"#;
        let report = parse_str(input).unwrap();
        assert_eq!(report.failed_pages, 4);
        let pages: Vec<_> = report
            .pages
            .iter()
            .map(|p| (p.source_document_id.as_str(), p.page_number, p.fragments.len()))
            .collect();
        assert_eq!(pages, vec![("times_1888", 1, 1), ("echo_1888", 4, 1)]);
    }

    #[test]
    fn test_source_id_same_across_shapes() {
        let flat = parse_str(
            r#"[{"source_pdf": "times_1888.pdf", "page": 2, "text": "x", "bbox": [0, 0, 5, 5]}]"#,
        )
        .unwrap();
        let document = parse_str(
            r#"{"pdfs": [{"filename": "times_1888.pdf", "pages": [
                {"page_number": 2, "text_blocks": [{"text": "x", "bbox": [0, 0, 5, 5]}]}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(flat.pages[0].source_document_id, "times_1888");
        assert_eq!(
            flat.pages[0].fragments[0].source_document_id,
            document.pages[0].fragments[0].source_document_id
        );
    }

    #[test]
    fn test_unrecognized_input() {
        assert!(matches!(parse_str("42"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_str("not json at all"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_str(r#"{"pdfs": 3}"#), Err(Error::InvalidInput(_))));
        assert_eq!(parse_str("  \n").unwrap(), IngestReport::default());
    }

    #[test]
    fn test_document_id() {
        assert_eq!(document_id("times_1888.pdf"), "times_1888");
        assert_eq!(document_id("plain"), "plain");
    }
}
