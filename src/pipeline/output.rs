//! Corpus output and the legacy article adapter.

use crate::error::Result;
use crate::geometry::Rect;
use crate::layout::materializer::{extract_date, Article};
use crate::pipeline::ingest::RawBbox;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The document written at the end of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleCorpus {
    /// Number of articles
    pub total_articles: usize,
    /// Articles in page order
    pub articles: Vec<Article>,
}

impl ArticleCorpus {
    /// Wrap a list of articles.
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            total_articles: articles.len(),
            articles,
        }
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the corpus to a file.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a corpus written by [`ArticleCorpus::write_json`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Read a corpus in the older article layout.
    pub fn from_legacy_json(json: &str) -> Result<Self> {
        let legacy: LegacyCorpus = serde_json::from_str(json)?;
        Ok(Self::new(legacy.articles.into_iter().map(Article::from).collect()))
    }
}

#[derive(Debug, Deserialize)]
struct LegacyCorpus {
    articles: Vec<LegacyArticle>,
}

/// Article record as written by older versions of the pipeline.
///
/// Older records used `text` for the body, `date` for the extracted date,
/// `source_pdf` for the document and a batch-wide `article_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyArticle {
    article_id: Option<String>,
    #[serde(default)]
    headline: Option<String>,
    #[serde(default, alias = "full_text")]
    text: Option<String>,
    #[serde(default)]
    word_count: Option<usize>,
    #[serde(default)]
    bbox: Option<RawBbox>,
    #[serde(default, alias = "col")]
    column: Option<usize>,
    #[serde(default, alias = "page")]
    page_number: Option<u32>,
    #[serde(default, alias = "pub", alias = "source_document_id")]
    source_pdf: Option<String>,
    #[serde(default, alias = "extracted_date")]
    date: Option<String>,
    #[serde(default, alias = "fragment_count")]
    num_blocks: Option<usize>,
}

impl From<LegacyArticle> for Article {
    fn from(legacy: LegacyArticle) -> Self {
        let full_text = legacy.text.unwrap_or_default();
        let word_count = legacy
            .word_count
            .unwrap_or_else(|| full_text.split_whitespace().count());
        let normalized_date = legacy
            .date
            .as_deref()
            .and_then(extract_date)
            .and_then(|d| d.normalized)
            .map(|d| d.format("%Y-%m-%d").to_string());
        Article {
            article_id: legacy.article_id.clone().unwrap_or_default(),
            global_article_id: legacy.article_id,
            headline: legacy.headline.unwrap_or_default(),
            full_text,
            word_count,
            bbox: legacy
                .bbox
                .map(RawBbox::to_rect)
                .unwrap_or_else(|| Rect::new(0.0, 0.0, 0.0, 0.0)),
            column: legacy.column.unwrap_or(0),
            page_number: legacy.page_number.unwrap_or(0),
            source_document_id: legacy.source_pdf.unwrap_or_default(),
            extracted_date: legacy.date,
            normalized_date,
            fragment_count: legacy.num_blocks.unwrap_or(0),
        }
    }
}
