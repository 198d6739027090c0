//! Turn article groups into output records.
//!
//! Materialization is a pure function of a group and its fragments: the
//! text is concatenated, the bounding boxes are unioned, and a best-effort
//! date is pulled from the headline and the start of the body.

use crate::config::DateConfig;
use crate::geometry::Rect;
use crate::layout::article_grouper::ArticleGroup;
use crate::layout::fragment::TextFragment;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sept|Sep|Oct|Nov|Dec";

lazy_static! {
    /// "October 12, 1888", "Oct. 12 1888", "SEPT 3RD, 1888"
    static ref RE_MONTH_DAY_YEAR: Regex = Regex::new(&format!(
        r"(?i)\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b",
        MONTHS
    ))
    .unwrap();

    /// "12 October 1888", "3rd Sept. 1888", "12TH OCTOBER 1888"
    static ref RE_DAY_MONTH_YEAR: Regex = Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({})\.?,?\s+(\d{{4}})\b",
        MONTHS
    ))
    .unwrap();

    /// "12/10/1888", read day first
    static ref RE_NUMERIC: Regex = Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap();
}

/// A segmented article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Identifier unique within the page: `{source}_p{page}_c{column}_a{seq}`
    pub article_id: String,
    /// Sequential identifier across a whole batch, assigned by the pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_article_id: Option<String>,
    /// Headline text, empty when no member qualified
    pub headline: String,
    /// Member texts joined with single spaces
    pub full_text: String,
    /// Whitespace-separated token count of `full_text`
    pub word_count: usize,
    /// Union of the member bounding boxes
    pub bbox: Rect,
    /// Column of the members
    pub column: usize,
    /// 1-based page number
    pub page_number: u32,
    /// Source document identifier
    pub source_document_id: String,
    /// Date string as printed
    #[serde(default)]
    pub extracted_date: Option<String>,
    /// `extracted_date` as an ISO-8601 calendar date, when it is a real date
    #[serde(default)]
    pub normalized_date: Option<String>,
    /// Number of member fragments
    pub fragment_count: usize,
}

impl Article {
    /// True when a headline was found.
    pub fn has_headline(&self) -> bool {
        !self.headline.is_empty()
    }
}

/// Builds [`Article`] records from groups.
#[derive(Debug, Clone, Default)]
pub struct ArticleMaterializer {
    date: DateConfig,
}

impl ArticleMaterializer {
    /// Create a materializer.
    pub fn new(date: DateConfig) -> Self {
        Self { date }
    }

    /// Materialize one group. `sequence` is the 1-based position of the
    /// article on its page.
    pub fn materialize(&self, fragments: &[TextFragment], group: &ArticleGroup, sequence: usize) -> Article {
        let members = group.members(fragments);
        let first = members.first();
        let source = first.map(|f| f.source_document_id.clone()).unwrap_or_default();
        let page_number = first.map(|f| f.page_number).unwrap_or(0);
        let column = first.map(|f| f.column).unwrap_or(0);

        let headline = group
            .headline
            .map(|i| fragments[i].text.trim().to_string())
            .unwrap_or_default();

        let full_text = members
            .iter()
            .map(|f| f.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let word_count = full_text.split_whitespace().count();

        let bbox = Rect::union_all(members.iter().map(|f| &f.bbox))
            .unwrap_or_else(|| Rect::new(0.0, 0.0, 0.0, 0.0));

        let head: String = full_text.chars().take(self.date.scan_chars).collect();
        let found = extract_date(&format!("{} {}", headline, head));
        let (extracted_date, normalized_date) = match found {
            Some(d) => (Some(d.raw), d.normalized.map(|n| n.format("%Y-%m-%d").to_string())),
            None => (None, None),
        };

        Article {
            article_id: article_id(&source, page_number, column, sequence),
            global_article_id: None,
            headline,
            full_text,
            word_count,
            bbox,
            column,
            page_number,
            source_document_id: source,
            extracted_date,
            normalized_date,
            fragment_count: members.len(),
        }
    }

    /// Materialize every group of one page in order.
    pub fn materialize_all(&self, fragments: &[TextFragment], groups: &[ArticleGroup]) -> Vec<Article> {
        groups
            .iter()
            .enumerate()
            .map(|(i, g)| self.materialize(fragments, g, i + 1))
            .collect()
    }
}

/// Page-local article identifier.
pub fn article_id(source: &str, page_number: u32, column: usize, sequence: usize) -> String {
    format!("{}_p{:03}_c{:02}_a{:03}", source, page_number, column, sequence)
}

/// A date found in article text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDate {
    /// Matched text
    pub raw: String,
    /// Calendar date, `None` when the match is not a valid date
    pub normalized: Option<NaiveDate>,
}

/// Find the first date in `text`.
///
/// Month-day-year is tried first, then day-month-year, then numeric
/// day/month/year. Absence of a date is not an error.
pub fn extract_date(text: &str) -> Option<FoundDate> {
    if let Some(c) = RE_MONTH_DAY_YEAR.captures(text) {
        return Some(found(&c, month_number(&c[1]), &c[2], &c[3]));
    }
    if let Some(c) = RE_DAY_MONTH_YEAR.captures(text) {
        return Some(found(&c, month_number(&c[2]), &c[1], &c[3]));
    }
    if let Some(c) = RE_NUMERIC.captures(text) {
        return Some(found(&c, c[2].parse().ok(), &c[1], &c[3]));
    }
    None
}

fn found(caps: &Captures<'_>, month: Option<u32>, day: &str, year: &str) -> FoundDate {
    let normalized = match (month, day.parse::<u32>(), year.parse::<i32>()) {
        (Some(m), Ok(d), Ok(y)) => NaiveDate::from_ymd_opt(y, m, d),
        _ => None,
    };
    FoundDate {
        raw: caps[0].to_string(),
        normalized,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let key: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match key.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
