//! Headline detection using typographic and lexical signals.
//!
//! Each fragment earns points for being taller than its neighbours, for
//! being short, for headline casing and for containing section-marker
//! vocabulary. A fragment is a headline when its score reaches the configured
//! threshold. False positives and negatives are expected; the score only
//! biases article breaks toward true section starts.

use crate::config::HeadlineConfig;
use crate::layout::fragment::{average_height, TextFragment};

/// Which signals fired for a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeadlineSignals {
    /// Taller than the local average
    pub tall: bool,
    /// Shorter than the brevity cutoff
    pub short: bool,
    /// Upper-case, or title-case without terminal punctuation
    pub headline_case: bool,
    /// Contains a section-marker keyword
    pub section_keyword: bool,
}

/// Score of one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadlineScore {
    /// Accumulated weighted score
    pub score: f32,
    /// Individual signals
    pub signals: HeadlineSignals,
}

/// Scores fragments as headline candidates.
#[derive(Debug, Clone)]
pub struct HeadlineClassifier {
    config: HeadlineConfig,
    keywords: Vec<String>,
}

impl Default for HeadlineClassifier {
    fn default() -> Self {
        Self::new(HeadlineConfig::default())
    }
}

impl HeadlineClassifier {
    /// Create a classifier.
    pub fn new(config: HeadlineConfig) -> Self {
        let keywords = config
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { config, keywords }
    }

    /// Configuration in use.
    pub fn config(&self) -> &HeadlineConfig {
        &self.config
    }

    /// Score a fragment against a neighbourhood used for the local average height.
    ///
    /// An empty neighbourhood uses the fragment's own height, so the height
    /// signal cannot fire.
    pub fn score(&self, fragment: &TextFragment, neighbourhood: &[TextFragment]) -> HeadlineScore {
        let text = fragment.text.trim();
        if text.is_empty() {
            return HeadlineScore::default();
        }

        let avg_height = average_height(neighbourhood).unwrap_or(fragment.height());
        let signals = HeadlineSignals {
            tall: avg_height > 0.0 && fragment.height() > avg_height * self.config.height_ratio,
            short: text.chars().count() < self.config.max_chars,
            headline_case: is_headline_case(text),
            section_keyword: self.has_keyword(text),
        };

        let mut score = 0.0;
        if signals.tall {
            score += self.config.height_weight;
        }
        if signals.short {
            score += self.config.brevity_weight;
        }
        if signals.headline_case {
            score += self.config.casing_weight;
        }
        if signals.section_keyword {
            score += self.config.lexical_weight;
        }

        HeadlineScore { score, signals }
    }

    /// Headline decision for a fragment and an explicit neighbourhood.
    pub fn is_headline(&self, fragment: &TextFragment, neighbourhood: &[TextFragment]) -> bool {
        self.score(fragment, neighbourhood).score >= self.config.threshold
    }

    /// Neighbourhood window of the fragment at `index` in a sorted stream.
    pub fn neighbourhood<'a>(&self, fragments: &'a [TextFragment], index: usize) -> &'a [TextFragment] {
        let start = index.saturating_sub(self.config.neighbourhood_before);
        let end = (index + self.config.neighbourhood_after + 1).min(fragments.len());
        &fragments[start..end]
    }

    /// Score the fragment at `index` against its window in the stream.
    pub fn score_at(&self, fragments: &[TextFragment], index: usize) -> HeadlineScore {
        self.score(&fragments[index], self.neighbourhood(fragments, index))
    }

    /// Headline decision for the fragment at `index` of a sorted stream.
    pub fn is_headline_at(&self, fragments: &[TextFragment], index: usize) -> bool {
        self.score_at(fragments, index).score >= self.config.threshold
    }

    fn has_keyword(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Upper-case text, or title-case text that does not end a sentence.
fn is_headline_case(text: &str) -> bool {
    if is_upper(text) {
        return true;
    }
    let ends_sentence = text.ends_with(['.', '!', '?']);
    is_title(text) && !ends_sentence
}

/// At least one cased letter and no lower-case letters.
fn is_upper(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}

/// Every word starts with an upper-case letter followed only by lower-case
/// letters, and at least one letter is present.
fn is_title(text: &str) -> bool {
    let mut cased = false;
    let mut prev_cased = false;
    for c in text.chars() {
        if c.is_uppercase() {
            if prev_cased {
                return false;
            }
            prev_cased = true;
            cased = true;
        } else if c.is_lowercase() {
            if !prev_cased {
                return false;
            }
            prev_cased = true;
            cased = true;
        } else {
            prev_cased = false;
        }
    }
    cased
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn frag(text: &str, height: f32) -> TextFragment {
        TextFragment::new(text, Rect::new(0.0, 0.0, 200.0, height), 0, 1, "doc")
    }

    fn body(n: usize) -> Vec<TextFragment> {
        (0..n)
            .map(|_| frag("and the crowd assembled in the street outside the house", 10.0))
            .collect()
    }

    #[test]
    fn test_casing_helpers() {
        assert!(is_upper("WHITECHAPEL HORROR"));
        assert!(is_upper("THE 1888 CASE"));
        assert!(!is_upper("1888"));
        assert!(!is_upper("The Case"));
        assert!(is_title("The Whitechapel Horror"));
        assert!(is_title("O'Brien Arrested"));
        assert!(!is_title("The whitechapel horror"));
        assert!(!is_title("McDonald"));
        assert!(!is_title("---"));
    }

    #[test]
    fn test_headline_case() {
        assert!(is_headline_case("WHITECHAPEL HORROR."));
        assert!(is_headline_case("Latest Intelligence"));
        assert!(!is_headline_case("Latest Intelligence."));
        assert!(!is_headline_case("the latest intelligence"));
    }

    #[test]
    fn test_caps_short_is_headline() {
        let c = HeadlineClassifier::default();
        let f = frag("WHITECHAPEL HORROR", 10.0);
        let score = c.score(&f, &body(3));
        assert!(score.signals.short);
        assert!(score.signals.headline_case);
        assert!(!score.signals.tall);
        assert_eq!(score.score, 2.0);
        assert!(c.is_headline(&f, &body(3)));
    }

    #[test]
    fn test_body_line_is_not_headline() {
        let c = HeadlineClassifier::default();
        let lines = body(5);
        let score = c.score_at(&lines, 2);
        assert_eq!(score.score, 1.0);
        assert!(!c.is_headline_at(&lines, 2));
    }

    #[test]
    fn test_tall_signal() {
        let c = HeadlineClassifier::default();
        let mut frags = body(4);
        frags.insert(2, frag("a very long line of ordinary text that goes on and on and on and on and keeps going beyond the cutoff", 20.0));
        let score = c.score_at(&frags, 2);
        assert!(score.signals.tall);
        assert!(!score.signals.short);
        assert_eq!(score.score, 1.0);
    }

    #[test]
    fn test_keyword_signal() {
        let c = HeadlineClassifier::default();
        let f = frag("the inquest was adjourned until monday", 10.0);
        let score = c.score(&f, &[]);
        assert!(score.signals.section_keyword);
        assert!(score.signals.short);
        assert!(c.is_headline(&f, &[]));
    }

    #[test]
    fn test_empty_neighbourhood_never_tall() {
        let c = HeadlineClassifier::default();
        assert!(!c.score(&frag("x", 50.0), &[]).signals.tall);
    }

    #[test]
    fn test_blank_text_scores_zero() {
        let c = HeadlineClassifier::default();
        assert_eq!(c.score(&frag("   ", 40.0), &body(3)).score, 0.0);
    }

    #[test]
    fn test_zero_height_neighbourhood() {
        let c = HeadlineClassifier::default();
        let frags = vec![frag("zero", 0.0), frag("zero", 0.0)];
        let score = c.score_at(&frags, 0);
        assert!(!score.signals.tall);
        assert!(score.score.is_finite());
    }

    #[test]
    fn test_neighbourhood_window() {
        let c = HeadlineClassifier::default();
        let frags = body(10);
        assert_eq!(c.neighbourhood(&frags, 0).len(), 3);
        assert_eq!(c.neighbourhood(&frags, 5).len(), 5);
        assert_eq!(c.neighbourhood(&frags, 9).len(), 3);
    }

    #[test]
    fn test_custom_weights_and_keywords() {
        let config = HeadlineConfig {
            lexical_weight: 2.0,
            keywords: vec!["Fenian".into()],
            ..HeadlineConfig::default()
        };
        let c = HeadlineClassifier::new(config);
        let f = frag("rumours of a fenian rising reached the city late in the evening, causing alarm", 10.0);
        let score = c.score(&f, &[]);
        assert!(score.signals.section_keyword);
        assert_eq!(score.score, 3.0);
    }
}
