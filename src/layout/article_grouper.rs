//! Article grouping over a reading-ordered fragment stream.
//!
//! The grouper is a two-state machine. With no article open, the next
//! fragment always opens one. With an article open, each fragment either
//! starts a new article or is appended to the current one. A new article
//! starts, in priority order, when:
//!
//! 1. the fragment classifies as a headline,
//! 2. the fragment's column differs from the previous fragment's column,
//! 3. the vertical gap to the previous fragment exceeds the gap multiple of
//!    their average height.
//!
//! Articles are contiguous runs of the input, so groups are expressed as
//! index ranges and never copy fragments.

use crate::config::GroupingConfig;
use crate::layout::fragment::TextFragment;
use crate::layout::headline::HeadlineClassifier;
use crate::layout::rule_detector::gap_exceeds;
use std::collections::BTreeSet;
use std::ops::Range;

/// Why an article was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakReason {
    /// First fragment of the stream
    StreamStart,
    /// The fragment classified as a headline
    Headline,
    /// The fragment is in a different column from its predecessor
    ColumnChange,
    /// The whitespace gap above the fragment is too large
    VerticalGap,
    /// A caller-supplied break position
    Forced,
}

/// One article as a contiguous run of the fragment stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleGroup {
    /// Indices of the member fragments
    pub range: Range<usize>,
    /// Index of the headline fragment, if any member qualified
    pub headline: Option<usize>,
    /// Reason the article was opened
    pub opened_by: BreakReason,
}

impl ArticleGroup {
    /// Index of the first member.
    pub fn start(&self) -> usize {
        self.range.start
    }

    /// Number of member fragments.
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Always false for groups produced by the grouper.
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Member fragments of this group.
    pub fn members<'a>(&self, fragments: &'a [TextFragment]) -> &'a [TextFragment] {
        &fragments[self.range.clone()]
    }
}

/// The article currently being accumulated.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenArticle {
    start: usize,
    headline: Option<usize>,
    opened_by: BreakReason,
}

impl OpenArticle {
    fn close(self, end: usize) -> ArticleGroup {
        ArticleGroup {
            range: self.start..end,
            headline: self.headline,
            opened_by: self.opened_by,
        }
    }
}

/// Grouper state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum GrouperState {
    #[default]
    NoArticleOpen,
    ArticleOpen(OpenArticle),
}

/// Partitions a reading-ordered fragment stream into articles.
#[derive(Debug, Clone, Default)]
pub struct ArticleGrouper {
    classifier: HeadlineClassifier,
    config: GroupingConfig,
}

impl ArticleGrouper {
    /// Create a grouper.
    pub fn new(classifier: HeadlineClassifier, config: GroupingConfig) -> Self {
        Self { classifier, config }
    }

    /// Headline classifier in use.
    pub fn classifier(&self) -> &HeadlineClassifier {
        &self.classifier
    }

    /// Group a stream that is already in `(column, y, x)` order.
    ///
    /// Every fragment belongs to exactly one group, groups are non-empty and
    /// their concatenation reproduces the input order.
    pub fn group(&self, fragments: &[TextFragment]) -> Vec<ArticleGroup> {
        self.group_with_forced_breaks(fragments, &[])
    }

    /// Group a stream, additionally starting an article at every index in
    /// `forced`.
    pub fn group_with_forced_breaks(
        &self,
        fragments: &[TextFragment],
        forced: &[usize],
    ) -> Vec<ArticleGroup> {
        let forced: BTreeSet<usize> = forced.iter().copied().collect();
        let mut groups = Vec::new();
        let mut state = GrouperState::NoArticleOpen;

        for i in 0..fragments.len() {
            let is_headline = self.classifier.is_headline_at(fragments, i);
            state = match state {
                GrouperState::NoArticleOpen => {
                    GrouperState::ArticleOpen(self.open(i, is_headline, BreakReason::StreamStart))
                },
                GrouperState::ArticleOpen(mut open) => {
                    match self.break_reason(fragments, i, is_headline, &forced) {
                        Some(reason) => {
                            log::trace!("article break before fragment {}: {:?}", i, reason);
                            groups.push(open.close(i));
                            GrouperState::ArticleOpen(self.open(i, is_headline, reason))
                        },
                        None => {
                            if open.headline.is_none()
                                && self.classifier.is_headline(&fragments[i], &fragments[open.start..=i])
                            {
                                open.headline = Some(i);
                            }
                            GrouperState::ArticleOpen(open)
                        },
                    }
                },
            };
        }

        if let GrouperState::ArticleOpen(open) = state {
            groups.push(open.close(fragments.len()));
        }

        log::debug!("grouped {} fragments into {} articles", fragments.len(), groups.len());
        groups
    }

    /// Re-run grouping with every existing article start forced as a break.
    ///
    /// Grouping a stream a second time this way yields the same partition.
    pub fn regroup_with_forced_breaks(
        &self,
        fragments: &[TextFragment],
        groups: &[ArticleGroup],
    ) -> Vec<ArticleGroup> {
        let starts: Vec<usize> = groups.iter().map(|g| g.start()).collect();
        self.group_with_forced_breaks(fragments, &starts)
    }

    fn open(&self, index: usize, is_headline: bool, reason: BreakReason) -> OpenArticle {
        OpenArticle {
            start: index,
            headline: is_headline.then_some(index),
            opened_by: reason,
        }
    }

    fn break_reason(
        &self,
        fragments: &[TextFragment],
        i: usize,
        is_headline: bool,
        forced: &BTreeSet<usize>,
    ) -> Option<BreakReason> {
        let prev = &fragments[i - 1];
        let cur = &fragments[i];
        if is_headline {
            Some(BreakReason::Headline)
        } else if cur.column != prev.column {
            Some(BreakReason::ColumnChange)
        } else if gap_exceeds(
            &prev.bbox,
            &cur.bbox,
            self.config.gap_multiplier,
            self.config.min_height_floor,
        ) {
            Some(BreakReason::VerticalGap)
        } else if forced.contains(&i) {
            Some(BreakReason::Forced)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeadlineConfig;
    use crate::geometry::Rect;
    use crate::layout::fragment::sort_reading_order;
    use proptest::prelude::*;

    const BODY: &str = "the proceedings were resumed at the vestry hall before a large attendance of ratepayers";

    fn frag(text: &str, column: usize, y: f32, height: f32) -> TextFragment {
        TextFragment::new(text, Rect::new(100.0, y, 300.0, height), column, 1, "doc")
    }

    fn body(column: usize, y: f32) -> TextFragment {
        frag(BODY, column, y, 10.0)
    }

    #[test]
    fn test_empty_stream() {
        assert!(ArticleGrouper::default().group(&[]).is_empty());
    }

    #[test]
    fn test_single_fragment() {
        let frags = vec![body(0, 0.0)];
        let groups = ArticleGrouper::default().group(&frags);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].range, 0..1);
        assert_eq!(groups[0].opened_by, BreakReason::StreamStart);
        assert_eq!(groups[0].headline, None);
    }

    #[test]
    fn test_gap_breaks_article() {
        // Five lines, then a large gap, then five more.
        let mut frags: Vec<_> = (0..5).map(|i| body(0, i as f32 * 12.0)).collect();
        frags.extend((0..5).map(|i| body(0, 300.0 + i as f32 * 12.0)));
        let groups = ArticleGrouper::default().group(&frags);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].range, 0..5);
        assert_eq!(groups[1].range, 5..10);
        assert_eq!(groups[1].opened_by, BreakReason::VerticalGap);
    }

    #[test]
    fn test_column_change_breaks_article() {
        let frags = vec![body(0, 0.0), body(0, 12.0), body(1, 0.0), body(1, 12.0)];
        let groups = ArticleGrouper::default().group(&frags);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].range, 2..4);
        assert_eq!(groups[1].opened_by, BreakReason::ColumnChange);
    }

    #[test]
    fn test_headline_opens_article() {
        let frags = vec![
            frag("WHITECHAPEL HORROR", 0, 0.0, 10.0),
            body(0, 12.0),
            body(0, 24.0),
            body(0, 36.0),
        ];
        let groups = ArticleGrouper::default().group(&frags);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].headline, Some(0));
        assert_eq!(groups[0].len(), 4);
    }

    #[test]
    fn test_headline_mid_run_forces_break() {
        let frags = vec![
            body(0, 0.0),
            body(0, 12.0),
            frag("LATEST INTELLIGENCE", 0, 24.0, 10.0),
            body(0, 36.0),
        ];
        let groups = ArticleGrouper::default().group(&frags);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].range, 2..4);
        assert_eq!(groups[1].headline, Some(2));
        assert_eq!(groups[1].opened_by, BreakReason::Headline);
    }

    #[test]
    fn test_headline_wins_over_column_change() {
        let frags = vec![body(0, 0.0), frag("THE FENIAN PLOT", 1, 0.0, 10.0)];
        let groups = ArticleGrouper::default().group(&frags);
        assert_eq!(groups[1].opened_by, BreakReason::Headline);
    }

    #[test]
    fn test_headline_backfilled_on_append() {
        // With threshold 3 the height signal is needed. Inside its window the
        // line at index 1 is not tall, but against the open article it is.
        let config = HeadlineConfig {
            threshold: 3.0,
            ..HeadlineConfig::default()
        };
        let grouper = ArticleGrouper::new(HeadlineClassifier::new(config), GroupingConfig::default());
        let frags = vec![
            body(0, 0.0),
            frag("SHOCKING AFFAIR", 0, 11.0, 20.0),
            frag("SHOCKING AFFAIR", 0, 32.0, 20.0),
            frag("SHOCKING AFFAIR", 0, 53.0, 20.0),
        ];
        let classifier = grouper.classifier();
        assert!(!classifier.is_headline_at(&frags, 1));
        assert!(classifier.is_headline(&frags[1], &frags[0..=1]));

        let groups = grouper.group(&frags);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].headline, Some(1));
    }

    #[test]
    fn test_zero_height_fragments_do_not_panic() {
        let frags = vec![frag(BODY, 0, 10.0, 0.0), frag(BODY, 0, 10.5, 0.0), frag(BODY, 0, 80.0, 0.0)];
        let groups = ArticleGrouper::default().group(&frags);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].opened_by, BreakReason::VerticalGap);
    }

    #[test]
    fn test_forced_breaks() {
        let frags: Vec<_> = (0..6).map(|i| body(0, i as f32 * 12.0)).collect();
        let grouper = ArticleGrouper::default();
        let groups = grouper.group_with_forced_breaks(&frags, &[3, 99]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].range, 3..6);
        assert_eq!(groups[1].opened_by, BreakReason::Forced);
    }

    fn arb_fragment() -> impl Strategy<Value = TextFragment> {
        let texts = prop_oneof![
            Just(BODY.to_string()),
            Just("POLICE INTELLIGENCE".to_string()),
            Just("Market Report".to_string()),
            Just("".to_string()),
        ];
        (texts, 0usize..3, 0.0f32..2000.0, 0.0f32..60.0)
            .prop_map(|(text, column, y, height)| frag(&text, column, y, height))
    }

    proptest! {
        #[test]
        fn prop_groups_partition_stream(mut frags in prop::collection::vec(arb_fragment(), 0..60)) {
            sort_reading_order(&mut frags);
            let groups = ArticleGrouper::default().group(&frags);

            let mut next = 0;
            for g in &groups {
                prop_assert!(!g.is_empty());
                prop_assert_eq!(g.range.start, next);
                next = g.range.end;
                if let Some(h) = g.headline {
                    prop_assert!(g.range.contains(&h));
                }
                let column = frags[g.start()].column;
                prop_assert!(g.members(&frags).iter().all(|f| f.column == column));
            }
            prop_assert_eq!(next, frags.len());
        }

        #[test]
        fn prop_regroup_is_idempotent(mut frags in prop::collection::vec(arb_fragment(), 0..60)) {
            sort_reading_order(&mut frags);
            let grouper = ArticleGrouper::default();
            let groups = grouper.group(&frags);
            let again = grouper.regroup_with_forced_breaks(&frags, &groups);
            let ranges: Vec<_> = groups.iter().map(|g| g.range.clone()).collect();
            let again_ranges: Vec<_> = again.iter().map(|g| g.range.clone()).collect();
            prop_assert_eq!(ranges, again_ranges);
        }
    }
}
