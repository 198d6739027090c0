//! Geometric primitives in page-pixel space.
//!
//! All coordinates are pixels of the full rasterized page, origin at the
//! top-left corner, y growing downwards.

use serde::{Deserialize, Serialize};

/// A position on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Pixels from the left edge
    pub x: f32,
    /// Pixels from the top edge
    pub y: f32,
}

impl Point {
    /// Point at `(x, y)`.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned box of an OCR fragment, snippet or article.
///
/// Stored as origin plus extent, which is the layout every OCR export uses.
///
/// ```
/// use broadsheet::geometry::Rect;
///
/// let headline = Rect::new(120.0, 340.0, 410.0, 38.0);
/// assert_eq!(headline.right(), 530.0);
/// assert_eq!(headline.bottom(), 378.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Horizontal extent
    pub width: f32,
    /// Vertical extent
    pub height: f32,
}

impl Rect {
    /// Box with top-left corner `(x, y)` and the given extent.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Box spanning the corners `(x0, y0)` and `(x1, y1)`.
    ///
    /// ```
    /// use broadsheet::geometry::Rect;
    ///
    /// let column = Rect::from_points(600.0, 0.0, 900.0, 1200.0);
    /// assert_eq!(column, Rect::new(600.0, 0.0, 300.0, 1200.0));
    /// ```
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Left edge.
    pub fn left(&self) -> f32 {
        self.x
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Top edge.
    pub fn top(&self) -> f32 {
        self.y
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Midpoint of the box.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True when every component is a finite number and the extent is not negative.
    pub fn is_well_formed(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width >= 0.0
            && self.height >= 0.0
    }

    /// True when the two boxes share a non-empty x range. Boxes that only
    /// touch at an edge, like adjacent words on a line, do not overlap.
    pub fn overlaps_horizontally(&self, other: &Rect) -> bool {
        self.left() < other.right() && other.left() < self.right()
    }

    /// True when `other` lies entirely inside this box. Shared edges count
    /// as inside, so an article envelope contains its own members.
    ///
    /// ```
    /// use broadsheet::geometry::Rect;
    ///
    /// let article = Rect::new(20.0, 100.0, 460.0, 300.0);
    /// assert!(article.contains(&Rect::new(20.0, 388.0, 460.0, 12.0)));
    /// assert!(!article.contains(&Rect::new(20.0, 395.0, 460.0, 12.0)));
    /// ```
    pub fn contains(&self, other: &Rect) -> bool {
        other.left() >= self.left()
            && other.right() <= self.right()
            && other.top() >= self.top()
            && other.bottom() <= self.bottom()
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_points(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Union envelope of a sequence of rectangles, `None` when it is empty.
    pub fn union_all<'a, I>(rects: I) -> Option<Rect>
    where
        I: IntoIterator<Item = &'a Rect>,
    {
        rects
            .into_iter()
            .fold(None, |acc: Option<Rect>, r| Some(acc.map_or(*r, |a| a.union(r))))
    }

    /// Shift the rectangle by an offset.
    ///
    /// Used to move boxes detected inside a cropped column strip back into
    /// full-page coordinates.
    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}
