//! Rectangles in the coordinate space of a render tree's root.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Axis-aligned rectangle in root coordinates.
///
/// Edges are half-open: an output spans `left..right` horizontally and
/// `top..bottom` vertically. Zero-width or zero-height rectangles are legal
/// output bounds (see [`Rect::intersects_visible`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge (inclusive).
    pub left: i32,
    /// Top edge (inclusive).
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl Rect {
    /// Create a rectangle from its four edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rectangle from an origin and a size. Edges saturate at the
    /// `i32` range.
    pub const fn from_xywh(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x.saturating_add(width), y.saturating_add(height))
    }

    /// Horizontal extent, saturating at the `i32` range.
    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    /// Vertical extent, saturating at the `i32` range.
    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    /// A rectangle is empty when it covers no area on at least one axis.
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// `top < visible.bottom && bottom > visible.top`.
    pub fn overlaps_vertically(&self, visible: &Rect) -> bool {
        self.top < visible.bottom && self.bottom > visible.top
    }

    /// `left < visible.right && right > visible.left`.
    pub fn overlaps_horizontally(&self, visible: &Rect) -> bool {
        self.left < visible.right && self.right > visible.left
    }

    /// Visibility rule used by incremental mount.
    ///
    /// An output is visible when it overlaps `visible` on both axes. Because
    /// the comparisons are strict, a zero-height output at `y` is visible
    /// only if `visible.top < y < visible.bottom`, and an empty visible
    /// rectangle makes every output invisible.
    ///
    /// # Examples
    ///
    /// ```
    /// # use incmount::model::Rect;
    /// let item = Rect::new(0, 10, 10, 20);
    /// assert!(item.intersects_visible(&Rect::new(0, 10, 10, 20)));
    /// assert!(!item.intersects_visible(&Rect::new(0, 0, 10, 10)));
    /// assert!(!item.intersects_visible(&Rect::new(0, 15, 10, 15)));
    /// ```
    pub fn intersects_visible(&self, visible: &Rect) -> bool {
        !visible.is_empty() && self.overlaps_vertically(visible) && self.overlaps_horizontally(visible)
    }

    /// True if `other` lies entirely inside this rectangle.
    pub fn contains(&self, other: &Rect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    /// Translate by `(dx, dy)`, saturating at the `i32` range.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.left.saturating_add(dx),
            self.top.saturating_add(dy),
            self.right.saturating_add(dx),
            self.bottom.saturating_add(dy),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}
