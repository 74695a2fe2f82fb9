use core::cmp;

use crate::fenwick::Fenwick;
use crate::{Align, Size, VisibleRange};

/// Maps a scroll position onto the rows that need a visual unit.
///
/// Row heights live in a prefix-sum index, so rows that were placed with a fallback height
/// can be re-indexed in `O(log n)` when their measurement resolves.
///
/// Offsets are in content coordinates along the scroll axis. In inverted mode row 0 sits at
/// the bottom edge and the scroll offset is measured from the bottom; the range math is the
/// same, only [`Self::row_offset`] is mirrored.
#[derive(Clone, Debug)]
pub struct ViewportTracker {
    heights: Fenwick,
    margin: usize,
    inverted: bool,
    scroll_offset: u64,
    bounds: Size,
    range: VisibleRange,
}

impl ViewportTracker {
    pub fn new(count: usize, estimated_height: u32, margin: usize) -> Self {
        Self::from_heights(vec![estimated_height; count], margin)
    }

    pub fn from_heights(heights: Vec<u32>, margin: usize) -> Self {
        let count = heights.len();
        Self {
            heights: Fenwick::from_values(heights),
            margin,
            inverted: false,
            scroll_offset: 0,
            bounds: Size::ZERO,
            range: VisibleRange::empty(count, margin),
        }
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    pub fn set_margin(&mut self, margin: usize) {
        self.margin = margin;
    }

    /// Replaces every row height (e.g. after the row count changed).
    ///
    /// The stored range is kept until the next [`Self::update`]/[`Self::refresh`].
    pub fn reset(&mut self, heights: Vec<u32>) {
        self.heights = Fenwick::from_values(heights);
    }

    pub fn count(&self) -> usize {
        self.heights.len()
    }

    pub fn scroll_offset(&self) -> u64 {
        self.scroll_offset
    }

    pub fn bounds(&self) -> Size {
        self.bounds
    }

    /// The range computed by the last `update`/`refresh`.
    pub fn range(&self) -> VisibleRange {
        self.range
    }

    pub fn content_height(&self) -> u64 {
        self.heights.total()
    }

    pub fn max_scroll_offset(&self) -> u64 {
        self.max_scroll_offset_for(self.bounds.height)
    }

    fn max_scroll_offset_for(&self, viewport: u32) -> u64 {
        self.content_height().saturating_sub(viewport as u64)
    }

    pub fn clamp_scroll_offset(&self, offset: u64) -> u64 {
        offset.min(self.max_scroll_offset())
    }

    /// Stores the scroll position (clamped) and returns the recomputed range.
    pub fn update(&mut self, scroll_offset: u64, bounds: Size) -> VisibleRange {
        self.bounds = bounds;
        self.scroll_offset = self.clamp_scroll_offset(scroll_offset);
        self.refresh()
    }

    /// Recomputes the range for the stored scroll position (after heights changed).
    pub fn refresh(&mut self) -> VisibleRange {
        self.range = self.compute(self.scroll_offset, self.bounds);
        self.range
    }

    /// Stores a position together with a range computed for it earlier.
    ///
    /// The offset is clamped against the current heights, the same way `compute` clamps it.
    pub(crate) fn commit(&mut self, scroll_offset: u64, bounds: Size, range: VisibleRange) {
        self.bounds = bounds;
        self.scroll_offset = self.clamp_scroll_offset(scroll_offset);
        self.range = range;
    }

    /// The range for a scroll position, without storing anything.
    pub fn compute(&self, scroll_offset: u64, bounds: Size) -> VisibleRange {
        let count = self.count();
        let view = bounds.height as u64;
        if count == 0 || view == 0 {
            return VisibleRange::empty(count, self.margin);
        }

        let total = self.content_height();
        let start_offset = scroll_offset.min(self.max_scroll_offset_for(bounds.height));
        if start_offset >= total {
            return VisibleRange::empty(count, self.margin);
        }
        let end_inclusive = start_offset.saturating_add(view).saturating_sub(1);

        let start = self.heights.lower_bound(start_offset).min(count - 1);
        let end = self
            .heights
            .lower_bound(cmp::max(end_inclusive, start_offset))
            .saturating_add(1)
            .min(count);

        VisibleRange {
            start_index: start,
            end_index: cmp::max(end, start + 1),
            margin: self.margin,
            count,
        }
    }

    pub fn row_height(&self, index: usize) -> Option<u32> {
        self.heights.get(index)
    }

    /// Sets the height of one row. Returns `true` if it changed.
    pub fn set_row_height(&mut self, index: usize, height: u32) -> bool {
        self.heights.set(index, height) != 0
    }

    /// Distance of the row's leading edge from the start of the list.
    pub fn row_start_in_list(&self, index: usize) -> Option<u64> {
        (index < self.count()).then(|| self.heights.prefix_sum(index))
    }

    /// Top edge of the row in content coordinates (what the host positions the unit at).
    pub fn row_offset(&self, index: usize) -> Option<u64> {
        let start = self.row_start_in_list(index)?;
        if !self.inverted {
            return Some(start);
        }
        let height = self.heights.get(index)? as u64;
        let extent = cmp::max(self.content_height(), self.bounds.height as u64);
        Some(extent.saturating_sub(start.saturating_add(height)))
    }

    /// Row under a content-coordinate `y` (hit-testing for taps/selection).
    pub fn index_at_offset(&self, y: u64) -> Option<usize> {
        let count = self.count();
        if count == 0 {
            return None;
        }
        let total = self.content_height();
        let in_list = if self.inverted {
            let extent = cmp::max(total, self.bounds.height as u64);
            let from_bottom = extent.checked_sub(y.saturating_add(1))?;
            if from_bottom >= total {
                return None;
            }
            from_bottom
        } else {
            if y >= total {
                return None;
            }
            y
        };
        Some(self.heights.lower_bound(in_list).min(count - 1))
    }

    /// Scroll offset that brings `index` into view with the given alignment (clamped).
    pub fn scroll_offset_for(&self, index: usize, align: Align) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }
        let index = index.min(count - 1);
        let start = self.heights.prefix_sum(index);
        let end = self.heights.prefix_sum(index + 1);
        let view = self.bounds.height as u64;

        let target = match align {
            Align::Start => start,
            Align::End => end.saturating_sub(view),
            Align::Center => {
                let center = start.saturating_add((end - start) / 2);
                center.saturating_sub(view / 2)
            }
            Align::Auto => {
                let cur = self.scroll_offset;
                let cur_end = cur.saturating_add(view);
                if start >= cur && end <= cur_end {
                    cur
                } else if start < cur {
                    start
                } else {
                    end.saturating_sub(view)
                }
            }
        };
        self.clamp_scroll_offset(target)
    }
}
