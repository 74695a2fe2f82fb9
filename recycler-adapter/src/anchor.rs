use recycler::{Coordinator, DataSource, FrameReport, HostView, Result, RowKey};

/// A scroll anchor that can be used to preserve visual position across data changes.
///
/// Typical use cases:
/// - chat/timeline "prepend" (load older messages above) without content jumping
/// - rows above the viewport growing once their measurement lands
///
/// Anchors hold a [`RowKey`], so they only survive a reorder when the data source returns
/// stable keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScrollAnchor {
    pub key: RowKey,
    /// The distance from the anchor row's start to the viewport's scroll offset.
    pub offset_in_viewport: u64,
}

/// Captures an anchor for the first visible row (by key).
///
/// Returns `None` if the visible range is empty.
pub fn capture_first_visible_anchor<S: DataSource, U>(
    c: &Coordinator<S, U>,
) -> Option<ScrollAnchor> {
    let visible = c.visible_range();
    if visible.is_empty() {
        return None;
    }
    let index = visible.start_index;
    let start = c.tracker().row_start_in_list(index)?;
    Some(ScrollAnchor {
        key: c.source().key(index),
        offset_in_viewport: c.scroll_offset().saturating_sub(start),
    })
}

/// The clamped scroll offset that puts the anchor row back where it was captured.
pub fn anchor_offset<S: DataSource, U>(
    c: &Coordinator<S, U>,
    anchor: &ScrollAnchor,
    mut key_to_index: impl FnMut(RowKey) -> Option<usize>,
) -> Option<u64> {
    let index = key_to_index(anchor.key)?;
    let start = c.tracker().row_start_in_list(index)?;
    Some(c.clamp_scroll_offset(start.saturating_add(anchor.offset_in_viewport)))
}

/// Applies a previously captured anchor by scrolling the coordinator.
///
/// The adapter must provide a `key_to_index` mapping for the *current* dataset.
///
/// Returns `Ok(None)` when the anchor row is gone, otherwise the report of the scroll batch.
pub fn apply_anchor<S, U, H>(
    c: &mut Coordinator<S, U>,
    anchor: &ScrollAnchor,
    key_to_index: impl FnMut(RowKey) -> Option<usize>,
    host: &mut H,
) -> Result<Option<FrameReport>>
where
    S: DataSource,
    H: HostView<U, S::Content>,
{
    let Some(target) = anchor_offset(c, anchor, key_to_index) else {
        return Ok(None);
    };
    let bounds = c.bounds();
    c.update(target, bounds, host).map(Some)
}
