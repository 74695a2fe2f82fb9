use std::time::Duration;

use recycler::{Align, Coordinator, DataSource, FrameReport, HostView, Result, RowKey, Size};

use crate::{ScrollAnchor, anchor_offset, apply_anchor, capture_first_visible_anchor};

/// A framework-neutral controller that wraps a [`Coordinator`] and provides common adapter
/// workflows (event coalescing, anchoring while rows resize, scroll-to-index).
///
/// This type does not hold any UI objects. Adapters drive it by calling:
/// - `on_viewport_size` / `on_scroll` when UI events occur
/// - `tick(host)` each frame, which applies the latest scroll event and any finished
///   measurements
///
/// When `tick` returns an offset, the controller moved the list itself (to keep the first
/// visible row in place); set the real scroll position to it.
#[derive(Debug)]
pub struct Controller<S: DataSource, U> {
    c: Coordinator<S, U>,
    bounds: Size,
    pending_scroll: Option<u64>,
    keep_first_visible: bool,
    last_report: FrameReport,
}

impl<S: DataSource, U> Controller<S, U> {
    pub fn new(c: Coordinator<S, U>) -> Self {
        Self {
            bounds: c.bounds(),
            c,
            pending_scroll: None,
            keep_first_visible: true,
            last_report: FrameReport::default(),
        }
    }

    pub fn coordinator(&self) -> &Coordinator<S, U> {
        &self.c
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator<S, U> {
        &mut self.c
    }

    pub fn into_coordinator(self) -> Coordinator<S, U> {
        self.c
    }

    /// Whether `tick` compensates for rows above the viewport changing height.
    ///
    /// Enabled by default.
    pub fn set_keep_first_visible(&mut self, enabled: bool) {
        self.keep_first_visible = enabled;
    }

    /// Report of the last batch issued by `tick`.
    pub fn last_report(&self) -> &FrameReport {
        &self.last_report
    }

    pub fn on_viewport_size(&mut self, bounds: Size) {
        self.bounds = bounds;
        if self.pending_scroll.is_none() {
            self.pending_scroll = Some(self.c.scroll_offset());
        }
    }

    /// Call this when the UI reports a scroll offset change (e.g. user wheel/drag).
    ///
    /// Only the latest offset reported before the next `tick` is applied.
    pub fn on_scroll(&mut self, scroll_offset: u64) {
        self.pending_scroll = Some(scroll_offset);
    }

    /// Advances the controller without waiting for measurements.
    pub fn tick<H: HostView<U, S::Content>>(&mut self, host: &mut H) -> Result<Option<u64>> {
        self.tick_inner(host, None)
    }

    /// Like [`Self::tick`], but waits up to `timeout` for a measurement in flight.
    pub fn tick_timeout<H: HostView<U, S::Content>>(
        &mut self,
        host: &mut H,
        timeout: Duration,
    ) -> Result<Option<u64>> {
        self.tick_inner(host, Some(timeout))
    }

    fn tick_inner<H: HostView<U, S::Content>>(
        &mut self,
        host: &mut H,
        timeout: Option<Duration>,
    ) -> Result<Option<u64>> {
        if let Some(offset) = self.pending_scroll.take() {
            self.last_report = self.c.update(offset, self.bounds, host)?;
        }

        let anchor = self
            .keep_first_visible
            .then(|| self.first_visible())
            .flatten();
        let report = match timeout {
            Some(timeout) => self.c.pump_timeout(host, timeout)?,
            None => self.c.pump(host)?,
        };
        if report.is_empty() {
            return Ok(None);
        }
        self.last_report = report;

        let Some((index, anchor)) = anchor else {
            return Ok(None);
        };
        let key = anchor.key;
        let lookup = |k: RowKey| (k == key).then_some(index);
        let Some(target) = anchor_offset(&self.c, &anchor, lookup) else {
            return Ok(None);
        };
        if target == self.c.scroll_offset() {
            return Ok(None);
        }
        atrace!(index, from = self.c.scroll_offset(), to = target, "Controller: keep first visible");
        self.last_report = self.c.update(target, self.bounds, host)?;
        Ok(Some(self.c.scroll_offset()))
    }

    fn first_visible(&self) -> Option<(usize, ScrollAnchor)> {
        let anchor = capture_first_visible_anchor(&self.c)?;
        Some((self.c.visible_range().start_index, anchor))
    }

    /// Scrolls so that `index` is shown with the given alignment.
    ///
    /// Returns the applied (clamped) offset.
    pub fn scroll_to_index<H: HostView<U, S::Content>>(
        &mut self,
        index: usize,
        align: Align,
        host: &mut H,
    ) -> Result<u64> {
        let offset = self.c.scroll_offset_for_index(index, align)?;
        self.scroll_to_offset(offset, host)
    }

    /// Applies a scroll-to-offset immediately.
    ///
    /// Returns the applied (clamped) offset.
    pub fn scroll_to_offset<H: HostView<U, S::Content>>(
        &mut self,
        offset: u64,
        host: &mut H,
    ) -> Result<u64> {
        self.pending_scroll = None;
        let offset = self.c.clamp_scroll_offset(offset);
        self.last_report = self.c.update(offset, self.bounds, host)?;
        Ok(offset)
    }

    pub fn capture_first_visible_anchor(&self) -> Option<ScrollAnchor> {
        capture_first_visible_anchor(&self.c)
    }

    /// Applies a previously captured anchor by adjusting the scroll offset.
    ///
    /// Returns `true` when the anchor row was found.
    pub fn apply_anchor<H: HostView<U, S::Content>>(
        &mut self,
        anchor: &ScrollAnchor,
        key_to_index: impl FnMut(RowKey) -> Option<usize>,
        host: &mut H,
    ) -> Result<bool> {
        self.pending_scroll = None;
        match apply_anchor(&mut self.c, anchor, key_to_index, host)? {
            Some(report) => {
                self.last_report = report;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Changes the data and reloads while keeping the first visible row in place.
    ///
    /// Use for inserts and removals; `key_to_index` maps keys of the *new* dataset.
    pub fn reload_anchored<H: HostView<U, S::Content>>(
        &mut self,
        change: impl FnOnce(&mut S),
        key_to_index: impl FnMut(RowKey) -> Option<usize>,
        host: &mut H,
    ) -> Result<bool> {
        let anchor = self.capture_first_visible_anchor();
        change(self.c.source_mut());
        self.last_report = self.c.reload(host)?;
        match anchor {
            Some(anchor) => self.apply_anchor(&anchor, key_to_index, host),
            None => Ok(false),
        }
    }
}
