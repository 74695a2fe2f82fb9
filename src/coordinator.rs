use std::collections::{BTreeMap, HashSet};
use std::mem;
use std::time::Duration;

use crate::measure::{Executor, MeasureEngine, MeasureStats, Measurer, Resolved};
use crate::pool::{PoolStats, ReusePool};
use crate::registry::CellRegistry;
use crate::source::{DataSource, Row, SourceAdapter};
use crate::tracker::ViewportTracker;
use crate::{
    Align, Constraint, HostView, MeasurementFailed, RecyclerError, RecyclerOptions, Result,
    RowKey, RowPhase, Size, VisibleRange, VisualUnit,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placement {
    Fallback,
    Final,
}

#[derive(Debug)]
struct Attached<U> {
    unit: VisualUnit<U>,
    key: RowKey,
    size: Size,
    at: u64,
    placement: Placement,
}

/// Rows a batch detaches and attaches, all validated.
struct Plan<C> {
    range: VisibleRange,
    leaving: Vec<usize>,
    entering: Vec<Row<C>>,
}

/// What a single coordinator batch did to the host view tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Range the attached set matches after the batch.
    pub range: VisibleRange,
    /// Rows attached, in the order `attach` was called.
    pub attached: Vec<usize>,
    /// Rows detached, in the order `detach` was called.
    pub detached: Vec<usize>,
    /// Attached rows whose bounds changed in place.
    pub resized: Vec<usize>,
    pub repositioned: usize,
    /// Rows placed at the fallback size because their measurement failed: reported when the
    /// failure lands and again each time such a row is attached.
    pub failures: Vec<MeasurementFailed>,
}

impl FrameReport {
    /// `true` when the batch issued no host calls.
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
            && self.detached.is_empty()
            && self.resized.is_empty()
            && self.repositioned == 0
    }
}

/// Drives a virtualized list: keeps exactly the visible rows (plus overscan) attached to the
/// host, measuring rows off-thread and recycling their visual units.
///
/// The coordinator lives on the interactive thread. It is the only writer of the
/// measurement cache, the reuse pool and the attached set; background work reaches it
/// through [`Self::pump`].
///
/// Every batch settles the range and validates all the rows it will attach before issuing any
/// host call, so a [`RecyclerError`] leaves the host tree and the attached set untouched.
pub struct Coordinator<S: DataSource, U> {
    options: RecyclerOptions,
    source: SourceAdapter<S>,
    registry: CellRegistry<U>,
    pool: ReusePool<U>,
    engine: MeasureEngine<S::Content>,
    tracker: ViewportTracker,
    constraint: Constraint,
    attached: BTreeMap<usize, Attached<U>>,
    /// Completions held back by a rejected pump.
    deferred: Vec<Resolved>,
}

impl<S: DataSource, U> Coordinator<S, U> {
    pub fn new(
        source: S,
        registry: CellRegistry<U>,
        measurer: impl Measurer<S::Content> + 'static,
        executor: impl Executor + 'static,
        options: RecyclerOptions,
    ) -> Self {
        let source = SourceAdapter::new(source);
        let constraint = options.constraint_for(Size::ZERO);
        let fallback = constraint.clamp(options.fallback_size);
        let mut tracker = ViewportTracker::new(source.count(), fallback.height, options.overscan);
        tracker.set_inverted(options.inverted);
        rdebug!(
            count = source.count(),
            overscan = options.overscan,
            inverted = options.inverted,
            "Coordinator::new"
        );
        Self {
            options,
            source,
            registry,
            pool: ReusePool::new(),
            engine: MeasureEngine::new(measurer, executor),
            tracker,
            constraint,
            attached: BTreeMap::new(),
            deferred: Vec::new(),
        }
    }

    pub fn options(&self) -> &RecyclerOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        self.source.source()
    }

    /// Mutable access to the data. Call [`Self::invalidate`] for changed rows, or
    /// [`Self::reload`] when the row count changed.
    pub fn source_mut(&mut self) -> &mut S {
        self.source.source_mut()
    }

    pub fn registry(&self) -> &CellRegistry<U> {
        &self.registry
    }

    pub fn engine(&self) -> &MeasureEngine<S::Content> {
        &self.engine
    }

    pub fn tracker(&self) -> &ViewportTracker {
        &self.tracker
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn measure_stats(&self) -> MeasureStats {
        self.engine.stats()
    }

    pub fn free_units(&self) -> usize {
        self.pool.total_free()
    }

    /// Constraint rows are currently measured against.
    pub fn constraint(&self) -> Constraint {
        self.constraint
    }

    pub fn visible_range(&self) -> VisibleRange {
        self.tracker.range()
    }

    pub fn scroll_offset(&self) -> u64 {
        self.tracker.scroll_offset()
    }

    pub fn bounds(&self) -> Size {
        self.tracker.bounds()
    }

    pub fn content_height(&self) -> u64 {
        self.tracker.content_height()
    }

    pub fn clamp_scroll_offset(&self, offset: u64) -> u64 {
        self.tracker.clamp_scroll_offset(offset)
    }

    pub fn attached_len(&self) -> usize {
        self.attached.len()
    }

    /// Attached rows in ascending index order.
    pub fn attached_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.attached.keys().copied()
    }

    pub fn attached_unit(&self, index: usize) -> Option<&VisualUnit<U>> {
        self.attached.get(&index).map(|a| &a.unit)
    }

    /// Bounds last handed to the host for an attached row.
    pub fn attached_size(&self, index: usize) -> Option<Size> {
        self.attached.get(&index).map(|a| a.size)
    }

    /// Position last handed to the host for an attached row.
    pub fn attached_offset(&self, index: usize) -> Option<u64> {
        self.attached.get(&index).map(|a| a.at)
    }

    /// Looks up a row, with its cached measurement under the current constraint.
    pub fn row(&self, index: usize) -> Result<Row<S::Content>> {
        let mut row = self.source.row_at(index)?;
        row.measured = match self.engine.peek(row.key, self.constraint) {
            Some(Ok(size)) => Some(*size),
            _ => None,
        };
        Ok(row)
    }

    pub fn row_phase(&self, index: usize) -> Result<RowPhase> {
        let key = self.source.key(index)?;
        if let Some(attached) = self.attached.get(&index) {
            return Ok(match attached.placement {
                Placement::Fallback => RowPhase::PlacedFallback,
                Placement::Final => RowPhase::PlacedFinal,
            });
        }
        if self.engine.is_in_flight(key, self.constraint) {
            Ok(RowPhase::MeasuringAsync)
        } else if self.engine.peek(key, self.constraint).is_some() {
            Ok(RowPhase::Detached)
        } else {
            Ok(RowPhase::Unresolved)
        }
    }

    /// Row under a content-coordinate `y`.
    pub fn index_at_offset(&self, y: u64) -> Option<usize> {
        self.tracker.index_at_offset(y)
    }

    pub fn scroll_offset_for_index(&self, index: usize, align: Align) -> Result<u64> {
        self.source.check(index)?;
        Ok(self.tracker.scroll_offset_for(index, align))
    }

    /// Applies a scroll/resize event: attaches rows entering the range, detaches rows leaving
    /// it.
    pub fn update<H: HostView<U, S::Content>>(
        &mut self,
        scroll_offset: u64,
        bounds: Size,
        host: &mut H,
    ) -> Result<FrameReport> {
        let mut report = FrameReport::default();
        let constraint = self.options.constraint_for(bounds);
        self.batch(scroll_offset, bounds, constraint, &|_: usize| false, host, &mut report)?;
        rtrace!(
            scroll_offset,
            start = report.range.start_index,
            end = report.range.end_index,
            attached = report.attached.len(),
            detached = report.detached.len(),
            "Coordinator::update"
        );
        Ok(report)
    }

    /// Applies measurements that finished since the last call.
    ///
    /// Attached rows still at their fallback size are resized in place and the rows around
    /// them are repositioned. Results for rows that already left the range are only cached.
    /// If the rows pulled into view by a resize fail validation, nothing is applied and the
    /// results are retried by the next pump.
    pub fn pump<H: HostView<U, S::Content>>(&mut self, host: &mut H) -> Result<FrameReport> {
        let resolved = self.engine.drain();
        self.apply_resolved(resolved, host)
    }

    /// Like [`Self::pump`], but waits up to `timeout` for a measurement when one is in
    /// flight and none has finished yet.
    pub fn pump_timeout<H: HostView<U, S::Content>>(
        &mut self,
        host: &mut H,
        timeout: Duration,
    ) -> Result<FrameReport> {
        let resolved = self.engine.drain_timeout(timeout);
        self.apply_resolved(resolved, host)
    }

    /// Marks a row's content as changed.
    ///
    /// Its cached measurements are dropped. If it is attached, its unit is unbound and
    /// released, and the row is re-resolved in the same batch; otherwise it is re-measured
    /// the next time it becomes visible.
    pub fn invalidate<H: HostView<U, S::Content>>(
        &mut self,
        index: usize,
        host: &mut H,
    ) -> Result<FrameReport> {
        let key = self.source.key(index)?;
        rdebug!(index, key, "Coordinator::invalidate");
        self.engine.invalidate(key);
        self.deferred.retain(|r| r.key.row != key);

        let mut report = FrameReport::default();
        let (offset, bounds) = (self.tracker.scroll_offset(), self.tracker.bounds());
        let fresh = |i: usize| i == index;
        self.batch(offset, bounds, self.constraint(), &fresh, host, &mut report)?;
        Ok(report)
    }

    /// Re-reads the whole data source (e.g. after the row count changed).
    ///
    /// Every attached row is detached in index order, row heights are rebuilt from the
    /// measurement cache and the range is attached again.
    pub fn reload<H: HostView<U, S::Content>>(&mut self, host: &mut H) -> Result<FrameReport> {
        self.rebuild_heights();
        rdebug!(count = self.tracker.count(), "Coordinator::reload");
        let mut report = FrameReport::default();
        let (offset, bounds) = (self.tracker.scroll_offset(), self.tracker.bounds());
        self.batch(offset, bounds, self.constraint(), &|_: usize| true, host, &mut report)?;
        Ok(report)
    }

    /// Switches to a fixed constraint, or back to following the viewport width with `None`.
    pub fn set_constraint<H: HostView<U, S::Content>>(
        &mut self,
        constraint: Option<Constraint>,
        host: &mut H,
    ) -> Result<FrameReport> {
        let previous = self.options.constraint;
        self.options.constraint = constraint;
        let mut report = FrameReport::default();
        let (offset, bounds) = (self.tracker.scroll_offset(), self.tracker.bounds());
        let effective = self.options.constraint_for(bounds);
        let result = self.batch(offset, bounds, effective, &|_: usize| false, host, &mut report);
        if result.is_err() {
            self.options.constraint = previous;
        }
        result.map(|()| report)
    }

    fn fallback_size(&self) -> Size {
        self.constraint.clamp(self.options.fallback_size)
    }

    /// Cache hit → final size; miss → fallback size plus a scheduled measurement.
    ///
    /// A cached failure is placed at the fallback size and handed back for the report.
    fn resolve(
        &mut self,
        index: usize,
        key: RowKey,
        content: &S::Content,
    ) -> (Size, Placement, Option<MeasurementFailed>) {
        match self.engine.measure(key, self.constraint) {
            Some(Ok(size)) => (size, Placement::Final, None),
            Some(Err(error)) => {
                let failure = MeasurementFailed { index, key, error };
                (self.fallback_size(), Placement::Final, Some(failure))
            }
            None => {
                self.engine
                    .measure_async(key, content.clone(), self.constraint);
                (self.fallback_size(), Placement::Fallback, None)
            }
        }
    }

    /// Height a row will get when it is attached, without scheduling anything.
    fn planned_height(&self, key: RowKey) -> u32 {
        match self.engine.peek(key, self.constraint) {
            Some(Ok(size)) => size.height,
            _ => self.fallback_size().height,
        }
    }

    fn rebuild_heights(&mut self) {
        let estimate = self.fallback_size().height;
        let source = self.source.source();
        let heights: Vec<u32> = (0..source.count())
            .map(|index| match self.engine.peek(source.key(index), self.constraint) {
                Some(Ok(size)) => size.height,
                _ => estimate,
            })
            .collect();
        self.tracker.reset(heights);
    }

    fn restore_heights(&mut self, undo: Vec<(usize, u32)>) {
        for (index, height) in undo.into_iter().rev() {
            self.tracker.set_row_height(index, height);
        }
    }

    /// One batch: switches the constraint if needed, then reconciles the attached set with
    /// the range for `scroll_offset`/`bounds`. Rows for which `fresh` is `true` are detached
    /// and attached again even if they stay in range.
    ///
    /// Nothing reaches the host until [`Self::plan`] has validated every row the batch will
    /// attach. On error the constraint and the row heights are restored.
    fn batch<H: HostView<U, S::Content>>(
        &mut self,
        scroll_offset: u64,
        bounds: Size,
        constraint: Constraint,
        fresh: &dyn Fn(usize) -> bool,
        host: &mut H,
        report: &mut FrameReport,
    ) -> Result<()> {
        let previous = self.constraint;
        let switched = constraint != previous;
        if switched {
            rdebug!(
                min_width = constraint.min.width,
                max_width = constraint.max.width,
                "Coordinator: constraint changed"
            );
            self.constraint = constraint;
            self.rebuild_heights();
        }

        let plan = match self.plan(scroll_offset, bounds, fresh) {
            Ok(plan) => plan,
            Err(err) => {
                rwarn!(?err, "Coordinator: batch rejected");
                if switched {
                    self.constraint = previous;
                    self.rebuild_heights();
                }
                return Err(err);
            }
        };

        self.tracker.commit(scroll_offset, bounds, plan.range);
        report.range = plan.range;
        for index in plan.leaving {
            self.detach_row(index, host, report);
        }
        if switched {
            self.refresh_attached(host, report);
        }
        for row in plan.entering {
            self.attach_row(row, host, report)?;
        }
        self.sync_positions(host, report);
        Ok(())
    }

    /// Works out which rows a batch detaches and attaches, without touching the host.
    ///
    /// Attaching a row fixes its height (cached size or fallback), which can change which
    /// rows fit. Entering rows are validated and their heights written to the tracker until
    /// no new row comes into range. Each row's height changes at most once, so this ends
    /// after at most `count` rounds. On error every height written here is restored.
    fn plan(
        &mut self,
        scroll_offset: u64,
        bounds: Size,
        fresh: &dyn Fn(usize) -> bool,
    ) -> Result<Plan<S::Content>> {
        let mut seen: HashSet<usize> = self
            .attached
            .keys()
            .copied()
            .filter(|&index| !fresh(index))
            .collect();
        let mut entering: BTreeMap<usize, Row<S::Content>> = BTreeMap::new();
        let mut undo: Vec<(usize, u32)> = Vec::new();

        let range = loop {
            let range = self.tracker.compute(scroll_offset, bounds);
            let mut grew = false;
            for index in range.expanded() {
                if !seen.insert(index) {
                    continue;
                }
                grew = true;
                let row = match self.checked_row(index) {
                    Ok(row) => row,
                    Err(err) => {
                        self.restore_heights(undo);
                        return Err(err);
                    }
                };
                let height = self.planned_height(row.key);
                if let Some(previous) = self.tracker.row_height(index) {
                    if self.tracker.set_row_height(index, height) {
                        undo.push((index, previous));
                    }
                }
                entering.insert(index, row);
            }
            if !grew {
                break range;
            }
        };

        let wanted = range.expanded();
        entering.retain(|index, _| wanted.contains(index));
        let leaving = self
            .attached
            .keys()
            .copied()
            .filter(|&index| !wanted.contains(&index) || fresh(index))
            .collect();
        Ok(Plan {
            range,
            leaving,
            entering: entering.into_values().collect(),
        })
    }

    /// A row that can be attached: in range of the source and of a registered kind.
    fn checked_row(&self, index: usize) -> Result<Row<S::Content>> {
        let row = self.source.row_at(index)?;
        if !self.registry.contains(row.kind) {
            return Err(RecyclerError::UnknownKind(row.kind));
        }
        Ok(row)
    }

    /// Re-resolves attached rows against a new constraint. Heights were already rebuilt.
    fn refresh_attached<H: HostView<U, S::Content>>(
        &mut self,
        host: &mut H,
        report: &mut FrameReport,
    ) {
        let indices: Vec<usize> = self.attached.keys().copied().collect();
        for index in indices {
            let Ok(row) = self.source.row_at(index) else {
                continue;
            };
            let (size, placement, failure) = self.resolve(index, row.key, &row.content);
            let Some(attached) = self.attached.get_mut(&index) else {
                continue;
            };
            attached.placement = placement;
            report.failures.extend(failure);
            if attached.size != size {
                attached.size = size;
                host.set_bounds(&mut attached.unit, size);
                report.resized.push(index);
            }
        }
    }

    fn apply_resolved<H: HostView<U, S::Content>>(
        &mut self,
        drained: Vec<Resolved>,
        host: &mut H,
    ) -> Result<FrameReport> {
        let mut report = FrameReport {
            range: self.tracker.range(),
            ..FrameReport::default()
        };
        let mut resolved = mem::take(&mut self.deferred);
        resolved.extend(drained);
        if resolved.is_empty() {
            return Ok(report);
        }

        let mut updates: Vec<(usize, Resolved)> = Vec::new();
        for r in resolved {
            if r.key.constraint != self.constraint {
                continue;
            }
            let target = self
                .attached
                .iter()
                .find(|(_, a)| a.key == r.key.row && a.placement == Placement::Fallback)
                .map(|(&index, _)| index);
            match target {
                Some(index) => updates.push((index, r)),
                None => {
                    rtrace!(row = r.key.row, "pump: row not attached, cached only");
                }
            }
        }
        updates.sort_unstable_by_key(|(index, _)| *index);

        let fallback = self.fallback_size();
        let mut undo: Vec<(usize, u32)> = Vec::new();
        for (index, r) in &updates {
            let height = match &r.result {
                Ok(size) => size.height,
                Err(_) => fallback.height,
            };
            if let Some(previous) = self.tracker.row_height(*index) {
                if self.tracker.set_row_height(*index, height) {
                    undo.push((*index, previous));
                }
            }
        }

        let (offset, bounds) = (self.tracker.scroll_offset(), self.tracker.bounds());
        let plan = if undo.is_empty() {
            None
        } else {
            match self.plan(offset, bounds, &|_: usize| false) {
                Ok(plan) => Some(plan),
                Err(err) => {
                    rwarn!(?err, deferred = updates.len(), "Coordinator: pump rejected");
                    self.restore_heights(undo);
                    self.deferred = updates.into_iter().map(|(_, r)| r).collect();
                    return Err(err);
                }
            }
        };

        for (index, Resolved { key, result }) in updates {
            let Some(attached) = self.attached.get_mut(&index) else {
                continue;
            };
            let size = match result {
                Ok(size) => size,
                Err(error) => {
                    report.failures.push(MeasurementFailed {
                        index,
                        key: key.row,
                        error,
                    });
                    fallback
                }
            };
            attached.placement = Placement::Final;
            if attached.size != size {
                attached.size = size;
                host.set_bounds(&mut attached.unit, size);
                report.resized.push(index);
            }
        }

        if let Some(plan) = plan {
            self.tracker.commit(offset, bounds, plan.range);
            report.range = plan.range;
            for index in plan.leaving {
                self.detach_row(index, host, &mut report);
            }
            for row in plan.entering {
                self.attach_row(row, host, &mut report)?;
            }
            self.sync_positions(host, &mut report);
        }
        rtrace!(
            resized = report.resized.len(),
            failures = report.failures.len(),
            "Coordinator::pump"
        );
        Ok(report)
    }

    fn attach_row<H: HostView<U, S::Content>>(
        &mut self,
        mut row: Row<S::Content>,
        host: &mut H,
        report: &mut FrameReport,
    ) -> Result<()> {
        let index = row.index;
        let (size, placement, failure) = self.resolve(index, row.key, &row.content);
        row.measured = match self.engine.peek(row.key, self.constraint) {
            Some(Ok(measured)) => Some(*measured),
            _ => None,
        };
        self.tracker.set_row_height(index, size.height);

        let mut unit = self.pool.acquire(row.kind, &mut self.registry)?;
        unit.bind(index, row.key);
        host.bind(&mut unit, &row);
        host.set_bounds(&mut unit, size);
        let at = self.tracker.row_offset(index).unwrap_or(0);
        host.attach(&mut unit, at);
        report.attached.push(index);
        report.failures.extend(failure);

        self.attached.insert(
            index,
            Attached {
                unit,
                key: row.key,
                size,
                at,
                placement,
            },
        );
        Ok(())
    }

    fn detach_row<H: HostView<U, S::Content>>(
        &mut self,
        index: usize,
        host: &mut H,
        report: &mut FrameReport,
    ) {
        let Some(mut attached) = self.attached.remove(&index) else {
            return;
        };
        host.detach(&mut attached.unit);
        host.unbind(&mut attached.unit);
        self.pool.release(attached.unit);
        report.detached.push(index);
    }

    fn sync_positions<H: HostView<U, S::Content>>(&mut self, host: &mut H, report: &mut FrameReport) {
        for (&index, attached) in self.attached.iter_mut() {
            let Some(at) = self.tracker.row_offset(index) else {
                continue;
            };
            if at != attached.at {
                attached.at = at;
                host.reposition(&mut attached.unit, at);
                report.repositioned += 1;
            }
        }
    }
}

impl<S: DataSource, U> core::fmt::Debug for Coordinator<S, U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Coordinator")
            .field("options", &self.options)
            .field("count", &self.tracker.count())
            .field("range", &self.tracker.range())
            .field("attached", &self.attached.len())
            .field("constraint", &self.constraint)
            .field("engine", &self.engine)
            .finish()
    }
}
