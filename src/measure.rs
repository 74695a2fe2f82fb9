//! Off-thread measurement with a per-key cache and request coalescing.
//!
//! Measurement jobs run on an [`Executor`] and only compute. Their results travel back over
//! a completion channel and are applied by [`MeasureEngine::drain`] on the interactive
//! thread, which is the single writer of the cache.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::{Constraint, MeasureError, RowKey, Size};

/// Result of measuring one row. Failures are cached too, until the row is invalidated.
pub type Measured = Result<Size, MeasureError>;

/// Computes the size of a row's content. Called on background threads.
pub trait Measurer<C>: Send + Sync {
    fn measure(&self, content: &C, constraint: Constraint) -> Measured;
}

impl<C, F> Measurer<C> for F
where
    F: Fn(&C, Constraint) -> Measured + Send + Sync,
{
    fn measure(&self, content: &C, constraint: Constraint) -> Measured {
        self(content, constraint)
    }
}

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs measurement jobs off the interactive context.
pub trait Executor {
    fn execute(&self, job: Job);
}

/// Runs each job immediately on the calling thread.
///
/// Results are still delivered through the completion queue, so they only become visible
/// on the next drain.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Lets several lists share one pool.
impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, job: Job) {
        (**self).execute(job);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub row: RowKey,
    pub constraint: Constraint,
}

/// Outcome of [`MeasureEngine::measure_async`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeasureTicket {
    /// The cache already holds a result; nothing was scheduled.
    Cached(Measured),
    /// A job was handed to the executor.
    Scheduled,
    /// The same key is already in flight; this request piggybacks on it.
    Coalesced,
}

/// A measurement applied to the cache by a drain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub key: CacheKey,
    pub result: Measured,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasureStats {
    pub hits: u64,
    pub misses: u64,
    pub scheduled: u64,
    pub coalesced: u64,
    pub completed: u64,
    /// Completions discarded because their row was invalidated while in flight.
    pub stale: u64,
    pub failures: u64,
}

struct Completion {
    key: CacheKey,
    generation: u64,
    result: Measured,
}

pub struct MeasureEngine<C> {
    measurer: Arc<dyn Measurer<C>>,
    executor: Box<dyn Executor>,
    cache: HashMap<RowKey, HashMap<Constraint, Measured>>,
    in_flight: HashSet<CacheKey>,
    generations: HashMap<RowKey, u64>,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
    stats: MeasureStats,
}

impl<C: Send + 'static> MeasureEngine<C> {
    pub fn new(
        measurer: impl Measurer<C> + 'static,
        executor: impl Executor + 'static,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            measurer: Arc::new(measurer),
            executor: Box::new(executor),
            cache: HashMap::new(),
            in_flight: HashSet::new(),
            generations: HashMap::new(),
            tx,
            rx,
            stats: MeasureStats::default(),
        }
    }

    /// Synchronous cache lookup.
    pub fn measure(&mut self, row: RowKey, constraint: Constraint) -> Option<Measured> {
        match self.peek(row, constraint).cloned() {
            Some(hit) => {
                self.stats.hits += 1;
                Some(hit)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Cache lookup that does not count towards the hit/miss stats.
    pub fn peek(&self, row: RowKey, constraint: Constraint) -> Option<&Measured> {
        self.cache.get(&row)?.get(&constraint)
    }

    /// Schedules a background measurement unless it is cached or already in flight.
    ///
    /// Only cache hits are counted here; callers that probed [`Self::measure`] first have
    /// already recorded the miss.
    pub fn measure_async(
        &mut self,
        row: RowKey,
        content: C,
        constraint: Constraint,
    ) -> MeasureTicket {
        if let Some(hit) = self.peek(row, constraint).cloned() {
            self.stats.hits += 1;
            return MeasureTicket::Cached(hit);
        }
        let key = CacheKey { row, constraint };
        if !self.in_flight.insert(key) {
            self.stats.coalesced += 1;
            rtrace!(row, "measure_async: coalesced");
            return MeasureTicket::Coalesced;
        }

        let generation = self.generations.get(&row).copied().unwrap_or(0);
        let measurer = Arc::clone(&self.measurer);
        let tx = self.tx.clone();
        self.stats.scheduled += 1;
        rtrace!(row, generation, "measure_async: scheduled");
        self.executor.execute(Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                measurer.measure(&content, constraint)
            }))
            .unwrap_or_else(|_| Err(MeasureError::new("measurer panicked")));
            // The engine may have been dropped; the result is simply lost then.
            let _ = tx.send(Completion {
                key,
                generation,
                result,
            });
        }));
        MeasureTicket::Scheduled
    }

    pub fn is_in_flight(&self, row: RowKey, constraint: Constraint) -> bool {
        self.in_flight.contains(&CacheKey { row, constraint })
    }

    /// Whether any constraint of `row` is in flight.
    pub fn is_row_in_flight(&self, row: RowKey) -> bool {
        self.in_flight.iter().any(|k| k.row == row)
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.values().map(HashMap::len).sum()
    }

    pub fn is_row_cached(&self, row: RowKey) -> bool {
        self.cache.get(&row).is_some_and(|m| !m.is_empty())
    }

    /// Drops every cached measurement of `row`.
    ///
    /// Results of jobs started before this call are discarded when they arrive.
    pub fn invalidate(&mut self, row: RowKey) {
        self.cache.remove(&row);
        self.in_flight.retain(|k| k.row != row);
        let generation = self.generations.entry(row).or_insert(0);
        *generation += 1;
        rdebug!(row, generation = *generation, "MeasureEngine::invalidate");
    }

    /// Applies every completion that has arrived so far.
    pub fn drain(&mut self) -> Vec<Resolved> {
        let mut out = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion, &mut out);
        }
        out
    }

    /// Like [`Self::drain`], but waits up to `timeout` for the first completion when none
    /// has arrived yet.
    pub fn drain_timeout(&mut self, timeout: Duration) -> Vec<Resolved> {
        let mut out = Vec::new();
        if self.in_flight.is_empty() && self.rx.is_empty() {
            return out;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(completion) => self.apply(completion, &mut out),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return out,
        }
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion, &mut out);
        }
        out
    }

    fn apply(&mut self, completion: Completion, out: &mut Vec<Resolved>) {
        let Completion {
            key,
            generation,
            result,
        } = completion;
        let current = self.generations.get(&key.row).copied().unwrap_or(0);
        if generation != current {
            self.stats.stale += 1;
            rtrace!(row = key.row, generation, current, "drain: stale completion");
            return;
        }
        self.in_flight.remove(&key);
        self.stats.completed += 1;
        if let Err(err) = &result {
            self.stats.failures += 1;
            rwarn!(row = key.row, error = %err, "measurement failed");
        }

        let entries = self.cache.entry(key.row).or_default();
        if entries.contains_key(&key.constraint) {
            // Append-only: keep the first result written for this key.
            return;
        }
        entries.insert(key.constraint, result.clone());
        out.push(Resolved { key, result });
    }

    pub fn stats(&self) -> MeasureStats {
        self.stats
    }
}

impl<C> core::fmt::Debug for MeasureEngine<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MeasureEngine")
            .field("cached_rows", &self.cache.len())
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats)
            .finish()
    }
}
