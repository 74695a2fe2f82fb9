use std::collections::{HashMap, HashSet};

use crate::registry::CellRegistry;
use crate::unit::{UnitId, VisualUnit};
use crate::{CellKind, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStats {
    /// `acquire` calls served from a free list.
    pub hits: u64,
    /// `acquire` calls that had to construct a unit.
    pub misses: u64,
    pub releases: u64,
    /// `release` calls ignored because the unit was already free.
    pub ignored_releases: u64,
}

/// Per-kind free lists of visual units.
///
/// Unbounded: the number of live units is bounded by the visible range plus its margin, and
/// free units are only ever reused, never evicted.
#[derive(Debug)]
pub struct ReusePool<U> {
    free: HashMap<CellKind, Vec<VisualUnit<U>>>,
    free_ids: HashSet<UnitId>,
    stats: PoolStats,
}

impl<U> ReusePool<U> {
    pub fn new() -> Self {
        Self {
            free: HashMap::new(),
            free_ids: HashSet::new(),
            stats: PoolStats::default(),
        }
    }

    /// Pops the most recently released unit of `kind`, or constructs one through `registry`.
    pub fn acquire(
        &mut self,
        kind: CellKind,
        registry: &mut CellRegistry<U>,
    ) -> Result<VisualUnit<U>> {
        if let Some(unit) = self.free.get_mut(&kind).and_then(Vec::pop) {
            self.free_ids.remove(&unit.id());
            self.stats.hits += 1;
            return Ok(unit);
        }
        let unit = registry.create(kind)?;
        self.stats.misses += 1;
        Ok(unit)
    }

    /// Unbinds `unit` and makes it available to the next `acquire` of its kind.
    ///
    /// Returns `false` (and drops the handle) if a unit with the same id is already free.
    pub fn release(&mut self, mut unit: VisualUnit<U>) -> bool {
        if !self.free_ids.insert(unit.id()) {
            rwarn!(
                id = unit.id().get(),
                kind = unit.kind().name(),
                "ReusePool::release: unit already free"
            );
            self.stats.ignored_releases += 1;
            return false;
        }
        unit.unbind();
        self.stats.releases += 1;
        self.free.entry(unit.kind()).or_default().push(unit);
        true
    }

    pub fn free_count(&self, kind: CellKind) -> usize {
        self.free.get(&kind).map_or(0, Vec::len)
    }

    pub fn total_free(&self) -> usize {
        self.free_ids.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl<U> Default for ReusePool<U> {
    fn default() -> Self {
        Self::new()
    }
}
