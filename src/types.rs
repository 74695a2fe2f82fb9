use core::fmt;
use core::ops;

/// Stable identity of a row. Data sources that never reorder can use the index.
pub type RowKey = u64;

/// Logical kind of a visual unit (the reuse identifier of a cell).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKind(pub &'static str);

impl CellKind {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size::new(0, 0);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The size range a row is measured against.
///
/// Part of the measurement cache key: the same row measured against two constraints yields
/// two independent cache entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Constraint {
    pub min: Size,
    pub max: Size,
}

impl Constraint {
    pub const fn new(min: Size, max: Size) -> Self {
        Self { min, max }
    }

    /// Exact width, unbounded height. This is what a vertical list hands to its rows.
    pub const fn fixed_width(width: u32) -> Self {
        Self {
            min: Size::new(width, 0),
            max: Size::new(width, u32::MAX),
        }
    }

    pub fn clamp(&self, size: Size) -> Size {
        Size {
            width: size.width.clamp(self.min.width, self.max.width.max(self.min.width)),
            height: size
                .height
                .clamp(self.min.height, self.max.height.max(self.min.height)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Align {
    Start,
    Center,
    End,
    Auto,
}

/// The rows that currently need a visual unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VisibleRange {
    pub start_index: usize,
    pub end_index: usize, // exclusive, visible rows only (no margin)
    pub margin: usize,
    pub count: usize,
}

impl VisibleRange {
    pub fn empty(count: usize, margin: usize) -> Self {
        Self {
            start_index: 0,
            end_index: 0,
            margin,
            count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_index >= self.end_index
    }

    /// Number of strictly visible rows.
    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    /// Visible rows plus the lookbehind/lookahead margin, clamped to `count`.
    ///
    /// Empty when no row is visible; the margin only extends a non-empty range.
    pub fn expanded(&self) -> ops::Range<usize> {
        if self.is_empty() {
            return 0..0;
        }
        let start = self.start_index.saturating_sub(self.margin);
        let end = self
            .end_index
            .saturating_add(self.margin)
            .min(self.count);
        start..end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.expanded().contains(&index)
    }
}

/// Lifecycle state of a single row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RowPhase {
    /// Never measured, not attached.
    Unresolved,
    /// Not attached, a measurement is in flight.
    MeasuringAsync,
    /// Attached at the fallback size while its measurement is pending.
    PlacedFallback,
    /// Attached at its final size (or at the fallback size after a failed measurement).
    PlacedFinal,
    /// Not attached, measurement cached for the next visibility cycle.
    Detached,
}
