use crate::{Constraint, Size};

/// Configuration for [`crate::Coordinator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RecyclerOptions {
    /// Rows kept attached before and after the visible rows.
    pub overscan: usize,

    /// Size a row is placed at while its measurement is pending or after it failed.
    ///
    /// Its height is also the estimate used for rows that were never measured.
    pub fallback_size: Size,

    /// Constraint rows are measured against. `None` follows the viewport width.
    pub constraint: Option<Constraint>,

    /// Places row 0 at the bottom edge (chat-style lists).
    pub inverted: bool,
}

impl Default for RecyclerOptions {
    fn default() -> Self {
        Self {
            overscan: 4,
            fallback_size: Size::new(0, 44),
            constraint: None,
            inverted: false,
        }
    }
}

impl RecyclerOptions {
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_fallback_size(mut self, size: Size) -> Self {
        self.fallback_size = size;
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_inverted(mut self, inverted: bool) -> Self {
        self.inverted = inverted;
        self
    }

    /// The constraint in effect for a viewport of the given bounds.
    pub fn constraint_for(&self, bounds: Size) -> Constraint {
        self.constraint
            .unwrap_or_else(|| Constraint::fixed_width(bounds.width))
    }
}
