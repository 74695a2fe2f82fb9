//! A headless, asynchronous cell-reuse engine for virtualized lists.
//!
//! For adapter-level utilities (a background worker pool, scroll anchoring, a frame-driven
//! controller), see the `recycler-adapter` crate.
//!
//! The engine keeps only the rows inside the viewport (plus an overscan margin) attached to a
//! host view tree. Rows are measured off the interactive thread and cached per content
//! identity; until a measurement lands, a row is shown at a fallback size so scrolling never
//! blocks. Visual units leaving the viewport go back to a per-kind reuse pool instead of
//! being destroyed.
//!
//! It is UI-agnostic. The application provides:
//! - a [`DataSource`] (row count, content, cell kind, stable keys)
//! - a [`Measurer`] and an [`Executor`] to run it on
//! - a [`HostView`] receiving attach/detach/bounds calls
//! - scroll offsets and viewport bounds, through [`Coordinator::update`]
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod coordinator;
mod error;
mod fenwick;
mod host;
mod measure;
mod options;
mod pool;
mod registry;
mod source;
mod tracker;
mod types;
mod unit;


pub use coordinator::{Coordinator, FrameReport};
pub use error::{MeasureError, MeasurementFailed, RecyclerError, Result};
pub use host::HostView;
pub use measure::{
    CacheKey, Executor, InlineExecutor, Job, MeasureEngine, MeasureStats, MeasureTicket,
    Measured, Measurer, Resolved,
};
pub use options::RecyclerOptions;
pub use pool::{PoolStats, ReusePool};
pub use registry::{CellConstructor, CellRegistry};
pub use source::{DataSource, Row, SourceAdapter, VecSource};
pub use tracker::ViewportTracker;
pub use types::{Align, CellKind, Constraint, RowKey, RowPhase, Size, VisibleRange};
pub use unit::{UnitId, VisualUnit};
