//! Adapter utilities for the `recycler` crate.
//!
//! The `recycler` crate is UI-agnostic and focuses on reuse, measurement and range state. This
//! crate provides small, framework-neutral helpers commonly needed by adapters:
//!
//! - A background [`WorkerPool`] to run measurements on
//! - Scroll anchoring (e.g. prepend in chat/timelines without visual jumps)
//! - A frame-driven [`Controller`]
//!
//! This crate is intentionally framework-agnostic (no bindings to any UI toolkit).
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod anchor;
mod controller;
mod workers;

#[cfg(test)]
mod tests;

pub use anchor::{ScrollAnchor, anchor_offset, apply_anchor, capture_first_visible_anchor};
pub use controller::Controller;
pub use workers::WorkerPool;
