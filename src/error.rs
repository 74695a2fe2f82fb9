use crate::{CellKind, RowKey};

pub type Result<T, E = RecyclerError> = core::result::Result<T, E>;

/// Errors returned to the caller. Both indicate a configuration bug, not transient data.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecyclerError {
    #[error("no cell factory registered for kind `{0}`")]
    UnknownKind(CellKind),
    #[error("row index {index} out of bounds (count = {count})")]
    InvalidRowIndex { index: usize, count: usize },
}

/// Error produced by a [`crate::Measurer`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MeasureError(pub String);

impl MeasureError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// A row whose measurement failed and was replaced by the fallback size.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("measurement failed for row {index} (key {key}): {error}")]
pub struct MeasurementFailed {
    pub index: usize,
    pub key: RowKey,
    #[source]
    pub error: MeasureError,
}
