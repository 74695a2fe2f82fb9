use crate::{CellKind, RecyclerError, Result, RowKey, Size};

/// The application's list contents.
///
/// Only called with `index < count()`; [`SourceAdapter`] enforces that.
pub trait DataSource {
    /// Row payload, opaque to the engine. Cloned into background measurement jobs.
    type Content: Clone + Send + 'static;

    fn count(&self) -> usize;

    fn content(&self, index: usize) -> Self::Content;

    fn kind(&self, index: usize) -> CellKind;

    /// Stable identity used as the measurement cache key.
    fn key(&self, index: usize) -> RowKey {
        index as RowKey
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row<C> {
    pub index: usize,
    pub key: RowKey,
    pub kind: CellKind,
    pub content: C,
    /// Cached measurement under the current constraint, if any.
    pub measured: Option<Size>,
}

/// Index-checked access to a [`DataSource`].
#[derive(Clone, Debug)]
pub struct SourceAdapter<S> {
    source: S,
}

impl<S: DataSource> SourceAdapter<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn count(&self) -> usize {
        self.source.count()
    }

    pub fn check(&self, index: usize) -> Result<()> {
        let count = self.count();
        if index >= count {
            return Err(RecyclerError::InvalidRowIndex { index, count });
        }
        Ok(())
    }

    pub fn key(&self, index: usize) -> Result<RowKey> {
        self.check(index)?;
        Ok(self.source.key(index))
    }

    pub fn kind(&self, index: usize) -> Result<CellKind> {
        self.check(index)?;
        Ok(self.source.kind(index))
    }

    pub fn row_at(&self, index: usize) -> Result<Row<S::Content>> {
        self.check(index)?;
        Ok(Row {
            index,
            key: self.source.key(index),
            kind: self.source.kind(index),
            content: self.source.content(index),
            measured: None,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the contents. Follow up with `Coordinator::invalidate` or
    /// `Coordinator::reload` so cached measurements and bound units catch up.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

/// A single-kind data source over a `Vec`.
#[derive(Clone, Debug)]
pub struct VecSource<T> {
    pub items: Vec<T>,
    pub kind: CellKind,
}

impl<T> VecSource<T> {
    pub fn new(kind: CellKind, items: Vec<T>) -> Self {
        Self { items, kind }
    }
}

impl<T: Clone + Send + 'static> DataSource for VecSource<T> {
    type Content = T;

    fn count(&self) -> usize {
        self.items.len()
    }

    fn content(&self, index: usize) -> T {
        self.items[index].clone()
    }

    fn kind(&self, _index: usize) -> CellKind {
        self.kind
    }
}
