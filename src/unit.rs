use crate::{CellKind, RowKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u64);

impl UnitId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Binding {
    index: usize,
    key: RowKey,
}

/// A reusable rendering handle for one on-screen row.
///
/// `U` is whatever the host uses to render a row (a view handle, a node id, ...). The unit is
/// not `Clone`: it is owned by the reuse pool while free and by the coordinator while bound,
/// so it can never be bound to two rows at once.
#[derive(Debug)]
pub struct VisualUnit<U> {
    id: UnitId,
    kind: CellKind,
    binding: Option<Binding>,
    view: U,
}

impl<U> VisualUnit<U> {
    pub(crate) fn new(id: UnitId, kind: CellKind, view: U) -> Self {
        Self {
            id,
            kind,
            binding: None,
            view,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn bound_index(&self) -> Option<usize> {
        self.binding.map(|b| b.index)
    }

    pub fn bound_key(&self) -> Option<RowKey> {
        self.binding.map(|b| b.key)
    }

    pub fn is_free(&self) -> bool {
        self.binding.is_none()
    }

    pub fn view(&self) -> &U {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut U {
        &mut self.view
    }

    pub(crate) fn bind(&mut self, index: usize, key: RowKey) {
        debug_assert!(
            self.binding.is_none(),
            "unit {:?} bound twice (row {index})",
            self.id
        );
        self.binding = Some(Binding { index, key });
    }

    pub(crate) fn unbind(&mut self) {
        self.binding = None;
    }
}
