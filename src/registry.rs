use std::collections::HashMap;

use crate::unit::{UnitId, VisualUnit};
use crate::{CellKind, RecyclerError, Result};

/// Builds the host payload of a new visual unit.
pub type CellConstructor<U> = Box<dyn Fn() -> U>;

/// Maps a cell kind to the constructor of its visual units.
pub struct CellRegistry<U> {
    factories: HashMap<CellKind, CellConstructor<U>>,
    next_id: u64,
}

impl<U> CellRegistry<U> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            next_id: 0,
        }
    }

    /// Registers `constructor` for `kind`, replacing any previous registration.
    pub fn register(&mut self, kind: CellKind, constructor: impl Fn() -> U + 'static) {
        rdebug!(kind = kind.name(), "CellRegistry::register");
        self.factories.insert(kind, Box::new(constructor));
    }

    /// Builder-style [`Self::register`].
    pub fn with(mut self, kind: CellKind, constructor: impl Fn() -> U + 'static) -> Self {
        self.register(kind, constructor);
        self
    }

    pub fn contains(&self, kind: CellKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Constructs a fresh, unbound unit.
    pub fn create(&mut self, kind: CellKind) -> Result<VisualUnit<U>> {
        let Some(constructor) = self.factories.get(&kind) else {
            return Err(RecyclerError::UnknownKind(kind));
        };
        let id = UnitId(self.next_id);
        self.next_id += 1;
        rtrace!(kind = kind.name(), id = id.0, "CellRegistry::create");
        Ok(VisualUnit::new(id, kind, constructor()))
    }

    /// Total number of units constructed so far.
    pub fn created(&self) -> u64 {
        self.next_id
    }
}

impl<U> Default for CellRegistry<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> core::fmt::Debug for CellRegistry<U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut kinds: Vec<_> = self.factories.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("CellRegistry")
            .field("kinds", &kinds)
            .field("created", &self.next_id)
            .finish()
    }
}
