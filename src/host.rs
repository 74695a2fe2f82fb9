use crate::{Row, Size, VisualUnit};

/// The host view tree the coordinator drives.
///
/// `at` is the unit's top edge in content coordinates. The coordinator never constructs or
/// owns host views; it only hands units (and their `U` payload) to these calls.
pub trait HostView<U, C> {
    fn attach(&mut self, unit: &mut VisualUnit<U>, at: u64);

    fn detach(&mut self, unit: &mut VisualUnit<U>);

    fn set_bounds(&mut self, unit: &mut VisualUnit<U>, size: Size);

    /// Moves an attached unit after rows before it changed size.
    fn reposition(&mut self, unit: &mut VisualUnit<U>, at: u64);

    /// Configures a unit for a row before it is attached.
    fn bind(&mut self, unit: &mut VisualUnit<U>, row: &Row<C>) {
        let _ = (unit, row);
    }

    /// Clears row content from a unit that goes back to the pool.
    fn unbind(&mut self, unit: &mut VisualUnit<U>) {
        let _ = unit;
    }
}
