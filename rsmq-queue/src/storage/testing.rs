//! Helpers for tests that poke at the store directly

use super::{Procedure, StoreError, Transaction};

/// Procedure built from a closure
pub(crate) struct Script<F>(pub F);

impl<F, T> Procedure for Script<F>
where
    F: FnOnce(&mut dyn Transaction) -> Result<T, StoreError> + Send,
    T: Send,
{
    type Output = T;

    fn name(&self) -> &'static str {
        "script"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<T, StoreError> {
        (self.0)(tx)
    }
}
