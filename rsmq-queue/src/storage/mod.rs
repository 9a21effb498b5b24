//! Store backends

mod ephemeral;
mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use ephemeral::EphemeralStore;
pub use traits::{Procedure, Store, StoreError, Transaction};
