//! Transactions against the coordination store.
//!
//! Writes are grouped into a [`NestedTransaction`] made of sub-transactions
//! that each follow a two-phase lifecycle:
//! - **prepare**: validate, and for [`EagerCountingTransaction`] advance the
//!   generation
//! - **commit**: apply, and for both counting variants advance the
//!   generation afterwards on every exit path
//!
//! Store operations inside one sub-transaction are applied atomically by the
//! store itself.

mod counting;
mod nested;
mod state;
mod store;

pub use counting::{CountingTransaction, EagerCountingTransaction};
pub use nested::NestedTransaction;
pub use state::TransactionState;
pub use store::StoreTransaction;

use crate::error::CoreResult;
use std::any::Any;

/// A sub-transaction of a [`NestedTransaction`].
pub trait Transaction: Send + 'static {
    /// Validates the transaction before any sub-transaction commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be committed.
    fn prepare(&mut self) -> CoreResult<()>;

    /// Applies the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction was not applied.
    fn commit(&mut self) -> CoreResult<()>;

    /// Undoes the transaction if possible, otherwise logs why not.
    fn rollback_or_log(&mut self);

    /// Returns `self` as [`Any`] so [`NestedTransaction::add`] can hand back
    /// a typed handle.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
