//! Transaction lifecycle state.

use crate::error::{CoreError, CoreResult};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// Accepting operations.
    #[default]
    Created,
    /// Prepared and ready to commit; no more operations may be added.
    Prepared,
    /// Committed successfully.
    Committed,
    /// A prepare or commit attempt failed.
    Failed,
}

impl TransactionState {
    /// Returns true once the transaction can no longer be committed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }

    /// Ensures operations may still be added.
    pub(crate) fn ensure_open(self) -> CoreResult<()> {
        match self {
            Self::Created => Ok(()),
            Self::Prepared => Err(CoreError::invalid_operation(
                "transaction already prepared",
            )),
            Self::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            Self::Failed => Err(CoreError::invalid_operation("transaction already failed")),
        }
    }

    /// Ensures a commit may still be attempted.
    pub(crate) fn ensure_committable(self) -> CoreResult<()> {
        match self {
            Self::Created | Self::Prepared => Ok(()),
            Self::Committed => Err(CoreError::invalid_operation(
                "transaction already committed",
            )),
            Self::Failed => Err(CoreError::invalid_operation("transaction already failed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_created_accepts_operations() {
        assert!(TransactionState::Created.ensure_open().is_ok());
        assert!(TransactionState::Prepared.ensure_open().is_err());
        assert!(TransactionState::Committed.ensure_open().is_err());
        assert!(TransactionState::Failed.ensure_open().is_err());
    }

    #[test]
    fn terminal_states_reject_commit() {
        assert!(TransactionState::Created.ensure_committable().is_ok());
        assert!(TransactionState::Prepared.ensure_committable().is_ok());
        assert!(TransactionState::Committed.ensure_committable().is_err());
        assert!(TransactionState::Failed.ensure_committable().is_err());
        assert!(TransactionState::Failed.is_terminal());
        assert!(!TransactionState::Prepared.is_terminal());
    }
}
