//! Modify callback outcomes.

use crate::error::{CoreError, CoreResult};
use bitflags::bitflags;

bitflags! {
    /// What a modify callback wants done with the document it was given.
    ///
    /// Flags combine freely, except that `UPDATE` and `REMOVE` together are
    /// rejected. Rollback takes precedence over everything else.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModifyOutcome: u32 {
        /// Leave the document untouched.
        const NOOP = 1 << 0;
        /// Stop after this document.
        const STOP = 1 << 1;
        /// Abort the whole transaction.
        const ROLLBACK = 1 << 2;
        /// Include the document as it was before the callback.
        const RETURN_OLD = 1 << 3;
        /// Include the document as it is after the outcome is applied.
        const RETURN_NEW = 1 << 4;
        /// Store the callback's version of the document.
        const UPDATE = 1 << 5;
        /// Delete the document.
        const REMOVE = 1 << 6;
    }
}

impl ModifyOutcome {
    /// Rejects contradictory combinations.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOutcome`] for `UPDATE | REMOVE`.
    pub fn validate(self) -> CoreResult<Self> {
        if self.contains(Self::UPDATE | Self::REMOVE) {
            return Err(CoreError::invalid_outcome(
                "UPDATE and REMOVE cannot be combined",
            ));
        }
        Ok(self)
    }
}

impl Default for ModifyOutcome {
    fn default() -> Self {
        Self::NOOP
    }
}
