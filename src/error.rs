//! Filepath: src/error.rs
//!
//! Error type for mutating operations.

use std::fmt as StdFmt;

/// Errors that can occur during insert operations.
///
/// Lookups, size queries, and `clear` never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// The allocator could not produce a new family block.
    AllocationFailed,

    /// The allocator returned a family block not aligned to the cache
    /// line. Descending into a misaligned family corrupts memory, so the
    /// block is released and the insert refused.
    Misaligned,

    /// A structural invariant did not hold. This is a bug in the tree
    /// itself, never a consequence of caller input.
    Corrupted(&'static str),
}

impl StdFmt::Display for InsertError {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        match self {
            Self::AllocationFailed => write!(f, "family allocation failed"),

            Self::Misaligned => {
                write!(f, "family allocation was not aligned to the cache line")
            }

            Self::Corrupted(what) => write!(f, "tree structure corrupted: {what}"),
        }
    }
}

impl std::error::Error for InsertError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            InsertError::AllocationFailed.to_string(),
            "family allocation failed"
        );
        assert_eq!(
            InsertError::Corrupted("element count exceeds capacity").to_string(),
            "tree structure corrupted: element count exceeds capacity"
        );
    }
}
